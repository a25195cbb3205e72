mod disk;

pub mod path;

use std::fmt::Display;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use actix_web::web::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::GateError;
use crate::humanize::human_bytes;
use crate::store::{FileRecord, FsEntry, FsNode, GraphStore, NodeKind, UnionStore};

use disk::{Disk, StagedFile, StoredName};

/// Remaining byte allowance for one request, shared across all its parts.
pub struct UploadBudget {
    limit: u64,
    used: u64,
}

impl UploadBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn consume(&mut self, len: usize) -> Result<(), GateError> {
        self.used += len as u64;
        if self.used > self.limit {
            return Err(GateError::PayloadTooLarge { limit: self.limit });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub uuid: Uuid,
}

/// An uploaded part fully written to a temp file, not yet visible on disk
/// or in the graph. Dropping it removes the temp file.
pub struct StagedUpload {
    id: Uuid,
    label: String,
    name: StoredName,
    staged: StagedFile,
}

/// A stored file opened for streaming.
pub struct OpenedFile {
    pub record: FileRecord,
    pub file: tokio::fs::File,
    pub len: u64,
}

const REPLACE_LOCKS: usize = 64;

/// UUID-named objects on disk plus their metadata in the filesystem graph.
pub struct FileStore {
    disk: Disk,
    store: Arc<UnionStore>,
    upload_dir: String,
    max_upload_bytes: u64,
    /// Striped by UUID; a replace holds its stripe from rename until the
    /// size is indexed.
    replace_locks: Vec<Mutex<()>>,
}

impl FileStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        store: Arc<UnionStore>,
        upload_dir: impl ToString,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            disk: Disk::new(dir),
            store,
            upload_dir: upload_dir.to_string(),
            max_upload_bytes,
            replace_locks: (0..REPLACE_LOCKS).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn budget(&self) -> UploadBudget {
        UploadBudget::new(self.max_upload_bytes)
    }

    pub fn sweep_temp_files(&self) {
        let removed = self.disk.sweep_temp_files();
        if removed > 0 {
            warn!("Removed {removed} stale temp files from an earlier run");
        }
    }

    /// The directory new uploads hang under: the root child named by the
    /// configured upload label.
    pub async fn upload_parent(&self) -> Result<Uuid, GateError> {
        let segments = [self.upload_dir.clone()];
        match self.store.resolve_path(&segments).await {
            Ok(Some(FsNode {
                id,
                kind: NodeKind::Directory,
            })) => Ok(id),
            Ok(_) => {
                error!(
                    "Upload directory {:?} not found under the filesystem root",
                    self.upload_dir
                );
                Err(GateError::storage("upload directory not configured"))
            }
            Err(e) => Err(GateError::Upstream(e.context("lookup upload directory"))),
        }
    }

    /// Write one uploaded part to a temp file, charging it to `budget`.
    /// Nothing becomes visible until [`commit_upload`](Self::commit_upload).
    pub async fn stage_upload<S, E>(
        &self,
        filename: &str,
        body: S,
        budget: &mut UploadBudget,
    ) -> Result<StagedUpload, GateError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let label = path::upload_basename(filename)?;
        let id = Uuid::new_v4();
        let name = StoredName::new(&id, &path::extension_of(&label));

        let staged = self.disk.stage(&name).await?;
        let staged = Self::drain(staged, body, budget).await?;
        Ok(StagedUpload {
            id,
            label,
            name,
            staged,
        })
    }

    /// Move a staged part into place and index it under `parent`. If
    /// indexing fails or is cancelled the object is removed again.
    pub async fn commit_upload(
        &self,
        parent: &Uuid,
        upload: StagedUpload,
    ) -> Result<UploadedFile, GateError> {
        let StagedUpload {
            id,
            label,
            name,
            staged,
        } = upload;
        let placed = staged.persist().await?;

        let record = FileRecord {
            id,
            mime: mime_guess::from_path(&label)
                .first_or_octet_stream()
                .to_string(),
            label,
            size: placed.size(),
            created: Utc::now(),
            stored_as: name.as_str().to_string(),
        };

        if let Err(e) = self.store.insert_file(parent, &record).await {
            error!(
                "Indexing {} as {} failed, removing it: {e:#}",
                record.label,
                name.as_str()
            );
            return Err(GateError::PartialIndex(e));
        }
        let size = placed.keep();

        info!(
            "Uploaded {:?} as {id}, stored as {}, {}",
            record.label,
            name.as_str(),
            human_bytes(size)
        );
        Ok(UploadedFile {
            filename: record.label,
            uuid: id,
        })
    }

    pub async fn open(&self, id: &Uuid) -> Result<OpenedFile, GateError> {
        let record = self.get_record(id).await?;
        let name = Self::stored_name(&record)?;
        let (file, len) = self.disk.open(&name).await?;
        Ok(OpenedFile { record, file, len })
    }

    /// Overwrite the content of an existing file. Only its size changes in
    /// the metadata.
    pub async fn replace<S, E>(&self, id: &Uuid, body: S) -> Result<FileRecord, GateError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut record = self.get_record(id).await?;
        let name = Self::stored_name(&record)?;

        let mut budget = self.budget();
        let staged = self.disk.stage(&name).await?;
        let staged = Self::drain(staged, body, &mut budget).await?;

        let _guard = self.replace_lock(id).lock().await;
        let size = staged.persist().await?.keep();
        if let Err(e) = self.store.update_file_size(id, size).await {
            error!("Replaced {id} on disk but failed to update its size: {e:#}");
            return Err(GateError::PartialIndex(e));
        }

        info!(
            "Replaced {id}, stored as {}, {}",
            name.as_str(),
            human_bytes(size)
        );
        record.size = size;
        Ok(record)
    }

    /// Walk the label path from the root directory.
    pub async fn resolve(&self, segments: &[String]) -> Result<FsNode, GateError> {
        match self.store.resolve_path(segments).await {
            Ok(Some(node)) => Ok(node),
            Ok(None) => Err(GateError::NotFound),
            Err(e) => Err(GateError::Upstream(e.context("resolve path"))),
        }
    }

    pub async fn list(&self, dir: &Uuid) -> Result<Vec<FsEntry>, GateError> {
        self.store
            .list_children(dir)
            .await
            .map_err(|e| GateError::Upstream(e.context("list directory")))
    }

    async fn get_record(&self, id: &Uuid) -> Result<FileRecord, GateError> {
        match self.store.get_file(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(GateError::NotFound),
            Err(e) => Err(GateError::Upstream(e.context("get file metadata"))),
        }
    }

    fn stored_name(record: &FileRecord) -> Result<StoredName, GateError> {
        StoredName::parse(&record.stored_as).ok_or_else(|| {
            warn!(
                "File {} has unusable storedAs {:?}",
                record.id, record.stored_as
            );
            GateError::storage("invalid stored name")
        })
    }

    fn replace_lock(&self, id: &Uuid) -> &Mutex<()> {
        &self.replace_locks[(id.as_u128() % REPLACE_LOCKS as u128) as usize]
    }

    async fn drain<S, E>(
        mut staged: StagedFile,
        body: S,
        budget: &mut UploadBudget,
    ) -> Result<StagedFile, GateError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut body = pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                warn!("Failed to read request body: {e}");
                GateError::validation("failed to read upload")
            })?;
            budget.consume(chunk.len())?;
            staged.write(&chunk).await?;
        }
        Ok(staged)
    }
}
