use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::authz::parse_canonical_uuid;
use crate::error::GateError;

/// Disk filename of a stored object, always `{uuid}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName(String);

impl StoredName {
    pub fn new(id: &Uuid, ext: &str) -> Self {
        Self(format!("{}.{ext}", id.hyphenated()))
    }

    /// Accepts a name read back from metadata only if it still has the
    /// `{uuid}.{ext}` shape, so it can never point outside the files dir.
    pub fn parse(raw: &str) -> Option<Self> {
        let (id, ext) = raw.split_once('.')?;
        parse_canonical_uuid(id)?;
        if ext.is_empty() || ext.starts_with('.') || ext.ends_with('.') || ext.contains("..") {
            return None;
        }
        if !ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The directory holding stored objects. Objects become visible only by
/// rename, so readers see either the previous content or the new one.
pub struct Disk {
    dir: PathBuf,
}

impl Disk {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, name: &StoredName) -> PathBuf {
        self.dir.join(name.as_str())
    }

    /// Start writing `name` into a hidden temporary file next to it.
    pub async fn stage(&self, name: &StoredName) -> Result<StagedFile, GateError> {
        let temp_path = self
            .dir
            .join(format!(
                ".{}.{}{TEMP_SUFFIX}",
                name.as_str(),
                Uuid::new_v4().simple()
            ));
        let file = File::create(&temp_path).await.map_err(|e| {
            warn!("Failed to create temp file {}: {e}", temp_path.display());
            GateError::storage("create temp file")
        })?;

        Ok(StagedFile {
            file,
            temp_path,
            final_path: self.path_of(name),
            size: 0,
            persisted: false,
        })
    }

    /// Open a stored object for streaming. A missing object is a storage
    /// failure here: the caller already knows the metadata exists.
    pub async fn open(&self, name: &StoredName) -> Result<(File, u64), GateError> {
        let path = self.path_of(name);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Indexed object {} is missing on disk", path.display());
                return Err(GateError::storage("object missing on disk"));
            }
            Err(e) => {
                warn!("Failed to open {}: {e}", path.display());
                return Err(GateError::storage("open object"));
            }
        };
        let meta = file
            .metadata()
            .await
            .map_err(|e| GateError::storage(format!("stat object: {e}")))?;
        Ok((file, meta.len()))
    }

    /// Remove temp files left behind by a process that died mid-write.
    /// Returns how many were removed.
    pub fn sweep_temp_files(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to scan {} for temp files: {e}", self.dir.display());
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with('.') && name.ends_with(TEMP_SUFFIX)) {
                continue;
            }
            if remove_quietly(&entry.path()) {
                removed += 1;
            }
        }
        removed
    }
}

const TEMP_SUFFIX: &str = ".tmp";

fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove {}: {e}", path.display());
            false
        }
    }
}

/// A write in progress. The temp file is removed when this is dropped
/// without a successful [`persist`](Self::persist), including when the
/// owning future is cancelled.
pub struct StagedFile {
    file: File,
    temp_path: PathBuf,
    final_path: PathBuf,
    size: u64,
    persisted: bool,
}

impl StagedFile {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), GateError> {
        self.file.write_all(chunk).await.map_err(|e| {
            warn!("Failed to write {}: {e}", self.temp_path.display());
            GateError::storage("write object")
        })?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Flush, fsync and rename into place.
    pub async fn persist(mut self) -> Result<PlacedFile, GateError> {
        let result = async {
            self.file.flush().await?;
            self.file.sync_all().await?;
            fs::rename(&self.temp_path, &self.final_path).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to persist {}: {e}", self.final_path.display());
            return Err(GateError::storage("persist object"));
        }

        self.persisted = true;
        debug!(
            "Persisted {} ({} bytes)",
            self.final_path.display(),
            self.size
        );
        Ok(PlacedFile {
            path: self.final_path.clone(),
            size: self.size,
            kept: false,
        })
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.persisted {
            remove_quietly(&self.temp_path);
        }
    }
}

/// An object renamed into place but not yet indexed. It is removed again on
/// drop unless [`keep`](Self::keep) was called.
pub struct PlacedFile {
    path: PathBuf,
    size: u64,
    kept: bool,
}

impl PlacedFile {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn keep(mut self) -> u64 {
        self.kept = true;
        self.size
    }
}

impl Drop for PlacedFile {
    fn drop(&mut self) {
        if !self.kept && remove_quietly(&self.path) {
            debug!("Removed unindexed {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tokio::io::AsyncReadExt;

    use super::*;

    async fn read_all(disk: &Disk, name: &StoredName) -> Vec<u8> {
        let (mut file, size) = disk.open(name).await.unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).await.unwrap();
        assert_eq!(size, data.len() as u64);
        data
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_stored_name() {
        let id = Uuid::new_v4();
        let name = StoredName::new(&id, "tar.gz");
        assert_eq!(name.as_str(), format!("{id}.tar.gz"));
        assert_eq!(StoredName::parse(name.as_str()), Some(name));

        assert!(StoredName::parse(&format!("{id}.bin")).is_some());
        assert!(StoredName::parse(&format!("{id}")).is_none());
        assert!(StoredName::parse(&format!("{id}.")).is_none());
        assert!(StoredName::parse(&format!("{id}./../x")).is_none());
        assert!(StoredName::parse(&format!("{id}.a..b")).is_none());
        assert!(StoredName::parse("../../etc/passwd").is_none());
        assert!(StoredName::parse(&format!("{}.txt", id.simple())).is_none());
    }

    #[tokio::test]
    async fn test_stage_and_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = Disk::new(tmp.path());
        let name = StoredName::new(&Uuid::new_v4(), "txt");

        let mut staged = disk.stage(&name).await.unwrap();
        staged.write(b"hello ").await.unwrap();
        staged.write(b"world").await.unwrap();
        // Nothing visible under the final name yet.
        assert!(!disk.path_of(&name).exists());

        let placed = staged.persist().await.unwrap();
        assert_eq!(placed.size(), 11);
        assert_eq!(placed.keep(), 11);
        assert_eq!(read_all(&disk, &name).await, b"hello world");
        assert_eq!(entries(tmp.path()), vec![name.as_str().to_string()]);
    }

    #[tokio::test]
    async fn test_replace_is_atomic_swap() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = Disk::new(tmp.path());
        let name = StoredName::new(&Uuid::new_v4(), "bin");

        let mut staged = disk.stage(&name).await.unwrap();
        staged.write(b"old content").await.unwrap();
        staged.persist().await.unwrap().keep();

        let mut staged = disk.stage(&name).await.unwrap();
        staged.write(b"new").await.unwrap();
        // Old content stays readable while the replacement is staged.
        assert_eq!(read_all(&disk, &name).await, b"old content");
        staged.persist().await.unwrap().keep();
        assert_eq!(read_all(&disk, &name).await, b"new");
    }

    #[tokio::test]
    async fn test_dropped_writes_leave_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = Disk::new(tmp.path());
        let name = StoredName::new(&Uuid::new_v4(), "bin");

        let mut staged = disk.stage(&name).await.unwrap();
        staged.write(b"partial").await.unwrap();
        assert_eq!(entries(tmp.path()).len(), 1);
        drop(staged);
        assert!(entries(tmp.path()).is_empty());

        let mut staged = disk.stage(&name).await.unwrap();
        staged.write(b"never indexed").await.unwrap();
        let placed = staged.persist().await.unwrap();
        assert!(disk.path_of(&name).exists());
        drop(placed);
        assert!(entries(tmp.path()).is_empty());

        assert!(matches!(
            disk.open(&name).await,
            Err(GateError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = Disk::new(tmp.path());
        let name = StoredName::new(&Uuid::new_v4(), "txt");

        let mut staged = disk.stage(&name).await.unwrap();
        staged.write(b"kept").await.unwrap();
        staged.persist().await.unwrap().keep();

        let stale = format!(".{}.{}.tmp", name.as_str(), Uuid::new_v4().simple());
        std::fs::write(tmp.path().join(&stale), b"left by a crash").unwrap();
        std::fs::write(tmp.path().join(".notes"), b"not ours").unwrap();

        assert_eq!(disk.sweep_temp_files(), 1);
        let mut expect = vec![".notes".to_string(), name.as_str().to_string()];
        expect.sort();
        assert_eq!(entries(tmp.path()), expect);
        assert_eq!(disk.sweep_temp_files(), 0);
    }
}
