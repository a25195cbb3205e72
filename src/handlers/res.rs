use actix_multipart::Multipart;
use actix_web::body::SizedStream;
use actix_web::http::header;
use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use futures_util::StreamExt;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::context::GateContext;
use crate::error::GateError;
use crate::files::{OpenedFile, UploadedFile};
use crate::response::Response;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplacedFile {
    pub uuid: Uuid,
    pub size: u64,
}

/// Store every file part of a multipart body under the upload directory.
/// Parts without a filename are skipped. Every part is staged before any is
/// committed, so a body rejected partway leaves nothing behind.
pub async fn post_upload(
    req: &HttpRequest,
    payload: Payload,
    ctx: &GateContext,
) -> Result<HttpResponse, GateError> {
    let parent = ctx.files.upload_parent().await?;
    let mut budget = ctx.files.budget();
    let mut multipart = Multipart::new(req.headers(), payload);

    let mut staged = Vec::new();
    while let Some(field) = multipart.next().await {
        let field = field.map_err(|e| {
            warn!("Malformed multipart upload: {e}");
            GateError::validation("malformed multipart body")
        })?;
        let filename = match field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
        {
            Some(filename) => filename.to_string(),
            None => continue,
        };
        staged.push(ctx.files.stage_upload(&filename, field, &mut budget).await?);
    }

    if staged.is_empty() {
        return Err(GateError::validation("no files in upload"));
    }

    let mut uploaded: Vec<UploadedFile> = Vec::with_capacity(staged.len());
    for upload in staged {
        match ctx.files.commit_upload(&parent, upload).await {
            Ok(file) => uploaded.push(file),
            Err(e) => {
                if !uploaded.is_empty() {
                    let ids: Vec<_> = uploaded.iter().map(|f| f.uuid.to_string()).collect();
                    error!("Upload aborted after indexing {}", ids.join(", "));
                }
                return Err(e);
            }
        }
    }
    Ok(Response::json(uploaded).into())
}

pub async fn get_resource(id: &Uuid, ctx: &GateContext) -> Result<HttpResponse, GateError> {
    let opened = ctx.files.open(id).await?;
    Ok(stream_file(opened))
}

/// The raw body replaces the stored content. A declared length over the
/// upload limit is refused before anything is read.
pub async fn put_resource(
    req: &HttpRequest,
    id: &Uuid,
    payload: Payload,
    ctx: &GateContext,
) -> Result<HttpResponse, GateError> {
    let limit = ctx.cfg.max_upload_bytes();
    if declared_length(req).is_some_and(|len| len > limit) {
        return Err(GateError::PayloadTooLarge { limit });
    }

    let record = ctx.files.replace(id, payload).await?;
    Ok(Response::json(ReplacedFile {
        uuid: record.id,
        size: record.size,
    })
    .into())
}

fn declared_length(req: &HttpRequest) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

pub fn stream_file(opened: OpenedFile) -> HttpResponse {
    let OpenedFile { record, file, len } = opened;
    let body = SizedStream::new(len, ReaderStream::new(file));
    HttpResponse::Ok()
        .content_type(record.mime.as_str())
        .body(body)
}
