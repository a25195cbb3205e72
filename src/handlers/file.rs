use actix_web::HttpResponse;

use crate::context::GateContext;
use crate::error::GateError;
use crate::response::Response;
use crate::store::{FsNode, NodeKind};

use super::res::stream_file;

/// Directories come back as a JSON listing, files as their content.
pub async fn get_browse(node: FsNode, ctx: &GateContext) -> Result<HttpResponse, GateError> {
    match node.kind {
        NodeKind::Directory => {
            let entries = ctx.files.list(&node.id).await?;
            Ok(Response::json(entries).into())
        }
        NodeKind::File => {
            let opened = ctx.files.open(&node.id).await?;
            Ok(stream_file(opened))
        }
    }
}
