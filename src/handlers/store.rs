use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use log::warn;

use crate::context::GateContext;
use crate::error::GateError;

/// Relay a query, update or graph store request to the upstream store.
pub async fn forward_store(
    req: &HttpRequest,
    payload: Payload,
    ctx: &GateContext,
) -> Result<HttpResponse, GateError> {
    let limit = ctx.cfg.payload_limit_bytes();
    let body = match payload.to_bytes_limited(limit).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            warn!("Failed to read body of {} {}: {e}", req.method(), req.path());
            return Err(GateError::validation("failed to read request body"));
        }
        Err(_) => {
            return Err(GateError::PayloadTooLarge {
                limit: limit as u64,
            })
        }
    };
    ctx.proxy.forward(req, body).await
}
