use actix_web::HttpResponse;
use thiserror::Error;

use crate::response::{self, Response};

/// Request-facing failures. Every variant resolves to a concrete response, and
/// none of them carries rank or policy details back to the caller.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("access denied")]
    Denied,

    #[error("resource not found")]
    NotFound,

    #[error("validation: {0}")]
    Validation(String),

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("upstream: {0:#}")]
    Upstream(anyhow::Error),

    #[error("storage: {0}")]
    Storage(String),

    #[error("file stored but indexing failed: {0:#}")]
    PartialIndex(anyhow::Error),
}

impl GateError {
    pub fn validation(message: impl ToString) -> Self {
        Self::Validation(message.to_string())
    }

    pub fn storage(message: impl ToString) -> Self {
        Self::Storage(message.to_string())
    }
}

impl From<GateError> for Response {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Denied => Response::forbidden(),
            GateError::NotFound => Response::not_found(),
            GateError::Validation(msg) => Response::bad_request(msg),
            GateError::PayloadTooLarge { limit } => Response::payload_too_large(format!(
                "Upload size limit exceeded (max {})",
                crate::humanize::human_bytes(limit)
            )),
            GateError::Upstream(_) => Response::bad_gateway(),
            GateError::Storage(_) | GateError::PartialIndex(_) => {
                Response::error(response::STORAGE_ERROR)
            }
        }
    }
}

impl From<GateError> for HttpResponse {
    fn from(err: GateError) -> Self {
        Response::from(err).into()
    }
}
