use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

pub const ACCESS_DENIED: &str = "Access denied";
pub const UPSTREAM_ERROR: &str = "Upstream store unavailable";
pub const STORAGE_ERROR: &str = "File storage error";

#[derive(Debug, Serialize, Deserialize)]
pub struct CommonResponse {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceResponse<T> {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn not_found() -> Self {
        Self::err_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden() -> Self {
        Self::err_response(StatusCode::FORBIDDEN, ACCESS_DENIED.to_string())
    }

    pub fn payload_too_large(message: impl AsRef<str>) -> Self {
        Self::err_response(StatusCode::PAYLOAD_TOO_LARGE, message.as_ref().to_string())
    }

    pub fn bad_gateway() -> Self {
        Self::err_response(StatusCode::BAD_GATEWAY, UPSTREAM_ERROR.to_string())
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn json<T: Serialize>(data: T) -> Self {
        let resp = ResourceResponse::<T> {
            code: StatusCode::OK.into(),
            message: None,
            data: Some(data),
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: status.into(),
            message: Some(message),
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
