use actix_web::HttpResponse;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::response::Response;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthzInfo {
    pub now: i64,
    pub version: String,
}

pub fn get_healthz() -> HttpResponse {
    Response::json(HealthzInfo {
        now: Utc::now().timestamp(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
    .into()
}
