use std::time::{Duration, Instant};

use actix_web::body::SizedStream;
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{HttpRequest, HttpResponse};
use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::error::GateError;

/// Never forwarded in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Never forwarded upstream: the store must not see caller credentials.
const CREDENTIAL_HEADERS: &[&str] = &["x-access-token", "authorization", "cookie", "host"];

/// Forwards authorized store traffic to the upstream endpoint. There is no
/// retry: a failed write may or may not have been applied.
///
/// The timeout bounds connecting and every wait for upstream bytes, not the
/// whole exchange, so a slow but live response body is relayed in full.
pub struct QueryProxy {
    client: reqwest::Client,
    upstream: String,
}

impl QueryProxy {
    pub fn new(upstream: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build upstream client")?;
        Ok(Self {
            client,
            upstream: upstream.trim_end_matches('/').to_string(),
        })
    }

    pub async fn forward(&self, req: &HttpRequest, body: Bytes) -> Result<HttpResponse, GateError> {
        let target = match req.uri().path_and_query() {
            Some(pq) => format!("{}{}", self.upstream, pq.as_str()),
            None => format!("{}{}", self.upstream, req.path()),
        };
        let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
            .map_err(|_| GateError::validation("unsupported method"))?;

        let mut builder = self.client.request(method, &target);
        for (name, value) in req.headers().iter() {
            let name = name.as_str();
            if HOP_BY_HOP_HEADERS.contains(&name) || CREDENTIAL_HEADERS.contains(&name) {
                continue;
            }
            builder = builder.header(name, value.as_bytes());
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    "Upstream {} {} failed after {}ms: {e}",
                    req.method(),
                    req.path(),
                    start.elapsed().as_millis()
                );
                return Err(GateError::Upstream(e.into()));
            }
        };

        let status = StatusCode::from_u16(resp.status().as_u16())
            .map_err(|e| GateError::Upstream(anyhow::anyhow!("invalid upstream status: {e}")))?;
        let elapsed = start.elapsed().as_millis();
        if status.is_success() {
            info!("Proxied {} {} -> {status} in {elapsed}ms", req.method(), req.path());
        } else {
            warn!(
                "Upstream answered {} {} with {status} in {elapsed}ms",
                req.method(),
                req.path()
            );
        }

        let mut out = HttpResponse::build(status);
        for (name, value) in resp.headers().iter() {
            if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
                continue;
            }
            out.append_header((name.as_str(), value.as_bytes()));
        }

        // Dropping the stream when the caller goes away drops the upstream
        // connection with it.
        let len = resp.content_length();
        let stream = resp.bytes_stream();
        Ok(match len {
            Some(len) => out.body(SizedStream::new(len, stream)),
            None => out.streaming(stream),
        })
    }
}
