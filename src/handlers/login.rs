use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use log::{info, warn};
use url::form_urlencoded;

use crate::authn::Credential;
use crate::authz::{Rank, Resource};
use crate::context::GateContext;
use crate::error::GateError;
use crate::templates;

const LOGIN_FORM_LIMIT: usize = 4 * 1024;

pub fn get_login() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(templates::login_page(false))
}

/// Validate the submitted token against the store root and hand it back as
/// a session cookie.
pub async fn post_login(
    req: &HttpRequest,
    payload: Payload,
    ctx: &GateContext,
) -> Result<HttpResponse, GateError> {
    let body = match payload.to_bytes_limited(LOGIN_FORM_LIMIT).await {
        Ok(Ok(body)) => body,
        Ok(Err(_)) => return Err(GateError::validation("failed to read login form")),
        Err(_) => {
            return Err(GateError::PayloadTooLarge {
                limit: LOGIN_FORM_LIMIT as u64,
            })
        }
    };

    let client = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    let credential = form_urlencoded::parse(&body)
        .find(|(key, _)| key == "token")
        .and_then(|(_, value)| Credential::new(value));
    let credential = match credential {
        Some(credential) => credential,
        None => {
            warn!("Login from {client} without a token");
            return Ok(login_failed());
        }
    };

    let rank = ctx
        .authorizer
        .resolve_rank(&Resource::StoreRoot, Some(&credential))
        .await;
    if rank < Rank::View {
        warn!("Login from {client} failed, invalid token");
        return Ok(login_failed());
    }

    info!("Login from {client} succeeded");
    let cookie = ctx.sessions.build_cookie(&credential);
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(cookie)
        .finish())
}

fn login_failed() -> HttpResponse {
    HttpResponse::build(StatusCode::UNAUTHORIZED)
        .content_type(ContentType::html())
        .body(templates::login_page(true))
}
