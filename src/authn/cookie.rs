use actix_web::http::header;
use actix_web::HttpRequest;
use log::debug;
use url::Url;

use super::session::SessionManager;
use super::{Credential, CredentialExtractor, CredentialSource, SESSION_COOKIE};

const HEADER_SEC_FETCH_SITE: &str = "Sec-Fetch-Site";

/// Reads the session cookie, but only for same-origin requests. Cross-origin
/// callers have to present a header credential.
pub struct SessionCookieExtractor;

impl SessionCookieExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialExtractor for SessionCookieExtractor {
    fn extract(&self, req: &HttpRequest) -> Option<Credential> {
        let cookie = req.cookie(SESSION_COOKIE)?;
        if !is_same_origin(req) {
            debug!("Ignore session cookie on cross-origin request to {}", req.path());
            return None;
        }
        SessionManager::credential_from_cookie(&cookie)
    }

    fn source(&self) -> CredentialSource {
        CredentialSource::SessionCookie
    }
}

fn is_same_origin(req: &HttpRequest) -> bool {
    let headers = req.headers();

    if let Some(site) = headers.get(HEADER_SEC_FETCH_SITE) {
        if site.as_bytes().eq_ignore_ascii_case(b"cross-site") {
            return false;
        }
    }

    let origin = match headers.get(header::ORIGIN) {
        Some(origin) => origin,
        // Browsers omit Origin on same-origin navigations.
        None => return true,
    };
    let origin = match origin.to_str().ok().and_then(|o| Url::parse(o).ok()) {
        Some(origin) => origin,
        None => return false,
    };
    let host = match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => host,
        None => return false,
    };

    let origin_host = match (origin.host_str(), origin.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_string(),
        (None, _) => return false,
    };
    origin_host.eq_ignore_ascii_case(host)
}
