use actix_web::http::header;
use actix_web::HttpRequest;

use super::{Credential, CredentialExtractor, CredentialSource};

/// Reads `Authorization: Bearer <token>`. Other schemes are not ours to judge
/// and fall through to the next source.
pub struct BearerTokenExtractor;

impl BearerTokenExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialExtractor for BearerTokenExtractor {
    fn extract(&self, req: &HttpRequest) -> Option<Credential> {
        let auth = req.headers().get(header::AUTHORIZATION)?;
        let auth = auth.to_str().ok()?.trim();

        let mut iter = auth.split_whitespace();
        let scheme = iter.next()?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let token = iter.next()?;
        if iter.next().is_some() {
            return None;
        }
        Credential::new(token)
    }

    fn source(&self) -> CredentialSource {
        CredentialSource::Bearer
    }
}
