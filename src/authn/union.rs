use actix_web::HttpRequest;

use super::bearer_token::BearerTokenExtractor;
use super::cookie::SessionCookieExtractor;
use super::header::AccessTokenExtractor;
use super::{Credential, CredentialExtractor, CredentialSource};

pub enum UnionExtractor {
    AccessToken(AccessTokenExtractor),
    BearerToken(BearerTokenExtractor),
    SessionCookie(SessionCookieExtractor),
}

impl CredentialExtractor for UnionExtractor {
    fn extract(&self, req: &HttpRequest) -> Option<Credential> {
        match self {
            UnionExtractor::AccessToken(ext) => ext.extract(req),
            UnionExtractor::BearerToken(ext) => ext.extract(req),
            UnionExtractor::SessionCookie(ext) => ext.extract(req),
        }
    }

    fn source(&self) -> CredentialSource {
        match self {
            UnionExtractor::AccessToken(ext) => ext.source(),
            UnionExtractor::BearerToken(ext) => ext.source(),
            UnionExtractor::SessionCookie(ext) => ext.source(),
        }
    }
}
