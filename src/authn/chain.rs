use actix_web::HttpRequest;

use super::bearer_token::BearerTokenExtractor;
use super::cookie::SessionCookieExtractor;
use super::header::AccessTokenExtractor;
use super::union::UnionExtractor;
use super::{Credential, CredentialExtractor, CredentialSource};

/// Tries each extractor in order; the first credential found wins.
pub struct ChainExtractor {
    extractors: Vec<UnionExtractor>,
}

impl ChainExtractor {
    pub fn new(extractors: Vec<UnionExtractor>) -> Self {
        Self { extractors }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            UnionExtractor::AccessToken(AccessTokenExtractor::new()),
            UnionExtractor::BearerToken(BearerTokenExtractor::new()),
            UnionExtractor::SessionCookie(SessionCookieExtractor::new()),
        ])
    }

    pub fn extract(&self, req: &HttpRequest) -> Option<(Credential, CredentialSource)> {
        self.extractors
            .iter()
            .find_map(|ext| ext.extract(req).map(|cred| (cred, ext.source())))
    }
}
