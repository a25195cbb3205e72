use actix_web::HttpRequest;

use super::{Credential, CredentialExtractor, CredentialSource, HEADER_ACCESS_TOKEN};

/// Reads the dedicated `X-Access-Token` header.
pub struct AccessTokenExtractor;

impl AccessTokenExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialExtractor for AccessTokenExtractor {
    fn extract(&self, req: &HttpRequest) -> Option<Credential> {
        let value = req.headers().get(HEADER_ACCESS_TOKEN)?;
        let value = value.to_str().ok()?;
        Credential::new(value)
    }

    fn source(&self) -> CredentialSource {
        CredentialSource::AccessTokenHeader
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_access_token_header() {
        let extractor = AccessTokenExtractor::new();

        let req = TestRequest::default()
            .insert_header((HEADER_ACCESS_TOKEN, "abc123"))
            .to_http_request();
        assert_eq!(extractor.extract(&req).unwrap().secret(), "abc123");

        let req = TestRequest::default()
            .insert_header(("x-access-token", " padded "))
            .to_http_request();
        assert_eq!(extractor.extract(&req).unwrap().secret(), "padded");

        let req = TestRequest::default()
            .insert_header((HEADER_ACCESS_TOKEN, ""))
            .to_http_request();
        assert!(extractor.extract(&req).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(extractor.extract(&req).is_none());
    }
}
