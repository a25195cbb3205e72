mod bearer_token;
mod chain;
mod cookie;
mod digest;
mod header;
mod union;

pub mod session;

use actix_web::HttpRequest;

pub use chain::ChainExtractor;
pub use digest::{Credential, TokenDigest};

pub const HEADER_ACCESS_TOKEN: &str = "X-Access-Token";
pub const SESSION_COOKIE: &str = "liqk_gate_token";

/// Where a credential was found. Order of the variants is the lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    AccessTokenHeader,
    Bearer,
    SessionCookie,
}

pub trait CredentialExtractor {
    /// `None` means this source has nothing to offer; the next one is tried.
    fn extract(&self, req: &HttpRequest) -> Option<Credential>;

    fn source(&self) -> CredentialSource;
}

/// Resolve the caller credential with the default precedence: dedicated
/// header, then bearer authorization, then the same-origin session cookie.
pub fn extract(req: &HttpRequest) -> Option<(Credential, CredentialSource)> {
    ChainExtractor::standard().extract(req)
}
