use std::fmt::{self, Debug, Display};

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A caller-presented secret. The plaintext never leaves this type except to
/// build the session cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: String,
}

impl Credential {
    /// Returns `None` for blank input; absence is not an error.
    pub fn new(secret: impl AsRef<str>) -> Option<Self> {
        let secret = secret.as_ref().trim();
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            secret: secret.to_string(),
        })
    }

    /// A fresh random 128-bit token in lowercase hex.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            secret: hex::encode(bytes),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn digest(&self) -> TokenDigest {
        TokenDigest::of(&self.secret)
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Lowercase hex SHA-256 of a token, the form stored as `tokenHash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDigest(String);

impl TokenDigest {
    pub fn of(secret: &str) -> Self {
        Self(hex::encode(Sha256::digest(secret.as_bytes())))
    }

    /// Constant-time comparison against a stored digest. Case of the stored
    /// hex is normalized first; length is not secret.
    pub fn matches(&self, stored: &str) -> bool {
        let stored = stored.trim().to_ascii_lowercase();
        if stored.len() != self.0.len() {
            return false;
        }
        self.0.as_bytes().ct_eq(stored.as_bytes()).into()
    }
}

impl Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
