use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};

use super::{Credential, SESSION_COOKIE};

/// Session cookie lifetime, roughly three months.
pub const SESSION_MAX_AGE_SECS: i64 = 7_776_000;

/// Turns a validated credential into a browser session cookie. There is no
/// server-side session table: the cookie carries the token itself and each
/// request re-evaluates it from scratch.
pub struct SessionManager {
    secure: bool,
}

impl SessionManager {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    pub fn build_cookie(&self, credential: &Credential) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, credential.secret().to_string())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure)
            .max_age(Duration::seconds(SESSION_MAX_AGE_SECS))
            .finish()
    }

    /// The inverse of [`build_cookie`](Self::build_cookie).
    pub fn credential_from_cookie(cookie: &Cookie) -> Option<Credential> {
        if cookie.name() != SESSION_COOKIE {
            return None;
        }
        Credential::new(cookie.value())
    }
}
