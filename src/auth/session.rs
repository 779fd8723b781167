use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tower_cookies::{cookie::SameSite, Cookie};

use super::token::TokenCodec;
use crate::{state::AppState, store::User};

pub const SESSION_COOKIE_NAME: &str = "rakamin_session";
pub const SESSION_LIFETIME_SECONDS: i64 = 60 * 60 * 24 * 7;

#[derive(Serialize)]
struct SessionClaims<'a> {
    sub: &'a str,
    email: &'a str,
}

/// Verified contents of a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionPayload {
    pub sub: String,   // user id
    pub email: String, // normalized email
    pub iat: i64,
    pub exp: i64,
}

/// Session signing keys plus cookie policy.
#[derive(Clone)]
pub struct SessionKeys {
    codec: TokenCodec,
    ttl_seconds: i64,
    secure_cookie: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            &state.config.session.secret,
            state.config.environment.is_production(),
        )
    }
}

impl SessionKeys {
    pub fn new(secret: &str, secure_cookie: bool) -> Self {
        Self {
            codec: TokenCodec::new(secret),
            ttl_seconds: SESSION_LIFETIME_SECONDS,
            secure_cookie,
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        self.issue_with_ttl(user, self.ttl_seconds)
    }

    fn issue_with_ttl(&self, user: &User, ttl_seconds: i64) -> anyhow::Result<String> {
        let claims = SessionClaims {
            sub: &user.id,
            email: &user.email,
        };
        self.codec.sign(&claims, ttl_seconds)
    }

    /// `None` for anything but a valid, unexpired session.
    pub fn read(&self, token: &str) -> Option<SessionPayload> {
        self.codec.verify::<SessionPayload>(token).into_payload()
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(Duration::seconds(self.ttl_seconds))
            .path("/")
            .build()
    }

    pub fn cleared_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .path("/")
            .build()
    }
}
