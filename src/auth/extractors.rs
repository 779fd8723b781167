use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_cookies::Cookies;
use tracing::debug;

use super::session::{SessionKeys, SessionPayload, SESSION_COOKIE_NAME};

/// Verified session from the session cookie.
///
/// Missing cookie, bad signature and expiry are indistinguishable to the
/// caller: all reject with `401 {"authenticated": false}`.
pub struct CurrentSession(pub SessionPayload);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let Some(token) = cookies.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string()) else {
            return Err(unauthenticated());
        };

        match SessionKeys::from_ref(state).read(&token) {
            Some(payload) => Ok(CurrentSession(payload)),
            None => {
                debug!("session cookie rejected");
                Err(unauthenticated())
            }
        }
    }
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "authenticated": false })),
    )
        .into_response()
}
