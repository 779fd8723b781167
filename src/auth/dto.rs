use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::session::SessionPayload;
use crate::mail::DeliveryStatus;

/// Body for `POST /api/auth/credentials`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub redirect_to: Option<String>,
}

/// Body for `POST /api/auth/magic-link`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MagicLinkBody {
    pub email: Option<String>,
    pub redirect_to: Option<String>,
    pub purpose: Option<String>,
}

/// Body for `POST /api/auth/register-email`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterEmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub ok: bool,
    pub email: String,
    pub redirect_to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkResponse {
    pub ok: bool,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub delivery: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_token: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterEmailResponse {
    pub ok: bool,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub session: SessionPayload,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}
