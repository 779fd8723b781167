use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the JSON endpoints.
///
/// Causes of the 5xx variants are logged where they happen; the body only
/// carries the user-facing message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("password missing")]
    MissingPassword,

    #[error("password does not match")]
    InvalidCredentials,

    #[error("session could not be created: {0}")]
    Session(anyhow::Error),

    #[error("magic link could not be created: {0}")]
    MagicLink(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
    message: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail | Self::MissingPassword => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Session(_) | Self::MagicLink(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::MissingPassword => "MISSING_PASSWORD",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Session(_) | Self::MagicLink(_) | Self::Internal(_) => "SERVER_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "Alamat email tidak valid.",
            Self::MissingPassword => "Password wajib diisi.",
            Self::InvalidCredentials => "Password tidak cocok dengan akun ini.",
            Self::Session(_) => "Tidak bisa membuat sesi login saat ini.",
            Self::MagicLink(_) => "Terjadi kesalahan saat membuat magic link",
            Self::Internal(_) => "Terjadi kesalahan pada server.",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: self.code(),
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
