use axum::{
    extract::{FromRef, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tower_cookies::Cookies;
use tracing::{error, info, instrument, warn};

use super::{
    dto::{
        CredentialsRequest, CredentialsResponse, MagicLinkBody, MagicLinkResponse, OkResponse,
        PublicUser, RegisterEmailRequest, RegisterEmailResponse, SessionResponse, VerifyQuery,
    },
    extractors::CurrentSession,
    magic_link::{self, MagicLinkRequest, VerifyError, VERIFY_PATH},
    password::{check_or_enroll, CredentialError},
    session::SessionKeys,
    validation::{is_valid_email, normalize_redirect},
};
use crate::{
    config::AppConfig,
    error::ApiError,
    state::AppState,
    store::{MagicLinkPurpose, DEFAULT_REDIRECT},
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/credentials", post(credentials))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/magic-link", post(request_magic_link))
        .route("/api/auth/register-email", post(register_email))
        .route("/api/auth/session", get(session))
}

pub fn page_routes() -> Router<AppState> {
    Router::new().route(VERIFY_PATH, get(verify_magic_link))
}

#[instrument(skip(state, cookies, payload))]
pub async fn credentials(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Option<Json<CredentialsRequest>>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    let password = payload.password.unwrap_or_default();
    let redirect_to = normalize_redirect(payload.redirect_to.as_deref());

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::InvalidEmail);
    }
    if password.is_empty() {
        warn!(email = %email, "password missing");
        return Err(ApiError::MissingPassword);
    }

    let now = OffsetDateTime::now_utc();
    let (user, _) = check_or_enroll(&state.store, &email, &password, now)
        .await
        .map_err(|e| match e {
            CredentialError::Mismatch => {
                warn!(email = %email, "login invalid password");
                ApiError::InvalidCredentials
            }
            other => {
                error!(error = %other, "credential check failed");
                ApiError::Session(other.into())
            }
        })?;

    let user = state
        .store
        .record_user_login(&email, now)
        .await
        .map_err(|e| {
            error!(error = %e, "record login failed");
            ApiError::Session(e.into())
        })?
        .unwrap_or(user);

    let keys = SessionKeys::from_ref(&state);
    let token = keys.issue(&user).map_err(|e| {
        error!(error = %e, "session sign failed");
        ApiError::Session(e)
    })?;
    cookies.add(keys.cookie(token));

    info!(user_id = %user.id, email = %user.email, "user logged in with credentials");
    Ok(Json(CredentialsResponse {
        ok: true,
        email: user.email,
        redirect_to,
    }))
}

#[instrument(skip(state, cookies))]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Json<OkResponse> {
    cookies.add(SessionKeys::from_ref(&state).cleared_cookie());
    Json(OkResponse { ok: true })
}

#[instrument(skip(state, headers, payload))]
pub async fn request_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<MagicLinkBody>>,
) -> Result<Json<MagicLinkResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let email = payload.email.unwrap_or_default().trim().to_string();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::InvalidEmail);
    }

    let request = MagicLinkRequest {
        email,
        origin: request_origin(&state.config, &headers),
        purpose: MagicLinkPurpose::parse_lenient(payload.purpose.as_deref()),
        redirect_to: Some(normalize_redirect(payload.redirect_to.as_deref())),
        request_ip: forwarded_ip(&headers),
        user_agent: header_value(&headers, header::USER_AGENT.as_str()).map(str::to_string),
    };

    let issued = magic_link::create_magic_link_request(&state, request)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to create magic link");
            ApiError::MagicLink(e.into())
        })?;

    let expose_url = !state.config.environment.is_production();
    Ok(Json(MagicLinkResponse {
        ok: true,
        email: issued.email,
        expires_at: issued.expires_at,
        delivery: issued.delivery,
        verification_url: expose_url.then_some(issued.verification_url),
        debug_token: issued.debug_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn register_email(
    State(state): State<AppState>,
    payload: Option<Json<RegisterEmailRequest>>,
) -> Result<Json<RegisterEmailResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let email = payload.email.unwrap_or_default().trim().to_string();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::InvalidEmail);
    }

    let user = state
        .store
        .upsert_user_by_email(&email, OffsetDateTime::now_utc())
        .await
        .map_err(|e| {
            error!(error = %e, "upsert user failed");
            ApiError::Internal(e.into())
        })?;

    info!(user_id = %user.id, email = %user.email, "email registered");
    Ok(Json(RegisterEmailResponse {
        ok: true,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    }))
}

pub async fn session(CurrentSession(session): CurrentSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        session,
    })
}

#[instrument(skip(state, cookies, query))]
pub async fn verify_magic_link(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        warn!(reason = "missing_token", "magic link verification failed");
        return error_page(StatusCode::BAD_REQUEST, "Token tidak ditemukan.");
    };

    let verified = match magic_link::verify_magic_link_token(&state.store, &token).await {
        Ok(v) => v,
        Err(VerifyError::Store(e)) => {
            error!(error = %e, "magic link verification failed on store");
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Terjadi kesalahan pada server. Silakan coba lagi.",
            );
        }
        Err(e) => {
            warn!(reason = e.reason(), "magic link verification failed");
            return error_page(StatusCode::BAD_REQUEST, verify_error_message(&e));
        }
    };

    let keys = SessionKeys::from_ref(&state);
    let token = match keys.issue(&verified.user) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "session sign failed");
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Tidak bisa membuat sesi login saat ini.",
            );
        }
    };
    cookies.add(keys.cookie(token));

    info!(
        user_id = %verified.user.id,
        purpose = verified.purpose.as_str(),
        "session created from magic link"
    );
    see_other(&normalize_redirect(Some(&verified.redirect_to)))
}

/// 303 to `target`, or to the default page if it is not a valid header value.
fn see_other(target: &str) -> Response {
    let location = HeaderValue::try_from(target).unwrap_or_else(|_| {
        warn!(redirect = %target, "redirect target is not a valid header value");
        HeaderValue::from_static(DEFAULT_REDIRECT)
    });
    (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
}

fn verify_error_message(err: &VerifyError) -> &'static str {
    match err {
        VerifyError::Expired => "Link ini sudah kedaluwarsa. Silakan minta link baru.",
        VerifyError::AlreadyUsed => "Link ini sudah dipakai. Minta link baru untuk melanjutkan.",
        _ => "Kami tidak bisa memproses link ini. Silakan minta link baru.",
    }
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        r#"<!doctype html>
<html lang="id">
<head><meta charset="utf-8"><title>Link tidak dapat dipakai</title></head>
<body>
<main>
<h1>Link tidak dapat dipakai</h1>
<p>{message}</p>
<p><a href="/auth/login">Minta link baru</a></p>
<p><a href="/">Kembali ke beranda</a></p>
</main>
</body>
</html>
"#
    );
    (status, Html(body)).into_response()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Configured public URL, else the caller's `Origin`, else `http://<Host>`.
fn request_origin(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_url {
        return url.clone();
    }
    if let Some(origin) = header_value(headers, header::ORIGIN.as_str()).filter(|o| *o != "null") {
        return origin.to_string();
    }
    match header_value(headers, header::HOST.as_str()) {
        Some(host) => format!("http://{host}"),
        None => format!("http://localhost:{}", config.port),
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
