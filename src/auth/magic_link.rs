//! One-time login/registration links.
//!
//! Links are looked up by the SHA-256 of a random token; the token itself
//! only travels in the verification URL. Verifying consumes the link once,
//! with a short grace window for duplicate requests.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use url::Url;

use crate::{
    mail::{DeliveryStatus, MagicLinkEmail},
    state::AppState,
    store::{
        ConsumeOutcome, FileStore, MagicLink, MagicLinkMetadata, MagicLinkPurpose, StoreError,
        User, DEFAULT_REDIRECT,
    },
};

pub const MAGIC_LINK_TTL: Duration = Duration::minutes(30);

/// Repeat verifications this soon after the first still succeed.
///
/// One page load can hit the link twice (mail client prefetch, double
/// submit). This keeps the real user from seeing "already used"; it is not
/// a general reuse allowance.
pub const MAGIC_LINK_REUSE_GRACE: Duration = Duration::seconds(1);

pub const VERIFY_PATH: &str = "/auth/magic-link/verify";

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct MagicLinkRequest {
    pub email: String,
    pub origin: String,
    pub purpose: MagicLinkPurpose,
    pub redirect_to: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedMagicLink {
    pub email: String,
    pub expires_at: OffsetDateTime,
    pub verification_url: String,
    /// Raw token, only in development.
    pub debug_token: Option<String>,
    pub delivery: DeliveryStatus,
}

#[derive(Debug, Clone)]
pub struct VerifiedMagicLink {
    pub user: User,
    pub redirect_to: String,
    pub purpose: MagicLinkPurpose,
}

#[derive(Debug, Error)]
pub enum MagicLinkError {
    #[error("email is required")]
    EmptyEmail,

    #[error("invalid origin for verification url: {0:?}")]
    InvalidOrigin(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid magic link token")]
    InvalidToken,

    #[error("magic link expired")]
    Expired,

    #[error("magic link already used")]
    AlreadyUsed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VerifyError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
            Self::Store(_) => "server_error",
        }
    }
}

pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn verification_url(origin: &str, token: &str) -> Result<Url, MagicLinkError> {
    let base = Url::parse(origin)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .ok_or_else(|| MagicLinkError::InvalidOrigin(origin.to_string()))?;
    let mut url = base
        .join(VERIFY_PATH)
        .map_err(|_| MagicLinkError::InvalidOrigin(origin.to_string()))?;
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

pub async fn create_magic_link_request(
    st: &AppState,
    req: MagicLinkRequest,
) -> Result<IssuedMagicLink, MagicLinkError> {
    create_magic_link_request_at(st, req, OffsetDateTime::now_utc()).await
}

async fn create_magic_link_request_at(
    st: &AppState,
    req: MagicLinkRequest,
    now: OffsetDateTime,
) -> Result<IssuedMagicLink, MagicLinkError> {
    if req.email.trim().is_empty() {
        return Err(MagicLinkError::EmptyEmail);
    }

    // housekeeping only; a failure here must not block issuing
    match st.store.purge_expired_magic_links(now).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "purged expired magic links"),
        Err(e) => warn!(error = %e, "purging expired magic links failed"),
    }

    let user = st.store.upsert_user_by_email(&req.email, now).await?;

    let token = generate_token();
    let expires_at = now + MAGIC_LINK_TTL;
    let url = verification_url(&req.origin, &token)?;

    st.store
        .append_magic_link(MagicLink {
            token_hash: hash_token(&token),
            email: user.email.clone(),
            redirect_to: req.redirect_to.unwrap_or_else(|| DEFAULT_REDIRECT.to_string()),
            expires_at,
            created_at: now,
            consumed_at: None,
            purpose: req.purpose,
            metadata: Some(MagicLinkMetadata {
                preview_url: Some(url.to_string()),
                request_ip: req.request_ip,
                user_agent: req.user_agent,
            }),
        })
        .await?;

    let email = MagicLinkEmail {
        to: user.email.clone(),
        url: url.to_string(),
        expires_at,
        purpose: req.purpose,
    };
    let delivery = match st.mailer.send(&email).await {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, email = %user.email, "failed to deliver magic link email");
            DeliveryStatus::Failed
        }
    };

    info!(
        user_id = %user.id,
        email = %user.email,
        purpose = req.purpose.as_str(),
        delivery = ?delivery,
        "magic link issued"
    );

    Ok(IssuedMagicLink {
        email: user.email,
        expires_at,
        verification_url: url.to_string(),
        debug_token: st.config.environment.is_development().then_some(token),
        delivery,
    })
}

pub async fn verify_magic_link_token(
    store: &FileStore,
    raw_token: &str,
) -> Result<VerifiedMagicLink, VerifyError> {
    verify_magic_link_token_at(store, raw_token, OffsetDateTime::now_utc()).await
}

async fn verify_magic_link_token_at(
    store: &FileStore,
    raw_token: &str,
    now: OffsetDateTime,
) -> Result<VerifiedMagicLink, VerifyError> {
    if raw_token.is_empty() {
        return Err(VerifyError::InvalidToken);
    }

    match store
        .consume_magic_link(&hash_token(raw_token), now, MAGIC_LINK_REUSE_GRACE)
        .await?
    {
        ConsumeOutcome::NotFound => Err(VerifyError::InvalidToken),
        ConsumeOutcome::Expired => Err(VerifyError::Expired),
        ConsumeOutcome::AlreadyUsed { .. } => Err(VerifyError::AlreadyUsed),
        ConsumeOutcome::Consumed {
            link,
            user,
            first_use,
        } => {
            info!(user_id = %user.id, purpose = link.purpose.as_str(), first_use, "magic link verified");
            Ok(VerifiedMagicLink {
                user,
                redirect_to: link.redirect_to,
                purpose: link.purpose,
            })
        }
    }
}
