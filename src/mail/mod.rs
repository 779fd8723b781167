//! Magic-link email delivery.
//!
//! `SmtpMailer` is used when all SMTP settings are present. Without them the
//! service falls back to `LogMailer`, which only logs a preview of the message
//! so local development works without a mail server.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{config::AppConfig, store::MagicLinkPurpose};

mod smtp;
pub mod template;

pub use smtp::SmtpMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicLinkEmail {
    pub to: String,
    pub url: String,
    pub expires_at: OffsetDateTime,
    pub purpose: MagicLinkPurpose,
}

/// How far a notification got. The link itself is valid either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    /// No transport configured; the message was only logged.
    Previewed,
    Failed,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &MagicLinkEmail) -> anyhow::Result<DeliveryStatus>;
}

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &MagicLinkEmail) -> anyhow::Result<DeliveryStatus> {
        let rendered = template::render(email, OffsetDateTime::now_utc());
        info!(
            to = %email.to,
            subject = %rendered.subject,
            purpose = email.purpose.as_str(),
            url = %email.url,
            "smtp not configured; magic link email preview"
        );
        Ok(DeliveryStatus::Previewed)
    }
}

pub fn from_config(config: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp, &config.mail_from)?)),
        None => {
            warn!("SMTP env not fully set, falling back to log-only mail preview");
            Ok(Arc::new(LogMailer))
        }
    }
}
