use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use time::OffsetDateTime;
use tracing::debug;

use super::{template, DeliveryStatus, MagicLinkEmail, Mailer};
use crate::config::SmtpConfig;

/// Port on which SMTP speaks TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig, from: &str) -> anyhow::Result<Self> {
        let builder = if cfg.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
        }
        .with_context(|| format!("smtp relay {}", cfg.host))?;

        let transport = builder
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.pass.clone()))
            .build();
        let from = from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid MAIL_FROM {from:?}"))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &MagicLinkEmail) -> anyhow::Result<DeliveryStatus> {
        let rendered = template::render(email, OffsetDateTime::now_utc());
        let to = email
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient {}", email.to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(rendered.subject)
            .multipart(MultiPart::alternative_plain_html(rendered.text, rendered.html))
            .context("build magic link message")?;

        let response = self.transport.send(message).await.context("smtp send")?;
        debug!(to = %email.to, code = %response.code(), "magic link email sent");
        Ok(DeliveryStatus::Sent)
    }
}
