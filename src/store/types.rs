use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What a magic link was requested for.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MagicLinkPurpose {
    #[default]
    Login,
    Register,
}

impl MagicLinkPurpose {
    /// Anything other than `register` is a login.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some("register") => Self::Register,
            _ => Self::Login,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// User record in the auth document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String, // normalized, unique
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>, // Argon2 PHC string
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub request_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Outstanding or consumed magic link. Only the SHA-256 of the raw token is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MagicLink {
    pub token_hash: String,
    pub email: String,
    pub redirect_to: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub consumed_at: Option<OffsetDateTime>,
    pub purpose: MagicLinkPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MagicLinkMetadata>,
}

impl MagicLink {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// The whole backing file. `jobs` belongs to the job board and is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub jobs: serde_json::Value,
    pub users: Vec<User>,
    pub magic_links: Vec<MagicLink>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            jobs: serde_json::Value::Array(Vec::new()),
            users: Vec::new(),
            magic_links: Vec::new(),
        }
    }
}

impl Document {
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    pub fn user_by_email_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.email == email)
    }
}

/// Trim and lowercase; the form every stored email is kept in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
