use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::normalize::normalize_document;
use super::types::{normalize_email, Document, MagicLink, MagicLinkPurpose, User};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("auth store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("auth store {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize auth store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of looking up a magic link for consumption.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    /// No link with that hash, or its owner no longer exists.
    NotFound,
    Expired,
    /// Consumed earlier than the grace window allows.
    AlreadyUsed { consumed_at: OffsetDateTime },
    Consumed {
        link: MagicLink,
        user: User,
        /// False when this was a repeat inside the grace window.
        first_use: bool,
    },
}

/// Users and magic links in a single JSON file.
///
/// Every operation loads the entire document, mutates it in memory and writes
/// it back whole. The mutex serializes those sequences within this process;
/// other processes writing the same file are not coordinated with.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and normalize the document. A missing file is an empty document.
    pub async fn load(&self) -> StoreResult<Document> {
        let _guard = self.lock.lock().await;
        self.read_document().await
    }

    /// Overwrite the document.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn save(&self, doc: &Document) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.write_document(doc).await
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let doc = self.load().await?;
        Ok(doc.user_by_email(&email).cloned())
    }

    /// Create the user if the normalized email is unknown, else touch `updated_at`.
    pub async fn upsert_user_by_email(&self, email: &str, now: OffsetDateTime) -> StoreResult<User> {
        let email = normalize_email(email);
        self.mutate(|doc| {
            if let Some(existing) = doc.user_by_email_mut(&email) {
                existing.updated_at = now;
                return (existing.clone(), true);
            }
            let user = User {
                id: Uuid::new_v4().to_string(),
                email: email.clone(),
                created_at: now,
                updated_at: now,
                last_login_at: None,
                password_hash: None,
            };
            debug!(user_id = %user.id, email = %user.email, "user created");
            doc.users.push(user.clone());
            (user, true)
        })
        .await
    }

    /// Stamp a login on an existing user. `None` if the email is unknown.
    pub async fn record_user_login(
        &self,
        email: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        self.mutate(|doc| match doc.user_by_email_mut(&email) {
            Some(user) => {
                user.last_login_at = Some(now);
                user.updated_at = now;
                (Some(user.clone()), true)
            }
            None => (None, false),
        })
        .await
    }

    pub async fn set_password_hash(
        &self,
        email: &str,
        password_hash: String,
        now: OffsetDateTime,
    ) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        self.mutate(|doc| match doc.user_by_email_mut(&email) {
            Some(user) => {
                user.password_hash = Some(password_hash);
                user.updated_at = now;
                (Some(user.clone()), true)
            }
            None => (None, false),
        })
        .await
    }

    pub async fn append_magic_link(&self, link: MagicLink) -> StoreResult<()> {
        self.mutate(|doc| {
            doc.magic_links.push(link);
            ((), true)
        })
        .await
    }

    /// Look up a link by token hash and consume it if it is still usable.
    ///
    /// A link consumed within `grace` of `now` is reported as consumed again
    /// without being rewritten. Expired links are never marked consumed.
    pub async fn consume_magic_link(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        grace: Duration,
    ) -> StoreResult<ConsumeOutcome> {
        self.mutate(|doc| {
            let Some(index) = doc.magic_links.iter().position(|l| l.token_hash == token_hash) else {
                return (ConsumeOutcome::NotFound, false);
            };
            let email = doc.magic_links[index].email.clone();
            if doc.user_by_email(&email).is_none() {
                return (ConsumeOutcome::NotFound, false);
            }

            let link = &mut doc.magic_links[index];
            if link.is_expired_at(now) {
                return (ConsumeOutcome::Expired, false);
            }
            if let Some(consumed_at) = link.consumed_at {
                if consumed_at + grace < now {
                    return (ConsumeOutcome::AlreadyUsed { consumed_at }, false);
                }
                let link = link.clone();
                let user = doc.user_by_email(&email).cloned();
                return match user {
                    Some(user) => (
                        ConsumeOutcome::Consumed {
                            link,
                            user,
                            first_use: false,
                        },
                        false,
                    ),
                    None => (ConsumeOutcome::NotFound, false),
                };
            }

            link.consumed_at = Some(now);
            let link = link.clone();
            match doc.user_by_email_mut(&email) {
                Some(user) => {
                    user.last_login_at = Some(now);
                    user.updated_at = now;
                    let user = user.clone();
                    (
                        ConsumeOutcome::Consumed {
                            link,
                            user,
                            first_use: true,
                        },
                        true,
                    )
                }
                None => (ConsumeOutcome::NotFound, false),
            }
        })
        .await
    }

    /// Drop every link whose expiry has passed. Returns how many were removed.
    pub async fn purge_expired_magic_links(&self, now: OffsetDateTime) -> StoreResult<usize> {
        self.mutate(|doc| {
            let before = doc.magic_links.len();
            doc.magic_links.retain(|link| !link.is_expired_at(now));
            let removed = before - doc.magic_links.len();
            (removed, removed > 0)
        })
        .await
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn list_magic_links_for_email(
        &self,
        email: &str,
        purpose: Option<MagicLinkPurpose>,
    ) -> StoreResult<Vec<MagicLink>> {
        let email = normalize_email(email);
        let doc = self.load().await?;
        Ok(doc
            .magic_links
            .into_iter()
            .filter(|link| link.email == email)
            .filter(|link| purpose.map_or(true, |p| link.purpose == p))
            .collect())
    }

    /// Load, apply `f`, and write back when `f` reports a change.
    async fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> (R, bool)) -> StoreResult<R> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let (result, changed) = f(&mut doc);
        if changed {
            self.write_document(&doc).await?;
        }
        Ok(result)
    }

    async fn read_document(&self) -> StoreResult<Document> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Document::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            warn!(path = %self.path.display(), "auth store is empty; starting fresh");
            return Ok(Document::default());
        }
        let raw: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(normalize_document(raw, OffsetDateTime::now_utc()))
    }

    async fn write_document(&self, doc: &Document) -> StoreResult<()> {
        let mut serialized = serde_json::to_string_pretty(doc)?;
        serialized.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, serialized)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
