use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::mail::{self, Mailer};
use crate::store::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<FileStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        if config.session.insecure_fallback {
            warn!("AUTH_SECRET not set; signing sessions with the development placeholder secret");
        }

        let store = Arc::new(FileStore::new(config.db_path.clone()));
        let mailer = mail::from_config(&config)?;

        Ok(Self {
            config,
            store,
            mailer,
        })
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<FileStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config,
            store,
            mailer,
        }
    }

    /// State over a throwaway store with a recording mailer.
    #[cfg(test)]
    pub fn fake(
        dir: &std::path::Path,
        environment: crate::config::Environment,
    ) -> (Self, Arc<testing::RecordingMailer>) {
        let config = Arc::new(AppConfig {
            environment,
            host: "127.0.0.1".into(),
            port: 0,
            public_url: None,
            db_path: dir.join("db.json"),
            session: crate::config::SessionConfig {
                secret: "test-secret".into(),
                insecure_fallback: false,
            },
            smtp: None,
            mail_from: crate::config::DEFAULT_MAIL_FROM.into(),
        });
        let store = Arc::new(FileStore::new(config.db_path.clone()));
        let mailer = Arc::new(testing::RecordingMailer::default());
        (
            Self::from_parts(config, store, mailer.clone() as Arc<dyn Mailer>),
            mailer,
        )
    }
}
