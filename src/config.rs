use std::path::PathBuf;

/// Placeholder used when no signing secret is configured outside production.
pub const DEV_FALLBACK_SECRET: &str = "insecure-development-secret-change-me";

pub const DEFAULT_MAIL_FROM: &str = "Rakamin <no-reply@rakamin.com>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => anyhow::bail!("unknown APP_ENV value: {other}"),
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    /// True when `secret` is the development placeholder.
    pub insecure_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub public_url: Option<String>,
    pub db_path: PathBuf,
    pub session: SessionConfig,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::parse(&std::env::var("APP_ENV").unwrap_or_default())?;

        let secret = non_empty_var("AUTH_SECRET").or_else(|| non_empty_var("JWT_SECRET"));
        let session = match secret {
            Some(secret) => SessionConfig {
                secret,
                insecure_fallback: false,
            },
            None if environment.is_production() => {
                anyhow::bail!("AUTH_SECRET (or JWT_SECRET) must be set when APP_ENV=production")
            }
            None => SessionConfig {
                secret: DEV_FALLBACK_SECRET.into(),
                insecure_fallback: true,
            },
        };

        let smtp = match (
            non_empty_var("SMTP_HOST"),
            non_empty_var("SMTP_PORT"),
            non_empty_var("SMTP_USER"),
            non_empty_var("SMTP_PASS"),
        ) {
            (Some(host), Some(port), Some(user), Some(pass)) => Some(SmtpConfig {
                host,
                port: port
                    .parse::<u16>()
                    .map_err(|e| anyhow::anyhow!("invalid SMTP_PORT {port:?}: {e}"))?,
                user,
                pass,
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            public_url: non_empty_var("APP_PUBLIC_URL"),
            db_path: non_empty_var("AUTH_DB_PATH")
                .unwrap_or_else(|| "db.json".into())
                .into(),
            session,
            smtp,
            mail_from: non_empty_var("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.into()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
