//! Process configuration read from the environment.

use chrono::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 300;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 86_400;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive number of seconds, got {value:?}")]
    InvalidTtl { name: &'static str, value: String },
}

/// Runtime configuration of the API server.
#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

impl ApiConfig {
    /// Defaults with the given signing secret and an in-memory store.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            });

        let mut config = Self::new(jwt_secret);
        if let Some(addr) = lookup("BIND_ADDR").filter(|s| !s.is_empty()) {
            config.bind_addr = addr;
        }
        config.database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());

        if let Some(raw) = lookup("ACCESS_TOKEN_TTL_SECS") {
            config.access_token_ttl = parse_ttl("ACCESS_TOKEN_TTL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("REFRESH_TOKEN_TTL_SECS") {
            config.refresh_token_ttl = parse_ttl("REFRESH_TOKEN_TTL_SECS", &raw)?;
        }
        Ok(config)
    }
}

fn parse_ttl(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<i64>() {
        Ok(secs) if secs > 0 => Ok(Duration::seconds(secs)),
        _ => Err(ConfigError::InvalidTtl {
            name,
            value: raw.to_string(),
        }),
    }
}
