//! Configuration types.
//!
//! Everything is read once at startup and passed down explicitly.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// How handoff payloads leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffMode {
    /// One spawned task per request; nothing observes the result.
    Detached,
    /// Bounded in-process queue drained by a delivery worker with retries.
    Queued,
}

impl std::str::FromStr for HandoffMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detached" => Ok(Self::Detached),
            "queued" => Ok(Self::Queued),
            other => Err(format!("expected `detached` or `queued`, got `{other}`")),
        }
    }
}

/// Agent handoff settings.
#[derive(Debug, Clone)]
pub struct HandoffConfig {
    pub mode: HandoffMode,
    /// Explicit agent base URL. When unset, the request's own origin is used.
    pub agent_url: Option<String>,
    /// Pause after dispatch before responding to the relay.
    pub grace_period: Duration,
    /// Queue capacity (queued mode only).
    pub queue_capacity: usize,
    /// Delivery attempts per payload (queued mode only).
    pub max_attempts: u32,
    /// First retry delay; doubles on each attempt (queued mode only).
    pub base_backoff: Duration,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            mode: HandoffMode::Detached,
            agent_url: None,
            grace_period: Duration::from_millis(1000),
            queue_capacity: 256,
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// SMTP settings for notice emails.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// App store id of the companion integration users must install.
    pub app_id: String,
    /// Install link sent to users who have not installed the app.
    pub app_url: String,
    /// Scheduling API key handed (encrypted) to the agent.
    pub api_key: SecretString,
    /// 32-byte hex key used to encrypt `api_key`.
    pub encryption_key: SecretString,
    /// Scheduling API base URL.
    pub backend_url: String,
    pub handoff: HandoffConfig,
    pub http_timeout: Duration,
    pub max_body_bytes: usize,
    pub port: u16,
    pub database_path: PathBuf,
    pub smtp: SmtpConfig,
}

impl GatewayConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let defaults = HandoffConfig::default();
        let handoff = HandoffConfig {
            mode: parse_or(&var, "HANDOFF_MODE", defaults.mode)?,
            agent_url: var("AGENT_URL").map(|u| u.trim_end_matches('/').to_string()),
            grace_period: Duration::from_millis(parse_or(&var, "HANDOFF_GRACE_MS", 1000)?),
            queue_capacity: parse_or(&var, "HANDOFF_QUEUE_CAPACITY", defaults.queue_capacity)?,
            max_attempts: parse_or(&var, "HANDOFF_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_backoff: Duration::from_millis(parse_or(&var, "HANDOFF_BACKOFF_MS", 500)?),
        };
        if handoff.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HANDOFF_QUEUE_CAPACITY".into(),
                message: "must be at least 1".into(),
            });
        }

        let smtp_username = var("SMTP_USERNAME").unwrap_or_default();
        let smtp = SmtpConfig {
            host: required("SMTP_HOST")?,
            port: parse_or(&var, "SMTP_PORT", 587)?,
            password: SecretString::from(var("SMTP_PASSWORD").unwrap_or_default()),
            from_address: var("SMTP_FROM_ADDRESS").unwrap_or_else(|| smtp_username.clone()),
            username: smtp_username,
        };

        Ok(Self {
            app_id: var("APP_ID").unwrap_or_else(|| "cal-ai".to_string()),
            app_url: required("APP_URL")?,
            api_key: SecretString::from(required("CAL_API_KEY")?),
            encryption_key: SecretString::from(required("ENCRYPTION_KEY")?),
            backend_url: required("BACKEND_URL")?.trim_end_matches('/').to_string(),
            handoff,
            http_timeout: Duration::from_secs(parse_or(&var, "HTTP_TIMEOUT_SECS", 30)?),
            max_body_bytes: parse_or(&var, "MAX_BODY_BYTES", 25 * 1024 * 1024)?,
            port: parse_or(&var, "PORT", 8080)?,
            database_path: var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/mail-handoff.db")),
            smtp,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
