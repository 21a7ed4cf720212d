//! Environment configuration. `.env` is loaded by the binaries before any of
//! this runs; every value here has a default except the JWT secret.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use trustlet_notify::{DisabledMailer, Mailer, ResendMailer};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub const DEFAULT_FROM_EMAIL: &str = "Trustlet <admin@amstrustlet.app>";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TRUSTLET_JWT_SECRET is unset or still a placeholder")]
    InsecureSecret,
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Without a key, notifications are skipped and reported as not configured.
    pub api_key: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

impl MailConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_or(lookup, "TRUSTLET_EMAIL_TIMEOUT_SECS", 10)?;
        Ok(Self {
            api_key: lookup("RESEND_API_KEY").filter(|k| !k.trim().is_empty()),
            from: lookup("TRUSTLET_FROM_EMAIL").unwrap_or_else(|| DEFAULT_FROM_EMAIL.into()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn mailer(&self) -> anyhow::Result<Arc<dyn Mailer>> {
        match &self.api_key {
            Some(key) => Ok(Arc::new(ResendMailer::new(key.clone(), self.timeout)?)),
            None => {
                warn!("RESEND_API_KEY is not set, email notifications are disabled");
                Ok(Arc::new(DisabledMailer))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub beta_cap: Option<u64>,
    pub busy_timeout: Duration,
    pub store_timeout: Duration,
    pub mail: MailConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("TRUSTLET_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::InsecureSecret);
        }

        let busy_ms: u64 = parse_or(lookup, "TRUSTLET_DB_BUSY_TIMEOUT_MS", 5_000)?;
        let store_secs: u64 = parse_or(lookup, "TRUSTLET_STORE_TIMEOUT_SECS", 10)?;

        Ok(Self {
            host: lookup("TRUSTLET_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(lookup, "TRUSTLET_PORT", 3000)?,
            db_path: lookup("TRUSTLET_DB_PATH")
                .unwrap_or_else(|| "trustlet.db".into())
                .into(),
            jwt_secret,
            beta_cap: parse_opt(lookup, "TRUSTLET_BETA_CAP")?,
            busy_timeout: Duration::from_millis(busy_ms),
            store_timeout: Duration::from_secs(store_secs),
            mail: MailConfig::from_lookup(lookup)?,
        })
    }
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn placeholder_secret_is_refused() {
        for secret in ["", "dev-secret-change-me"] {
            let err = ServerConfig::from_lookup(&lookup(&[("TRUSTLET_JWT_SECRET", secret)])).unwrap_err();
            assert!(matches!(err, ConfigError::InsecureSecret));
        }
    }

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_lookup(&lookup(&[("TRUSTLET_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("trustlet.db"));
        assert_eq!(config.beta_cap, None);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(config.mail.api_key.is_none());
        assert_eq!(config.mail.from, DEFAULT_FROM_EMAIL);
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let err = ServerConfig::from_lookup(&lookup(&[
            ("TRUSTLET_JWT_SECRET", "s3cret"),
            ("TRUSTLET_BETA_CAP", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TRUSTLET_BETA_CAP"));
    }

    #[test]
    fn beta_cap_and_mail_are_read() {
        let config = ServerConfig::from_lookup(&lookup(&[
            ("TRUSTLET_JWT_SECRET", "s3cret"),
            ("TRUSTLET_BETA_CAP", "200"),
            ("RESEND_API_KEY", "re_123"),
            ("TRUSTLET_EMAIL_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.beta_cap, Some(200));
        assert_eq!(config.mail.api_key.as_deref(), Some("re_123"));
        assert_eq!(config.mail.timeout, Duration::from_secs(3));
    }
}
