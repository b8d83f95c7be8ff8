use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Hosted data platform
    pub platform_url: String,
    pub platform_anon_key: String,

    // Site
    pub site_title: String,
    /// Public origin of this site, used as the password-recovery redirect.
    pub site_url: String,
    pub admin_email: Option<String>,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Comment change watcher
    pub comment_watch_enabled: bool,
    pub comment_poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Hosted data platform
            platform_url: required_env("PLATFORM_URL")?,
            platform_anon_key: required_env("PLATFORM_ANON_KEY")?,

            // Site
            site_title: env_or_default("SITE_TITLE", "コレクション"),
            site_url: env_or_default("SITE_URL", "http://localhost:8080"),
            admin_email: optional_env("ADMIN_EMAIL"),

            // Web server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,

            // Comment change watcher
            comment_watch_enabled: parse_env_bool("COMMENT_WATCH_ENABLED", true)?,
            comment_poll_interval: Duration::from_secs(parse_env_u64(
                "COMMENT_POLL_INTERVAL_SECS",
                15,
            )?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.platform_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "PLATFORM_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.platform_url),
            });
        }
        if self.platform_anon_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "PLATFORM_ANON_KEY".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if Url::parse(&self.site_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "SITE_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.site_url),
            });
        }
        if self.comment_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "COMMENT_POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the given email belongs to the configured admin.
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email))
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
