//! Environment-driven configuration.

use crate::fields::FieldFetchMode;
use crate::retry::RetryPolicy;
use std::time::Duration;

const DEFAULT_SCIM_URL: &str = "https://api.slack.com/scim/v1";
const DEFAULT_WEB_API_URL: &str = "https://slack.com/api";

/// Connection and resilience settings for a [`Directory`](crate::Directory).
#[derive(Clone)]
pub struct DirectoryConfig {
    /// Bearer token for both APIs.
    pub token: String,

    /// Provisioning API base URL.
    pub scim_url: String,

    /// Web API base URL.
    pub web_api_url: String,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    pub max_retries: u32,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,

    /// Overall deadline per retried call. No deadline when unset.
    pub retry_deadline_secs: Option<u64>,

    /// Behaviour when the custom field schema cannot be fetched.
    pub field_fetch_mode: FieldFetchMode,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("token", &"[REDACTED]")
            .field("scim_url", &self.scim_url)
            .field("web_api_url", &self.web_api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_secs", &self.retry_base_delay_secs)
            .field("retry_max_delay_secs", &self.retry_max_delay_secs)
            .field("retry_deadline_secs", &self.retry_deadline_secs)
            .field("field_fetch_mode", &self.field_fetch_mode)
            .finish()
    }
}

impl DirectoryConfig {
    /// Config with default endpoints and policies for the given token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            scim_url: DEFAULT_SCIM_URL.to_string(),
            web_api_url: DEFAULT_WEB_API_URL.to_string(),
            request_timeout_secs: 30,
            max_retries: 5,
            retry_base_delay_secs: 1,
            retry_max_delay_secs: 60,
            retry_deadline_secs: None,
            field_fetch_mode: FieldFetchMode::Silent,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Lets tests supply variables without touching the process environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let token = reader("DIRECTORY_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DIRECTORY_TOKEN".into()))?;

        let scim_url =
            reader("DIRECTORY_SCIM_URL").unwrap_or_else(|_| DEFAULT_SCIM_URL.to_string());
        let web_api_url =
            reader("DIRECTORY_WEB_API_URL").unwrap_or_else(|_| DEFAULT_WEB_API_URL.to_string());

        let request_timeout_secs = parse_or(&reader, "DIRECTORY_REQUEST_TIMEOUT_SECS", 30)?;
        let max_retries = parse_or(&reader, "DIRECTORY_MAX_RETRIES", 5)?;
        let retry_base_delay_secs = parse_or(&reader, "DIRECTORY_RETRY_BASE_DELAY_SECS", 1)?;
        let retry_max_delay_secs = parse_or(&reader, "DIRECTORY_RETRY_MAX_DELAY_SECS", 60)?;

        let retry_deadline_secs = match reader("DIRECTORY_RETRY_DEADLINE_SECS") {
            Ok(v) => Some(v.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("DIRECTORY_RETRY_DEADLINE_SECS".into(), e.to_string())
            })?),
            Err(_) => None,
        };

        let field_fetch_mode = reader("DIRECTORY_FIELD_FETCH_MODE")
            .unwrap_or_else(|_| "silent".to_string())
            .parse::<FieldFetchMode>()
            .map_err(|e| ConfigError::InvalidValue("DIRECTORY_FIELD_FETCH_MODE".into(), e))?;

        Ok(Self {
            token,
            scim_url,
            web_api_url,
            request_timeout_secs,
            max_retries,
            retry_base_delay_secs,
            retry_max_delay_secs,
            retry_deadline_secs,
            field_fetch_mode,
        })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy described by this config.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_secs: self.retry_base_delay_secs,
            max_delay_secs: self.retry_max_delay_secs,
            total_timeout: self.retry_deadline_secs.map(Duration::from_secs),
        }
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
