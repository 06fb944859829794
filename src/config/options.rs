//! Recognised client options.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ConfigError, ConfigResult};
use crate::client::RetryConfig;
use crate::version::ApiVersion;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(300);

/// Option keys accepted by [`ClientOptions::from_value`] (camelCase or snake_case).
pub const KNOWN_OPTIONS: &[(&str, &str)] = &[
    ("validateOnBuild", "validate_on_build"),
    ("timeoutSeconds", "timeout_seconds"),
    ("logApiErrors", "log_api_errors"),
    ("maxRetryAttempts", "max_retry_attempts"),
    ("apiVersion", "api_version"),
    ("validationIntervalSeconds", "validation_interval_seconds"),
];

/// Immutable client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Authenticate inside `build()` and surface failures there.
    pub validate_on_build: bool,
    /// Deadline for each session operation, retries included.
    pub timeout: Duration,
    /// Log `FAILURE` envelopes at warn level.
    pub log_api_errors: bool,
    pub retry: RetryConfig,
    /// Pin the API version instead of negotiating it.
    pub api_version: Option<ApiVersion>,
    /// Maximum session age before `Client::ensure_valid` re-validates.
    pub validation_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            validate_on_build: true,
            timeout: DEFAULT_TIMEOUT,
            log_api_errors: true,
            retry: RetryConfig::default(),
            api_version: None,
            validation_interval: DEFAULT_VALIDATION_INTERVAL,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawOptions {
    #[serde(default, alias = "validate_on_build")]
    validate_on_build: Option<bool>,
    #[serde(default, alias = "timeout_seconds")]
    timeout_seconds: Option<u64>,
    #[serde(default, alias = "log_api_errors")]
    log_api_errors: Option<bool>,
    #[serde(default, alias = "max_retry_attempts")]
    max_retry_attempts: Option<u32>,
    #[serde(default, alias = "api_version")]
    api_version: Option<String>,
    #[serde(default, alias = "validation_interval_seconds")]
    validation_interval_seconds: Option<u64>,
}

impl ClientOptions {
    pub fn with_validate_on_build(mut self, validate: bool) -> Self {
        self.validate_on_build = validate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log_api_errors(mut self, log: bool) -> Self {
        self.log_api_errors = log;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    /// Builds options from a JSON object, rejecting unrecognised keys.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ConfigError::InvalidOption {
                    key: "options".into(),
                    message: format!("expected an object, got {}", other),
                });
            }
        };

        if let Some(unknown) = map.keys().find(|k| !is_known(k)) {
            return Err(ConfigError::UnknownOption(unknown.clone()));
        }

        let raw: RawOptions =
            serde_json::from_value(Value::Object(map)).map_err(|e| ConfigError::InvalidOption {
                key: "options".into(),
                message: e.to_string(),
            })?;

        Self::default().apply(raw)
    }

    /// Builds options from string pairs such as parsed `key=value` arguments.
    ///
    /// Values are read as JSON when possible (`true`, `30`) and as strings otherwise.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> ConfigResult<Self>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let map: Map<String, Value> = pairs
            .into_iter()
            .map(|(k, v)| {
                let v = v.as_ref();
                let parsed = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.into()));
                (k.into(), parsed)
            })
            .collect();
        Self::from_value(Value::Object(map))
    }

    fn apply(mut self, raw: RawOptions) -> ConfigResult<Self> {
        if let Some(v) = raw.validate_on_build {
            self.validate_on_build = v;
        }
        if let Some(secs) = raw.timeout_seconds {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = raw.log_api_errors {
            self.log_api_errors = v;
        }
        if let Some(attempts) = raw.max_retry_attempts {
            if attempts == 0 {
                return Err(invalid("maxRetryAttempts", "must be at least 1"));
            }
            self.retry = self.retry.with_max_attempts(attempts);
        }
        if let Some(version) = raw.api_version {
            let parsed = version
                .parse()
                .map_err(|e: crate::version::ParseVersionError| {
                    invalid("apiVersion", &e.to_string())
                })?;
            self.api_version = Some(parsed);
        }
        if let Some(secs) = raw.validation_interval_seconds {
            self.validation_interval = Duration::from_secs(secs);
        }
        self.validate()?;
        Ok(self)
    }

    /// Rejects values that would make every operation fail.
    ///
    /// Called by [`from_value`](Self::from_value) and by `ClientBuilder::build`,
    /// so options assembled with the `with_*` setters are checked too.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(invalid("timeoutSeconds", "must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("maxRetryAttempts", "must be at least 1"));
        }
        Ok(())
    }
}

fn is_known(key: &str) -> bool {
    KNOWN_OPTIONS
        .iter()
        .any(|(camel, snake)| key == *camel || key == *snake)
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidOption {
        key: key.into(),
        message: message.into(),
    }
}
