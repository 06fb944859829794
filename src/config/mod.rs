//! Client configuration and local validation errors.
//!
//! ```rust
//! use std::time::Duration;
//! use tenant_session::config::ClientOptions;
//!
//! let options = ClientOptions::default()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_validate_on_build(false);
//! assert_eq!(options.timeout, Duration::from_secs(30));
//! ```

mod options;

pub use options::{ClientOptions, DEFAULT_TIMEOUT, DEFAULT_VALIDATION_INTERVAL, KNOWN_OPTIONS};

use thiserror::Error;

/// Errors raised before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required credential field is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// An option key the client does not recognise.
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// A recognised option with an unusable value.
    #[error("Invalid value for {key}: {message}")]
    InvalidOption {
        /// The option key
        key: String,
        /// Error message
        message: String,
    },

    /// Tenant host could not be reduced to `host[:port]`.
    #[error("Invalid tenant host: {0}")]
    InvalidTenantHost(String),

    /// A blank client identity field.
    #[error("Client identity field is empty: {0}")]
    InvalidIdentity(&'static str),

    /// The default HTTP transport could not be constructed.
    #[error("Transport setup failed: {0}")]
    Transport(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
