//! API version parsing and negotiation.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// REST API version in `vMAJOR.MINOR` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApiVersion {
    major: u16,
    minor: u16,
}

/// Versions this client knows how to speak, oldest first.
pub const SUPPORTED_API_VERSIONS: &[ApiVersion] = &[
    ApiVersion::new(23, 1),
    ApiVersion::new(23, 2),
    ApiVersion::new(23, 3),
    ApiVersion::new(24, 1),
    ApiVersion::new(24, 2),
    ApiVersion::new(24, 3),
    ApiVersion::new(25, 1),
    ApiVersion::new(25, 2),
];

impl ApiVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    pub fn minor(&self) -> u16 {
        self.minor
    }

    /// Newest version in [`SUPPORTED_API_VERSIONS`].
    pub fn latest_supported() -> Self {
        SUPPORTED_API_VERSIONS
            .iter()
            .copied()
            .max()
            .unwrap_or(Self::new(23, 1))
    }

    /// Path segment used in `/api/{version}/...`.
    pub fn path_segment(&self) -> String {
        self.to_string()
    }

    /// `/api/{version}/{suffix}`.
    pub fn api_path(&self, suffix: &str) -> String {
        format!("/api/{}/{}", self, suffix.trim_start_matches('/'))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Error returned when a version string is not `vMAJOR.MINOR`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid API version: {0:?}")]
pub struct ParseVersionError(pub String);

impl FromStr for ApiVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let (major, minor) = digits
            .split_once('.')
            .ok_or_else(|| ParseVersionError(s.to_string()))?;

        let major = major
            .parse()
            .map_err(|_| ParseVersionError(s.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| ParseVersionError(s.to_string()))?;

        Ok(Self { major, minor })
    }
}

/// Picks the highest version offered by the server that the client also supports.
pub fn negotiate(
    offered: impl IntoIterator<Item = ApiVersion>,
    supported: &[ApiVersion],
) -> Option<ApiVersion> {
    offered
        .into_iter()
        .filter(|v| supported.contains(v))
        .max()
}

/// Reads the version listing payload (`{"values": {"v24.1": "...", ...}}`).
///
/// Keys that do not parse as versions are skipped.
pub(crate) fn parse_version_listing(payload: &Value) -> Vec<ApiVersion> {
    payload
        .get("values")
        .and_then(Value::as_object)
        .map(|values| values.keys().filter_map(|k| k.parse().ok()).collect())
        .unwrap_or_default()
}
