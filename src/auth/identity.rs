//! Caller identity attached to every authentication call.

use crate::config::ConfigError;

/// Identifies the calling program for server-side auditing.
///
/// Rendered as `{company}-{organization}-{team}-{client|server}-{program}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub company: String,
    pub organization: String,
    pub team: String,
    pub is_client_application: bool,
    pub program_or_instance_name: String,
}

impl ClientIdentity {
    pub fn new(
        company: impl Into<String>,
        organization: impl Into<String>,
        team: impl Into<String>,
        is_client_application: bool,
        program_or_instance_name: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            organization: organization.into(),
            team: team.into(),
            is_client_application,
            program_or_instance_name: program_or_instance_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("company", &self.company),
            ("organization", &self.organization),
            ("team", &self.team),
            ("programOrInstanceName", &self.program_or_instance_name),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidIdentity(name));
            }
        }
        Ok(())
    }

    pub fn client_id(&self) -> String {
        let kind = if self.is_client_application {
            "client"
        } else {
            "server"
        };
        [
            sanitize(&self.company),
            sanitize(&self.organization),
            sanitize(&self.team),
            kind.to_string(),
            sanitize(&self.program_or_instance_name),
        ]
        .join("-")
    }
}

// Hyphen is the field separator; anything outside [A-Za-z0-9_.] becomes '_'.
fn sanitize(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_format() {
        let identity = ClientIdentity::new("acme", "rnd", "etl", false, "nightly-load");
        assert_eq!(identity.client_id(), "acme-rnd-etl-server-nightly_load");

        let client = ClientIdentity::new("acme", "rnd", "etl", true, "desktop");
        assert!(client.client_id().contains("-client-"));
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let identity = ClientIdentity::new("acme", " ", "etl", false, "job");
        assert!(matches!(
            identity.validate(),
            Err(ConfigError::InvalidIdentity("organization"))
        ));

        let ok = ClientIdentity::new("acme", "rnd", "etl", false, "job");
        assert!(ok.validate().is_ok());
    }
}
