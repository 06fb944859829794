//! OAuth / OpenID Connect exchanges.
//!
//! Two flows end in a tenant session:
//!
//! 1. An identity-provider access token is exchanged at
//!    `/auth/oauth/session/{profile}`.
//! 2. Discovery resolves the provider's token endpoint for a profile, a
//!    resource-owner password grant there yields the access token, and flow 1
//!    finishes the job.

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{AuthErrorKind, AuthFailure};
use crate::transport::{Endpoint, Method, TransportRequest, TransportResponse};

pub const DISCOVERY_PATH: &str = "/auth/discovery";

/// Path of the session exchange for `profile_id`.
pub fn session_path(profile_id: &str) -> String {
    format!("/auth/oauth/session/{}", urlencoding::encode(profile_id))
}

pub fn session_request(
    host: &str,
    profile_id: &str,
    client_id: &str,
    access_token: &str,
) -> TransportRequest {
    TransportRequest::post(host, session_path(profile_id))
        .header("Authorization", format!("Bearer {}", access_token))
        .form("client_id", client_id)
}

pub fn discovery_request(host: &str, username: Option<&str>, client_id: &str) -> TransportRequest {
    let request = TransportRequest::post(host, DISCOVERY_PATH).form("client_id", client_id);
    match username {
        Some(username) => request.form("username", username),
        None => request,
    }
}

/// An OAuth profile offered by the tenant's discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProfile {
    pub id: String,
    pub token_endpoint: String,
    /// Username the tenant associates with the request, when it echoes one.
    pub username: Option<String>,
}

#[derive(Deserialize)]
struct DiscoveryData {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    auth_profiles: Vec<RawProfile>,
}

#[derive(Deserialize)]
struct RawProfile {
    id: String,
    #[serde(default)]
    as_metadata: Option<AuthServerMetadata>,
}

#[derive(Deserialize)]
struct AuthServerMetadata {
    #[serde(default)]
    token_endpoint: Option<String>,
}

/// Picks `profile_id` out of a discovery response body.
pub fn find_profile(payload: &Value, profile_id: &str) -> Result<DiscoveredProfile, AuthFailure> {
    let data = payload
        .get("data")
        .ok_or_else(|| AuthFailure::unexpected_shape("discovery response has no data"))?;
    let data = DiscoveryData::deserialize(data)
        .map_err(|e| AuthFailure::unexpected_shape(format!("discovery data: {}", e)))?;

    let profile = data
        .auth_profiles
        .into_iter()
        .find(|p| p.id == profile_id)
        .ok_or_else(|| {
            AuthFailure::new(
                AuthErrorKind::InvalidCredentials,
                format!("OAuth profile {} is not offered for this user", profile_id),
            )
        })?;

    let token_endpoint = profile
        .as_metadata
        .and_then(|m| m.token_endpoint)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            AuthFailure::unexpected_shape(format!(
                "OAuth profile {} has no token endpoint",
                profile_id
            ))
        })?;

    Ok(DiscoveredProfile {
        id: profile.id,
        token_endpoint,
        username: data.username.filter(|u| !u.is_empty()),
    })
}

pub fn password_grant_request(
    token_endpoint: &str,
    username: &str,
    password: &str,
    client_id: &str,
) -> TransportRequest {
    TransportRequest::new(Method::Post, Endpoint::Absolute(token_endpoint.to_string()))
        .form("grant_type", "password")
        .form("username", username)
        .form("password", password)
        .form("client_id", client_id)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Reads a plain OAuth token response; the provider does not speak the
/// tenant's envelope format.
pub fn interpret_grant(response: TransportResponse) -> Result<SecretString, AuthFailure> {
    let error_description = || {
        response
            .json
            .get("error_description")
            .or_else(|| response.json.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("no error description")
            .to_string()
    };

    match response.status {
        200..=299 => {
            let token = TokenResponse::deserialize(&response.json)
                .map_err(|e| AuthFailure::unexpected_shape(format!("token response: {}", e)))?;
            if token.access_token.is_empty() {
                return Err(AuthFailure::unexpected_shape("empty access_token"));
            }
            Ok(SecretString::from(token.access_token))
        }
        400 | 401 => Err(AuthFailure::new(
            AuthErrorKind::InvalidCredentials,
            format!("identity provider rejected the grant: {}", error_description()),
        )),
        429 => Err(AuthFailure::new(
            AuthErrorKind::RateLimited,
            "identity provider rate limit",
        )),
        500..=599 => Err(AuthFailure::new(
            AuthErrorKind::TransportFailure,
            format!("identity provider returned HTTP {}", response.status),
        )),
        status => Err(AuthFailure::unexpected_shape(format!(
            "identity provider returned HTTP {}",
            status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn discovery_body() -> Value {
        json!({
            "responseStatus": "SUCCESS",
            "data": {
                "auth_type": "sso",
                "username": "jane@acme.com",
                "auth_profiles": [
                    {"id": "other", "as_metadata": {"token_endpoint": "https://idp.other/token"}},
                    {"id": "okta", "label": "Okta", "as_metadata": {
                        "issuer": "https://idp.acme.com",
                        "token_endpoint": "https://idp.acme.com/oauth2/token"
                    }}
                ]
            }
        })
    }

    #[test]
    fn test_session_path_escapes_profile() {
        assert_eq!(session_path("okta"), "/auth/oauth/session/okta");
        assert_eq!(session_path("a b/c"), "/auth/oauth/session/a%20b%2Fc");
    }

    #[test]
    fn test_find_profile() {
        let profile = find_profile(&discovery_body(), "okta").unwrap();
        assert_eq!(profile.token_endpoint, "https://idp.acme.com/oauth2/token");
        assert_eq!(profile.username.as_deref(), Some("jane@acme.com"));
    }

    #[test]
    fn test_missing_profile_is_invalid_credentials() {
        let err = find_profile(&discovery_body(), "azure").unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_profile_without_endpoint() {
        let body = json!({"data": {"auth_profiles": [{"id": "okta"}]}});
        let err = find_profile(&body, "okta").unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::UnexpectedResponseShape);
    }

    #[test]
    fn test_grant_request_shape() {
        let request = password_grant_request("https://idp/token", "jane", "pw", "cid");
        assert_eq!(request.endpoint, Endpoint::Absolute("https://idp/token".into()));
        assert_eq!(request.form_value("grant_type"), Some("password"));
        assert_eq!(request.form_value("client_id"), Some("cid"));
    }

    #[test]
    fn test_interpret_grant() {
        let ok = TransportResponse::new(200, json!({"access_token": "idp-token", "token_type": "Bearer"}));
        assert_eq!(interpret_grant(ok).unwrap().expose_secret(), "idp-token");

        let denied = TransportResponse::new(400, json!({"error": "invalid_grant"}));
        let err = interpret_grant(denied).unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
        assert!(err.message.contains("invalid_grant"));

        let down = TransportResponse::new(502, Value::Null);
        assert_eq!(interpret_grant(down).unwrap_err().kind, AuthErrorKind::TransportFailure);

        let odd = TransportResponse::new(200, json!({"token": "x"}));
        assert_eq!(
            interpret_grant(odd).unwrap_err().kind,
            AuthErrorKind::UnexpectedResponseShape
        );
    }
}
