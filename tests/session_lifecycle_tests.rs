//! Session lifecycle against a local HTTP server.
//!
//! Every test drives the real reqwest transport; the tenant is a wiremock
//! server reached over plain HTTP.
//!
//! Run: cargo nextest run --test session_lifecycle_tests

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tenant_session::{
    AuthErrorKind, AuthTransport, Client, ClientIdentity, ClientOptions, ConfigError,
    CredentialStrategy, DelegationState, Error, HttpTransport,
};
use wiremock::matchers::{any, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn identity() -> ClientIdentity {
    ClientIdentity::new("Acme", "Finance", "Reporting", false, "nightly-etl")
}

const CLIENT_ID: &str = "Acme-Finance-Reporting-server-nightly_etl";

fn host(server: &MockServer) -> String {
    server.address().to_string()
}

fn transport() -> Arc<dyn AuthTransport> {
    Arc::new(HttpTransport::new().unwrap().insecure())
}

fn success(payload: Value) -> ResponseTemplate {
    let mut body = json!({"responseStatus": "SUCCESS"});
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), payload) {
        body.extend(extra);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

fn failure(error_type: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "responseStatus": "FAILURE",
        "errors": [{"type": error_type, "message": "rejected by tenant"}]
    }))
}

async fn tenant() -> MockServer {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/"))
        .respond_with(success(json!({"values": {
            "v24.3": "/api/v24.3",
            "v25.1": "/api/v25.1",
            "v99.1": "/api/v99.1"
        }})))
        .mount(&server)
        .await;
    server
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v25.2/auth"))
        .and(body_string_contains("username=jane%40acme.com"))
        .and(header("X-Client-Id", CLIENT_ID))
        .respond_with(success(json!({"sessionId": token, "userId": 12})))
        .mount(server)
        .await;
}

async fn build(server: &MockServer, options: ClientOptions) -> tenant_session::Result<Client> {
    Client::builder(
        CredentialStrategy::basic(host(server), "jane@acme.com", "correct horse"),
        identity(),
    )
    .options(options)
    .transport(transport())
    .build()
    .await
}

// =============================================================================
// Acquisition
// =============================================================================

mod acquisition {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let server = tenant().await;
        mount_login(&server, "session-abc").await;
        Mock::given(method("GET"))
            .and(path("/api/v25.1/objects/users/me"))
            .and(header("Authorization", "session-abc"))
            .respond_with(success(json!({"users": [{"user": {"id": 12}}]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = build(&server, ClientOptions::default()).await.unwrap();

        assert!(!client.is_delegated());
        assert_eq!(client.current_token().as_deref(), Some("session-abc"));
        assert_eq!(client.api_version().to_string(), "v25.1");
        assert!(client.validate().await);
    }

    #[tokio::test]
    async fn test_wrong_password_fails_fast() {
        let server = tenant().await;
        Mock::given(method("POST"))
            .and(path("/api/v25.2/auth"))
            .respond_with(failure("USERNAME_OR_PASSWORD_INCORRECT"))
            .expect(1)
            .mount(&server)
            .await;

        let err = build(&server, ClientOptions::default()).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_warning_status_counts_as_success() {
        let server = tenant().await;
        Mock::given(method("POST"))
            .and(path("/api/v25.2/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseStatus": "WARNING",
                "responseMessage": "password expires soon",
                "sessionId": "warned"
            })))
            .mount(&server)
            .await;

        let client = build(&server, ClientOptions::default()).await.unwrap();
        assert_eq!(client.current_token().as_deref(), Some("warned"));
    }

    #[tokio::test]
    async fn test_html_error_page_is_unexpected_shape() {
        let server = tenant().await;
        Mock::given(method("POST"))
            .and(path("/api/v25.2/auth"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<html>not found</html>"))
            .mount(&server)
            .await;

        let err = build(&server, ClientOptions::default()).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::UnexpectedResponseShape));
    }

    #[tokio::test]
    async fn test_server_errors_retried_then_surface() {
        let server = tenant().await;
        Mock::given(method("POST"))
            .and(path("/api/v25.2/auth"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let options = ClientOptions::default().with_retry(
            tenant_session::RetryConfig::default()
                .with_max_attempts(2)
                .with_backoff(tenant_session::ExponentialBackoff::new(
                    Duration::from_millis(5),
                    Duration::from_millis(10),
                    2.0,
                )),
        );
        let err = build(&server, options).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::TransportFailure));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_field_makes_no_request() {
        let server = tenant().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let err = Client::builder(
            CredentialStrategy::oauth_discovery(host(&server), "", "etl-app", None, "pw"),
            identity(),
        )
        .transport(transport())
        .build()
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField("oauthProfileId"))
        ));
    }

    #[tokio::test]
    async fn test_unknown_option_rejected() {
        let err = ClientOptions::from_pairs([("validateOnBuild", "true"), ("keepForever", "1")])
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownOption("keepForever".into()));
    }
}

// =============================================================================
// OAuth
// =============================================================================

mod oauth {
    use super::*;

    #[tokio::test]
    async fn test_discovery_then_password_grant() {
        let server = tenant().await;
        let token_endpoint = format!("{}/oauth2/v1/token", server.uri());

        Mock::given(method("POST"))
            .and(path("/auth/discovery"))
            .and(body_string_contains("client_id=etl-app"))
            .respond_with(success(json!({"data": {
                "auth_type": "sso",
                "auth_profiles": [{
                    "id": "okta-prod",
                    "label": "Okta",
                    "as_metadata": {"token_endpoint": token_endpoint}
                }]
            }})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=jane%40acme.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "idp-access",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth/session/okta-prod"))
            .and(header("Authorization", "Bearer idp-access"))
            .respond_with(success(json!({"sessionId": "sso-session"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::builder(
            CredentialStrategy::oauth_discovery(
                host(&server),
                "okta-prod",
                "etl-app",
                Some("jane@acme.com".into()),
                "idp-password",
            ),
            identity(),
        )
        .transport(transport())
        .build()
        .await
        .unwrap();

        assert_eq!(client.current_token().as_deref(), Some("sso-session"));
    }

    #[tokio::test]
    async fn test_rejected_grant_is_invalid_credentials() {
        let server = tenant().await;
        let token_endpoint = format!("{}/oauth2/v1/token", server.uri());

        Mock::given(method("POST"))
            .and(path("/auth/discovery"))
            .respond_with(success(json!({"data": {"auth_profiles": [
                {"id": "okta-prod", "as_metadata": {"token_endpoint": token_endpoint}}
            ]}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "The credentials provided were invalid."
            })))
            .mount(&server)
            .await;

        let err = Client::builder(
            CredentialStrategy::oauth_discovery(
                host(&server),
                "okta-prod",
                "etl-app",
                Some("jane@acme.com".into()),
                "wrong",
            ),
            identity(),
        )
        .transport(transport())
        .build()
        .await
        .unwrap_err();

        assert_eq!(err.auth_kind(), Some(AuthErrorKind::InvalidCredentials));
    }
}

// =============================================================================
// Validation and keep-alive
// =============================================================================

mod keep_alive {
    use super::*;

    #[tokio::test]
    async fn test_keep_alive_keeps_token() {
        let server = tenant().await;
        mount_login(&server, "steady").await;
        Mock::given(method("POST"))
            .and(path("/api/v25.1/keep-alive"))
            .and(header("Authorization", "steady"))
            .respond_with(success(json!({})))
            .expect(3)
            .mount(&server)
            .await;

        let client = build(&server, ClientOptions::default()).await.unwrap();
        for _ in 0..3 {
            let session = client.keep_alive().await.unwrap();
            assert_eq!(session.token(), "steady");
        }
    }

    #[tokio::test]
    async fn test_expired_session_is_renewed() {
        let server = tenant().await;
        Mock::given(method("POST"))
            .and(path("/api/v25.2/auth"))
            .respond_with(success(json!({"sessionId": "first"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v25.2/auth"))
            .respond_with(success(json!({"sessionId": "second"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v25.1/keep-alive"))
            .respond_with(failure("INVALID_SESSION_ID"))
            .mount(&server)
            .await;

        let client = build(&server, ClientOptions::default()).await.unwrap();
        let renewed = client.keep_alive().await.unwrap();
        assert_eq!(renewed.token(), "second");
        assert_eq!(client.current_token().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_reused_token_is_single_shot() {
        let server = tenant().await;
        Mock::given(method("GET"))
            .and(path("/api/v25.2/objects/users/me"))
            .respond_with(success(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v25.1/keep-alive"))
            .respond_with(failure("INVALID_SESSION_ID"))
            .mount(&server)
            .await;

        let client = Client::builder(
            CredentialStrategy::session_token(host(&server), "cached-token"),
            identity(),
        )
        .transport(transport())
        .build()
        .await
        .unwrap();
        assert_eq!(client.api_version().to_string(), "v25.1");

        let err = client.keep_alive().await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::SessionExpired);
    }

    #[tokio::test]
    async fn test_timeout_keeps_previous_session() {
        let server = tenant().await;
        mount_login(&server, "still-good").await;
        Mock::given(method("POST"))
            .and(path("/api/v25.1/keep-alive"))
            .respond_with(success(json!({})).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = build(
            &server,
            ClientOptions::default().with_timeout(Duration::from_millis(500)),
        )
        .await
        .unwrap();

        let err = client.keep_alive().await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::Timeout);
        assert_eq!(client.current_token().as_deref(), Some("still-good"));
    }

    #[tokio::test]
    async fn test_end_session_logs_out() {
        let server = tenant().await;
        mount_login(&server, "bye").await;
        Mock::given(method("DELETE"))
            .and(path("/api/v25.1/session"))
            .and(header("Authorization", "bye"))
            .respond_with(success(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = build(&server, ClientOptions::default()).await.unwrap();
        client.end_session().await.unwrap();
        assert!(client.current_token().is_none());
    }
}

// =============================================================================
// Delegation
// =============================================================================

mod delegation {
    use super::*;

    async fn mount_delegation(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v25.1/delegation/vaults"))
            .respond_with(success(json!({"delegated_vaults": [{
                "id": 1001,
                "name": "Partner Co",
                "dns": host(server),
                "delegator_userid": 2002
            }]})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v25.1/delegation/login"))
            .and(body_string_contains("vault_id=1001"))
            .and(body_string_contains("delegator_userid=2002"))
            .respond_with(success(json!({"delegated_sessionid": "on-behalf"})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_delegate_once() {
        let server = tenant().await;
        mount_login(&server, "direct").await;
        mount_delegation(&server).await;

        let client = build(&server, ClientOptions::default()).await.unwrap();
        let grants = client.list_delegations().await.unwrap();
        assert_eq!(grants[0].tenant_id, "1001");

        let session = client.initiate_delegated_session("1001", "2002").await.unwrap();
        assert!(session.is_delegated());
        assert!(client.is_delegated());
        assert_eq!(client.current_token().as_deref(), Some("on-behalf"));
        assert_eq!(client.delegation_state(), DelegationState::Delegated);

        let err = client
            .initiate_delegated_session("1001", "2002")
            .await
            .unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::DelegationNotPermitted);
    }

    #[tokio::test]
    async fn test_delegation_refused_by_tenant() {
        let server = tenant().await;
        mount_login(&server, "direct").await;
        Mock::given(method("GET"))
            .and(path("/api/v25.1/delegation/vaults"))
            .respond_with(failure("INSUFFICIENT_ACCESS"))
            .mount(&server)
            .await;

        let client = build(&server, ClientOptions::default()).await.unwrap();
        let err = client
            .initiate_delegated_session("1001", "2002")
            .await
            .unwrap_err();

        assert_eq!(err.kind, AuthErrorKind::DelegationNotPermitted);
        assert_eq!(client.delegation_state(), DelegationState::Direct);
        assert_eq!(client.current_token().as_deref(), Some("direct"));
    }
}
