//! Client-credentials flow against a mock identity endpoint.

use msgraph_pdf::{ClientSecretCredential, MsGraphPdfError, ServiceIdentity, TokenProvider};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credential(server: &MockServer) -> ClientSecretCredential {
    ClientSecretCredential::new(
        reqwest::Client::new(),
        ServiceIdentity::new("app-id", "app-secret", "tenant-1"),
        &server.uri(),
    )
}

#[tokio::test]
async fn token_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app-id"))
        .and(body_string_contains("scope=https%3A%2F%2Fgraph.microsoft.com%2F.default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "eyJ0eXAi.token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cred = credential(&server);
    assert_eq!(cred.get_token().await.unwrap(), "eyJ0eXAi.token");
    assert_eq!(cred.get_token().await.unwrap(), "eyJ0eXAi.token");
}

#[tokio::test]
async fn invalidate_forces_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expires_in": 3599,
            "access_token": "tok"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let cred = credential(&server);
    cred.get_token().await.unwrap();
    cred.invalidate().await;
    cred.get_token().await.unwrap();
}

#[tokio::test]
async fn rejected_secret_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let err = credential(&server).get_token().await.unwrap_err();
    match err {
        MsGraphPdfError::Auth { tenant, detail } => {
            assert_eq!(tenant, "tenant-1");
            assert_eq!(
                detail,
                "invalid_client: AADSTS7000215: Invalid client secret provided."
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
