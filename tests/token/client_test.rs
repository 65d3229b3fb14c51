//! Coverage for the HTTP token lookup client and lookup parsing.

use secrets_admission::config::LookupConfig;
use secrets_admission::token::client::{sanitize_error_body, VaultTokenClient};
use secrets_admission::token::{parse_lookup_response, LookupError, TokenLookup};
use secrets_admission::workload::Credential;

#[test]
fn client_from_default_config() {
    let client = VaultTokenClient::from_config(&LookupConfig::default()).expect("valid address");
    assert_eq!(
        client.endpoint().as_str(),
        "http://127.0.0.1:8200/v1/auth/token/lookup-self"
    );
}

#[test]
fn client_rejects_bad_address() {
    let result = VaultTokenClient::new("ftp://vault.example.com");
    assert!(matches!(result, Err(LookupError::InvalidAddress { .. })));
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    // Port 9 (discard) on localhost is closed in test environments.
    let client = VaultTokenClient::new("http://127.0.0.1:9").expect("valid address");
    let result = client.lookup(&Credential::new("s.token")).await;
    assert!(matches!(result, Err(LookupError::Request(_))));
}

#[test]
fn lookup_with_identity_policies_only() {
    let body = r#"{"data": {"accessor": "a1", "identity_policies": ["root"]}}"#;
    let secret = parse_lookup_response(body).expect("valid body");
    assert!(secret.is_root());
    assert!(secret.namespace_path.is_empty());
}

#[test]
fn malformed_body_is_parse_error() {
    assert!(matches!(
        parse_lookup_response("<html>"),
        Err(LookupError::Parse(_))
    ));
}

#[test]
fn short_error_bodies_pass_through() {
    assert_eq!(sanitize_error_body("missing client token"), "missing client token");
}
