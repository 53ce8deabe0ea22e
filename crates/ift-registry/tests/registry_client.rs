//! Integration tests for RegistryClient.
//!
//! Uses wiremock for HTTP mocking. Tests cover the token exchange, bearer
//! headers, certificate create/fetch/delete, re-authentication after 401,
//! the retry bound, and pass-through of non-401 failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ift_registry::{
    RegistryClient, RegistryConfig, RegistryError, RegistryResult, Transport, TransportRequest,
    TransportResponse,
};
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORG: &str = "org-1";

fn test_config(mock_server: &MockServer) -> RegistryConfig {
    RegistryConfig::default()
        .with_url(format!("{}/v2", mock_server.uri()))
        .with_identity_url(format!("{}/identity/token", mock_server.uri()))
        .with_onboarding_url(format!("{}/exchange_token/v1/organization", mock_server.uri()))
        .with_organization_id(ORG)
        .with_api_key("test-api-key")
}

fn create_test_client(mock_server: &MockServer) -> RegistryClient {
    RegistryClient::new(test_config(mock_server)).expect("failed to create client")
}

/// Identity + onboarding endpoints, expected to be hit `rounds` times each.
async fn mount_token_exchange(mock_server: &MockServer, rounds: u64) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "iam-access",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(rounds)
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/exchange_token/v1/organization/{}", ORG)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "onboarding_token": "test-token" })),
        )
        .expect(rounds)
        .mount(mock_server)
        .await;
}

fn sample_audit() -> Value {
    json!({
        "_id": "resources/audit-123",
        "certificationid": { "id": "CERT-0042" },
        "scheme": { "name": "PrimusGFS" },
        "certifying_body": { "auditor": { "name": "Jane Auditor" } },
        "conditions_during_audit": {
            "FSMS_observed_date": { "start": "2018-06-20" },
            "operation_observed_date": { "start": "2018-06-18" }
        },
        "scope": {
            "description": "Harvest crew",
            "products_observed": [{ "name": "Strawberries" }]
        },
        "organization": { "gln": "0728612177446" }
    })
}

#[tokio::test]
async fn test_get_certificate_by_id() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications/cert-1"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificationId": "cert-1",
            "certificationStatus": "valid"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let certificate = client
        .get_certificate(Some("cert-1"))
        .await
        .expect("get failed");

    assert_eq!(certificate["certificationStatus"], "valid");
}

#[tokio::test]
async fn test_get_certificate_list() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "certificationId": "a" }])),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let first = client.get_certificate(None).await.expect("get failed");
    // Second call reuses the cached credential: exchange mocks expect 1.
    let second = client.get_certificate(None).await.expect("get failed");

    assert_eq!(first, second);
    assert_eq!(first[0]["certificationId"], "a");
}

#[tokio::test]
async fn test_put_certificate_maps_and_creates() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/certifications"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "addendumsComments": "resources/audit-123",
            "auditedBy": "Jane Auditor",
            "certificateReferenceNumber": "CERT-0042",
            "certificationStatus": "valid",
            "auditStartDate": "2018-06-18",
            "scheme": "PrimusGFS",
            "schemeOwner": "PrimusGFS",
            "scope": "Harvest crew || Strawberries || ",
            "locationGLNList": ["urn:ibm:ift:location:loc:7457934435.gln0728612177446"],
            "customFieldList": [{ "label": "NA", "value": "https://analytics.test/7", "type": "url" }]
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "certificationId": "new-cert" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server)
        .with_location_prefix("urn:ibm:ift:location:loc:7457934435.gln")
        .with_analytics_url("https://analytics.test/7");
    let client = RegistryClient::new(config).expect("failed to create client");

    let id = client
        .put_certificate(&sample_audit(), &json!({}))
        .await
        .expect("put failed");
    assert_eq!(id, "new-cert");
}

#[tokio::test]
async fn test_put_certificate_mapping_error_sends_nothing() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 0).await;

    Mock::given(method("POST"))
        .and(path("/v2/certifications"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut audit = sample_audit();
    audit["certifying_body"] = json!({});

    let client = create_test_client(&mock_server);
    let result = client.put_certificate(&audit, &json!({})).await;

    assert!(matches!(result, Err(RegistryError::Mapping { .. })));
}

#[tokio::test]
async fn test_create_without_certification_id() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/certifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "queued" })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.put_certificate(&sample_audit(), &json!({})).await;

    assert!(matches!(result, Err(RegistryError::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_delete_certificate_path() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("DELETE"))
        .and(path("/v2/certifications/cert-9/attachments/certificate"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.delete_certificate("cert-9").await.expect("delete failed");

    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn test_request_json_put() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("PUT"))
        .and(path("/v2/certifications/cert-3"))
        .and(body_partial_json(json!({ "comments": "updated" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client
        .request_json(
            Method::PUT,
            "/certifications/cert-3",
            Some(&json!({ "comments": "updated" })),
        )
        .await
        .expect("put failed");

    assert_eq!(result["ok"], true);
}

#[tokio::test]
async fn test_401_once_then_success_reauthenticates_once() {
    let mock_server = MockServer::start().await;
    // Initial exchange + exactly one re-authentication.
    mount_token_exchange(&mock_server, 2).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications/cert-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications/cert-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "certificationId": "cert-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let certificate = client
        .get_certificate(Some("cert-1"))
        .await
        .expect("should recover after re-authentication");

    assert_eq!(certificate["certificationId"], "cert-1");
    assert!(client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_persistent_401_gives_up_after_three_retries() {
    let mock_server = MockServer::start().await;
    // One exchange per attempt: initial + 3 retries.
    mount_token_exchange(&mock_server, 4).await;

    Mock::given(method("DELETE"))
        .and(path("/v2/certifications/cert-1/attachments/certificate"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token rejected"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.delete_certificate("cert-1").await;

    match result {
        Err(RegistryError::AuthorizationDenied { message }) => {
            assert_eq!(message, "token rejected");
        }
        other => panic!("expected AuthorizationDenied, got {:?}", other),
    }
    assert!(!client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_retry_bound_is_configurable() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RegistryClient::new(test_config(&mock_server).with_max_retries(0))
        .expect("failed to create client");
    let result = client.get_certificate(None).await;

    assert!(matches!(
        result,
        Err(RegistryError::AuthorizationDenied { .. })
    ));
}

#[tokio::test]
async fn test_server_error_not_retried() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications/cert-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.get_certificate(Some("cert-1")).await;

    match result {
        Err(RegistryError::Transport { status, message }) => {
            assert_eq!(status, Some(500));
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected Transport error, got {:?}", other),
    }
    // A non-401 failure leaves the credential alone.
    assert!(client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_not_found_not_retried() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.get_certificate(Some("missing")).await;

    assert!(matches!(
        result,
        Err(RegistryError::Transport {
            status: Some(404),
            ..
        })
    ));
}

#[tokio::test]
async fn test_auth_failure_propagates_without_registry_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad api key"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client.get_certificate(None).await;

    assert!(matches!(result, Err(RegistryError::Auth { .. })));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_exchange() {
    let mock_server = MockServer::start().await;
    mount_token_exchange(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v2/certifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let (a, b, c) = tokio::join!(
        client.get_certificate(None),
        client.get_certificate(None),
        client.get_certificate(None)
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
}

/// Transport that counts calls and answers from a fixed script.
struct ScriptedTransport {
    identity_calls: AtomicUsize,
    registry_calls: AtomicUsize,
    registry_statuses: Vec<u16>,
    /// Registry calls fail before any response arrives.
    registry_unreachable: bool,
}

impl ScriptedTransport {
    fn new(registry_statuses: Vec<u16>) -> Self {
        Self {
            identity_calls: AtomicUsize::new(0),
            registry_calls: AtomicUsize::new(0),
            registry_statuses,
            registry_unreachable: false,
        }
    }

    fn unreachable_registry() -> Self {
        Self {
            registry_unreachable: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> RegistryResult<TransportResponse> {
        if request.url.ends_with("/identity") {
            let round = self.identity_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(TransportResponse {
                status: 200,
                data: json!({ "access_token": format!("iam-{}", round) }),
            });
        }
        if request.url.contains("/onboarding/") {
            let token = request
                .body
                .as_ref()
                .and_then(|b| match b {
                    ift_registry::RequestBody::Json(v) => v["access_token"].as_str(),
                    ift_registry::RequestBody::Form(_) => None,
                })
                .unwrap_or_default()
                .replace("iam", "onboarding");
            return Ok(TransportResponse {
                status: 200,
                data: json!({ "onboarding_token": token }),
            });
        }

        let call = self.registry_calls.fetch_add(1, Ordering::SeqCst);
        if self.registry_unreachable {
            return Err(RegistryError::Transport {
                status: None,
                message: "connection reset by peer".into(),
            });
        }
        let status = self
            .registry_statuses
            .get(call)
            .copied()
            .unwrap_or(200);
        let auth = request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        Ok(TransportResponse {
            status,
            data: json!({ "seen_authorization": auth }),
        })
    }
}

fn scripted_client(transport: Arc<ScriptedTransport>) -> RegistryClient {
    let config = RegistryConfig::default()
        .with_url("https://registry.test/v2")
        .with_identity_url("https://auth.test/identity")
        .with_onboarding_url("https://auth.test/onboarding")
        .with_organization_id(ORG)
        .with_api_key("key");
    RegistryClient::with_transport(config, transport).expect("failed to create client")
}

#[tokio::test]
async fn test_retry_uses_fresh_token() {
    let transport = Arc::new(ScriptedTransport::new(vec![401, 200]));
    let client = scripted_client(transport.clone());

    let response = client.get_certificate(Some("c")).await.expect("get failed");

    assert_eq!(response["seen_authorization"], "Bearer onboarding-1");
    assert_eq!(transport.identity_calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.registry_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_scripted_always_401() {
    let transport = Arc::new(ScriptedTransport::new(vec![401; 10]));
    let client = scripted_client(transport.clone());

    let result = client.get_certificate(None).await;

    assert!(matches!(
        result,
        Err(RegistryError::AuthorizationDenied { .. })
    ));
    assert_eq!(transport.registry_calls.load(Ordering::SeqCst), 4);
    assert_eq!(transport.identity_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_network_error_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::unreachable_registry());
    let client = scripted_client(transport.clone());

    let result = client.get_certificate(Some("c")).await;

    match result {
        Err(RegistryError::Transport { status, message }) => {
            assert_eq!(status, None);
            assert_eq!(message, "connection reset by peer");
        }
        other => panic!("expected Transport error, got {:?}", other),
    }
    assert_eq!(transport.registry_calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.identity_calls.load(Ordering::SeqCst), 1);
    // The credential was not blamed for the failure.
    assert!(client.session().is_authenticated().await);
}
