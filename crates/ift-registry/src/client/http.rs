//! HTTP layer: bearer authentication, status mapping, re-authentication retry.
//!
//! This is the ONLY place for status code handling of certificate calls.
//! client/mod.rs never interprets status codes.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::SessionManager;
use crate::error::{RegistryError, RegistryResult};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// HTTP backend for certificate requests (holds transport, session, retry bound).
#[derive(Clone)]
pub(crate) struct HttpBackend {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) session: Arc<SessionManager>,
    pub(crate) base_url: String,
    pub(crate) max_retries: u32,
}

impl HttpBackend {
    /// Make an authenticated request, re-authenticating after each 401.
    ///
    /// At most `max_retries` retries follow the first attempt. Each attempt
    /// fetches the current credential from the session; the token rejected by
    /// the previous attempt has already been invalidated, so it is never
    /// reused. Any error other than a 401 is returned as is.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> RegistryResult<Value> {
        let mut retries = 0;
        let max_retries = self.max_retries;

        loop {
            let credential = self.session.ensure_authenticated().await?;
            let result = self
                .request_once(method.clone(), url, body, &credential.onboarding_token)
                .await;

            match result {
                Ok(data) => return Ok(data),
                Err(e) if e.is_authorization_denied() => {
                    self.session
                        .invalidate_token(&credential.onboarding_token)
                        .await;

                    if retries >= max_retries {
                        warn!(
                            error = %e,
                            retries = retries,
                            "giving up after repeated authorization failures"
                        );
                        return Err(e);
                    }
                    retries += 1;

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        "onboarding token rejected, re-authenticating"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        onboarding_token: &str,
    ) -> RegistryResult<Value> {
        debug!(method = %method, url = %url, "registry request");

        let mut request = TransportRequest::new(method, url)
            .header("Authorization", format!("Bearer {}", onboarding_token))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body.clone());
        }

        let response = self.transport.send(request).await?;
        classify(response)
    }
}

fn classify(response: TransportResponse) -> RegistryResult<Value> {
    match response.status {
        200..=299 => Ok(response.data),

        401 => Err(RegistryError::AuthorizationDenied {
            message: match response.message() {
                m if m.is_empty() => "invalid or expired onboarding token".to_string(),
                m => m,
            },
        }),

        status => Err(RegistryError::Transport {
            status: Some(status),
            message: match response.message() {
                m if m.is_empty() => format!("HTTP {}", status),
                m => m,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, data: Value) -> TransportResponse {
        TransportResponse { status, data }
    }

    #[test]
    fn test_classify_success_returns_body() {
        let data = classify(response(201, json!({"certificationId": "c-1"}))).unwrap();
        assert_eq!(data["certificationId"], "c-1");
    }

    #[test]
    fn test_classify_401() {
        let err = classify(response(401, Value::Null)).unwrap_err();
        assert!(err.is_authorization_denied());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_classify_other_status_keeps_detail() {
        match classify(response(422, json!({"message": "scheme unknown"}))) {
            Err(RegistryError::Transport { status, message }) => {
                assert_eq!(status, Some(422));
                assert_eq!(message, "scheme unknown");
            }
            other => panic!("expected Transport error, got {:?}", other),
        }

        match classify(response(503, Value::Null)) {
            Err(RegistryError::Transport { message, .. }) => assert_eq!(message, "HTTP 503"),
            other => panic!("expected Transport error, got {:?}", other),
        }
    }
}
