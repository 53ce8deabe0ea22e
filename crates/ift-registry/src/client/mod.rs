//! Registry client for certificate operations.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::SessionManager;
use crate::error::{RegistryError, RegistryResult};
use crate::mapper::RecordMapper;
use crate::record::CertificateRecord;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::RegistryConfig;

mod helpers;
mod http;

use helpers::{
    certificate_attachment_url, certification_url, certifications_url, encode_body, join_segments,
};
use http::HttpBackend;

/// Registry client for certificate operations.
#[derive(Clone)]
pub struct RegistryClient {
    http: HttpBackend,
    mapper: RecordMapper,
    analytics_url: Option<String>,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("base_url", &self.http.base_url)
            .field("max_retries", &self.http.max_retries)
            .field("session", &self.http.session)
            .field("mapper", &self.mapper)
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs))?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: RegistryConfig,
        transport: Arc<dyn Transport>,
    ) -> RegistryResult<Self> {
        let session = Arc::new(SessionManager::new(transport.clone(), &config)?);
        Self::with_session(config, transport, session)
    }

    /// Build a client sharing an existing session.
    pub fn with_session(
        config: RegistryConfig,
        transport: Arc<dyn Transport>,
        session: Arc<SessionManager>,
    ) -> RegistryResult<Self> {
        let base_url = config.url.trim_end_matches('/').to_string();
        // Fail at construction rather than on the first call.
        certifications_url(&base_url)?;

        Ok(Self {
            mapper: RecordMapper::from_config(&config),
            analytics_url: config.analytics_url.clone(),
            http: HttpBackend {
                transport,
                session,
                base_url,
                max_retries: config.max_retries,
            },
        })
    }

    pub fn from_env() -> RegistryResult<Self> {
        Self::new(RegistryConfig::from_env())
    }

    /// Authenticate now instead of on the first request.
    pub async fn connect(&self) -> RegistryResult<()> {
        self.http.session.ensure_authenticated().await?;
        Ok(())
    }

    /// Fetch one certificate by id, or the whole certificate list.
    pub async fn get_certificate(&self, certification_id: Option<&str>) -> RegistryResult<Value> {
        let url = match certification_id {
            Some(id) => certification_url(&self.http.base_url, id)?,
            None => certifications_url(&self.http.base_url)?,
        };
        debug!(url = %url, "fetching certificate");

        self.http.request(Method::GET, &url, None).await
    }

    /// Create a certificate; returns the registry's `certificationId`.
    pub async fn create_certificate(&self, record: &CertificateRecord) -> RegistryResult<String> {
        record.validate()?;

        let url = certifications_url(&self.http.base_url)?;
        let body = encode_body("certificate", record)?;
        debug!(url = %url, "creating certificate");

        let response = self.http.request(Method::POST, &url, Some(&body)).await?;
        let certification_id = certification_id_from(&response)?;

        info!(certification_id = %certification_id, "certificate created");
        Ok(certification_id)
    }

    /// Map a source audit/certificate pair and create it.
    pub async fn put_certificate(
        &self,
        audit: &Value,
        certificate: &Value,
    ) -> RegistryResult<String> {
        let record =
            self.mapper
                .map_to_registry_format(audit, certificate, self.analytics_url.as_deref())?;
        self.create_certificate(&record).await
    }

    /// Delete the certificate attachment of a certification.
    pub async fn delete_certificate(&self, certification_id: &str) -> RegistryResult<Value> {
        let url = certificate_attachment_url(&self.http.base_url, certification_id)?;
        debug!(url = %url, "deleting certificate");

        self.http.request(Method::DELETE, &url, None).await
    }

    /// Run any verb against `path` (relative to the base URL) through the
    /// authenticated retry pipeline.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> RegistryResult<Value> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let url = join_segments(&self.http.base_url, &segments)?;
        self.http.request(method, &url, body).await
    }

    pub fn mapper(&self) -> &RecordMapper {
        &self.mapper
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.http.session
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }
}

fn certification_id_from(response: &Value) -> RegistryResult<String> {
    match response.get("certificationId") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(RegistryError::InvalidResponse {
            message: format!("create response has no certificationId: {}", response),
        }),
    }
}
