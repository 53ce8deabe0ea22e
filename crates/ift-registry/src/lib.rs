//! Certification registry client.
//!
//! This crate talks to a food-safety certification registry:
//!
//! - API key → identity token → onboarding token exchange, cached per session
//! - Certificate create/fetch/delete with bearer auth
//! - Bounded re-authentication when the registry answers 401
//! - Mapping of source audit/certificate documents into the registry schema
//!
//! # Quick Start
//!
//! ```no_run
//! use ift_registry::{RegistryClient, RegistryConfig};
//!
//! # async fn example() -> Result<(), ift_registry::RegistryError> {
//! let config = RegistryConfig::from_env()
//!     .with_organization_id("my-org")
//!     .with_api_key("my-api-key");
//! let client = RegistryClient::new(config)?;
//!
//! let audit: serde_json::Value = serde_json::from_str(r#"{ "_id": "audit-1" }"#).unwrap();
//! let certification_id = client.put_certificate(&audit, &audit).await?;
//! let certificate = client.get_certificate(Some(&certification_id)).await?;
//! println!("{}", certificate);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `IFT_ORGANIZATION_ID` | Organization the onboarding token is scoped to |
//! | `IFT_API_KEY` | API key exchanged for the identity token |
//! | `IFT_REGISTRY_URL` | Certificate API base URL |
//! | `IFT_MAX_RETRIES` | Re-authentication retries after a 401 (default: 3) |
//! | `IFT_TOKEN_FILE` | Persist the onboarding token across runs |
//!
//! See [`RegistryConfig::from_env`] for the full list.

pub mod auth;
pub mod client;
pub mod error;
pub mod mapper;
pub mod record;
pub mod transport;
pub mod types;

// Re-export main types
pub use auth::SessionManager;
pub use client::RegistryClient;
pub use error::{RegistryError, RegistryResult};
pub use mapper::{audit_start_date, scope_description, RecordMapper, SCOPE_SEPARATOR};
pub use record::{CertificateRecord, CertificationStatus, CustomField};
pub use transport::{
    ReqwestTransport, RequestBody, Transport, TransportRequest, TransportResponse,
};
pub use types::{
    Credential, IdentityToken, RegistryConfig, APIKEY_GRANT_TYPE, LOCATION_URN_NAMESPACE,
};
