//! Configuration and credential types for the registry protocol.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity token returned by the identity endpoint.
///
/// Kept as the flat key/value mapping the endpoint returns, because the
/// onboarding endpoint expects the same mapping back as its request body.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityToken(pub Map<String, Value>);

impl IdentityToken {
    /// Build from an identity response, dropping the echoed field named `echo_key`.
    pub fn from_response(response: Map<String, Value>, echo_key: &str) -> Self {
        Self(
            response
                .into_iter()
                .filter(|(key, _)| key != echo_key)
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityToken")
            .field("keys", &self.0.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Credential obtained by the two-step exchange.
///
/// Not serializable: only the onboarding token is ever written to disk.
#[derive(Clone, PartialEq)]
pub struct Credential {
    /// Identity token, only used to obtain the onboarding token.
    pub identity_token: IdentityToken,

    /// Registry-scoped bearer token.
    pub onboarding_token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity_token", &self.identity_token)
            .field("onboarding_token", &"[redacted]")
            .finish()
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the certificate management API.
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Identity token endpoint (API key exchange).
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// Onboarding token endpoint, without the organization segment.
    #[serde(default = "default_onboarding_url")]
    pub onboarding_url: String,

    /// Organization identifier scoping the onboarding token.
    #[serde(default)]
    pub organization_id: Option<String>,

    /// API key. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum re-authentication retries after a 401.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Prefix prepended to every location id.
    #[serde(default = "default_location_prefix")]
    pub location_prefix: String,

    /// Location id used instead of the one in the source records (debugging).
    #[serde(default)]
    pub forced_location_id: Option<String>,

    /// Analytics URL stored in the first custom field of created certificates.
    #[serde(default)]
    pub analytics_url: Option<String>,

    /// File the onboarding credential is persisted to.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

/// Grant type sent with the API key.
pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Namespace of registry location identifiers.
pub const LOCATION_URN_NAMESPACE: &str = "urn:ibm:ift:location:loc:";

fn default_registry_url() -> String {
    "https://fs-certificate-management-integration.mybluemix.net/v2".to_string()
}

fn default_identity_url() -> String {
    "https://iam.ng.bluemix.net/oidc/token".to_string()
}

fn default_onboarding_url() -> String {
    "https://fs-identity-proxy-integration.mybluemix.net/exchange_token/v1/organization".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_location_prefix() -> String {
    LOCATION_URN_NAMESPACE.to_string()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            identity_url: default_identity_url(),
            onboarding_url: default_onboarding_url(),
            organization_id: None,
            api_key: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            location_prefix: default_location_prefix(),
            forced_location_id: None,
            analytics_url: None,
            token_file: None,
        }
    }
}

impl RegistryConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `IFT_REGISTRY_URL` | Certificate API base URL |
    /// | `IFT_IDENTITY_URL` | Identity token endpoint |
    /// | `IFT_ONBOARDING_URL` | Onboarding token endpoint (organization appended) |
    /// | `IFT_ORGANIZATION_ID` | Organization identifier |
    /// | `IFT_API_KEY` | API key |
    /// | `IFT_TIMEOUT` | Request timeout in seconds |
    /// | `IFT_MAX_RETRIES` | Re-authentication retries after a 401 |
    /// | `IFT_LOCATION_PREFIX` | Location id prefix |
    /// | `IFT_FORCED_LOCATION_ID` | Location id override (debug) |
    /// | `IFT_ANALYTICS_URL` | Analytics URL custom field |
    /// | `IFT_TOKEN_FILE` | Onboarding credential file |
    pub fn from_env() -> Self {
        Self {
            url: non_empty_env("IFT_REGISTRY_URL").unwrap_or_else(default_registry_url),
            identity_url: non_empty_env("IFT_IDENTITY_URL").unwrap_or_else(default_identity_url),
            onboarding_url: non_empty_env("IFT_ONBOARDING_URL")
                .unwrap_or_else(default_onboarding_url),
            organization_id: non_empty_env("IFT_ORGANIZATION_ID"),
            api_key: non_empty_env("IFT_API_KEY"),
            timeout_secs: std::env::var("IFT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            max_retries: std::env::var("IFT_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_retries),
            location_prefix: non_empty_env("IFT_LOCATION_PREFIX")
                .unwrap_or_else(default_location_prefix),
            forced_location_id: non_empty_env("IFT_FORCED_LOCATION_ID"),
            analytics_url: non_empty_env("IFT_ANALYTICS_URL"),
            token_file: non_empty_env("IFT_TOKEN_FILE").map(PathBuf::from),
        }
    }

    /// Full onboarding endpoint for the configured organization.
    pub fn organization_onboarding_url(&self) -> String {
        format!(
            "{}/{}",
            self.onboarding_url.trim_end_matches('/'),
            self.organization_id.as_deref().unwrap_or_default()
        )
    }

    /// Set the certificate API base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the identity endpoint.
    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = url.into();
        self
    }

    /// Set the onboarding endpoint.
    pub fn with_onboarding_url(mut self, url: impl Into<String>) -> Self {
        self.onboarding_url = url.into();
        self
    }

    /// Set the organization id.
    pub fn with_organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_location_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.location_prefix = prefix.into();
        self
    }

    pub fn with_forced_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.forced_location_id = Some(location_id.into());
        self
    }

    pub fn with_analytics_url(mut self, url: impl Into<String>) -> Self {
        self.analytics_url = Some(url.into());
        self
    }

    /// Persist the onboarding credential to `path`.
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }
}
