//! Session management for the registry.
//!
//! Authentication is a two-step exchange:
//!
//! 1. The API key is posted (form-encoded, with the API-key grant type) to the
//!    identity endpoint, which answers with an identity token mapping.
//! 2. That mapping is posted as JSON to the organization's onboarding
//!    endpoint, which answers with the `onboarding_token` used as the bearer
//!    credential on every certificate call.
//!
//! The resulting [`Credential`] is cached by the [`SessionManager`] until the
//! registry rejects it. Concurrent callers of
//! [`SessionManager::ensure_authenticated`] wait on the same lock, so only one
//! exchange is ever in flight.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::transport::{Transport, TransportRequest};
use crate::types::{Credential, IdentityToken, RegistryConfig, APIKEY_GRANT_TYPE};

/// Owns the authentication lifecycle and the single cached credential.
pub struct SessionManager {
    transport: Arc<dyn Transport>,

    /// Identity token endpoint.
    identity_url: String,

    /// Onboarding endpoint including the organization segment.
    onboarding_url: String,

    api_key: String,

    /// Optional file the onboarding token survives process restarts in.
    token_file: Option<PathBuf>,

    /// Cleared once a credential is invalidated; the file is never read again
    /// in this session, even if removing it failed.
    trust_token_file: AtomicBool,

    /// `None` means unauthenticated.
    credential: Mutex<Option<Credential>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("identity_url", &self.identity_url)
            .field("onboarding_url", &self.onboarding_url)
            .field("token_file", &self.token_file)
            .finish_non_exhaustive()
    }
}

/// Onboarding endpoint response. Also the on-disk token file format.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OnboardingResponse {
    onboarding_token: String,
}

impl SessionManager {
    /// Create a session manager from config.
    ///
    /// Fails with [`RegistryError::Config`] when the organization id or API
    /// key is missing.
    pub fn new(transport: Arc<dyn Transport>, config: &RegistryConfig) -> RegistryResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RegistryError::Config {
                message: "API key not set (IFT_API_KEY)".into(),
            })?;

        if config
            .organization_id
            .as_deref()
            .map_or(true, str::is_empty)
        {
            return Err(RegistryError::Config {
                message: "organization id not set (IFT_ORGANIZATION_ID)".into(),
            });
        }

        Ok(Self {
            transport,
            identity_url: config.identity_url.clone(),
            onboarding_url: config.organization_onboarding_url(),
            api_key,
            token_file: config.token_file.clone(),
            trust_token_file: AtomicBool::new(true),
            credential: Mutex::new(None),
        })
    }

    /// Return the cached credential, authenticating first if there is none.
    ///
    /// Holds the credential lock across the exchange: a second caller arriving
    /// mid-exchange waits and then receives the credential the first caller
    /// obtained.
    pub async fn ensure_authenticated(&self) -> RegistryResult<Credential> {
        let mut slot = self.credential.lock().await;

        if let Some(credential) = slot.as_ref() {
            debug!("using cached onboarding token");
            return Ok(credential.clone());
        }

        if let Some(path) = self
            .token_file
            .as_ref()
            .filter(|_| self.trust_token_file.load(Ordering::SeqCst))
        {
            if let Some(credential) = read_token_file(path).await {
                debug!(path = %path.display(), "using persisted onboarding token");
                *slot = Some(credential.clone());
                return Ok(credential);
            }
        }

        let credential = self.authenticate().await?;

        if let Some(path) = &self.token_file {
            write_token_file(path, &credential.onboarding_token).await;
        }

        *slot = Some(credential.clone());
        Ok(credential)
    }

    /// Perform the identity and onboarding exchange.
    ///
    /// Does not touch the cache and does not retry.
    pub async fn authenticate(&self) -> RegistryResult<Credential> {
        let identity_token = self.request_identity_token().await?;
        let onboarding_token = self.request_onboarding_token(&identity_token).await?;

        info!(onboarding_url = %self.onboarding_url, "obtained onboarding token");

        Ok(Credential {
            identity_token,
            onboarding_token,
        })
    }

    /// Clear the cached credential (and its persisted copy).
    pub async fn invalidate(&self) {
        let mut slot = self.credential.lock().await;
        *slot = None;
        self.remove_token_file().await;
    }

    /// Clear the cached credential only if it still carries `onboarding_token`.
    ///
    /// Returns whether the cache was cleared. A credential refreshed by another
    /// caller in the meantime is left alone.
    pub async fn invalidate_token(&self, onboarding_token: &str) -> bool {
        let mut slot = self.credential.lock().await;
        let is_current = slot
            .as_ref()
            .is_some_and(|c| c.onboarding_token == onboarding_token);

        if is_current {
            *slot = None;
            self.remove_token_file().await;
        }
        is_current
    }

    /// Whether a credential is currently cached.
    pub async fn is_authenticated(&self) -> bool {
        self.credential.lock().await.is_some()
    }

    async fn request_identity_token(&self) -> RegistryResult<IdentityToken> {
        debug!(url = %self.identity_url, "requesting identity token");

        let request = TransportRequest::new(Method::POST, &self.identity_url)
            .header("Accept", "application/json")
            .form(vec![
                ("apikey".to_string(), self.api_key.clone()),
                ("grant_type".to_string(), APIKEY_GRANT_TYPE.to_string()),
            ]);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RegistryError::Auth {
                message: format!("identity token request failed: {}", e),
            })?;

        if !response.is_success() {
            return Err(RegistryError::Auth {
                message: format!(
                    "identity token request failed: HTTP {} - {}",
                    response.status,
                    response.message()
                ),
            });
        }

        match response.data {
            Value::Object(map) => Ok(IdentityToken::from_response(map, &self.onboarding_url)),
            other => Err(RegistryError::Auth {
                message: format!("identity token response is not an object: {}", other),
            }),
        }
    }

    async fn request_onboarding_token(&self, identity: &IdentityToken) -> RegistryResult<String> {
        debug!(url = %self.onboarding_url, "exchanging identity token for onboarding token");

        let body = serde_json::to_value(identity).map_err(|e| RegistryError::Auth {
            message: format!("failed to encode identity token: {}", e),
        })?;
        let request = TransportRequest::new(Method::POST, &self.onboarding_url)
            .header("Accept", "application/json")
            .json(body);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RegistryError::Auth {
                message: format!("onboarding token request failed: {}", e),
            })?;

        if !response.is_success() {
            return Err(RegistryError::Auth {
                message: format!(
                    "onboarding token request failed: HTTP {} - {}",
                    response.status,
                    response.message()
                ),
            });
        }

        let parsed: OnboardingResponse =
            serde_json::from_value(response.data).map_err(|e| RegistryError::Auth {
                message: format!("failed to parse onboarding token response: {}", e),
            })?;

        if parsed.onboarding_token.is_empty() {
            return Err(RegistryError::Auth {
                message: "onboarding token response carried an empty token".into(),
            });
        }

        Ok(parsed.onboarding_token)
    }

    async fn remove_token_file(&self) {
        if let Some(path) = &self.token_file {
            self.trust_token_file.store(false, Ordering::SeqCst);
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "removed persisted onboarding token"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove token file"),
            }
        }
    }
}

async fn read_token_file(path: &Path) -> Option<Credential> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no persisted onboarding token");
            return None;
        }
    };

    match serde_json::from_str::<OnboardingResponse>(&content) {
        Ok(persisted) if !persisted.onboarding_token.is_empty() => Some(Credential {
            identity_token: IdentityToken::default(),
            onboarding_token: persisted.onboarding_token,
        }),
        Ok(_) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring corrupt token file");
            None
        }
    }
}

/// Write only the onboarding token; the identity token carries IAM secrets
/// and is not needed once the exchange is done.
async fn write_token_file(path: &Path, onboarding_token: &str) {
    let persisted = OnboardingResponse {
        onboarding_token: onboarding_token.to_string(),
    };
    let content = match serde_json::to_string(&persisted) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "failed to encode onboarding token");
            return;
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %e, "failed to create token directory");
            return;
        }
    }

    if let Err(e) = write_private(path, content.as_bytes()).await {
        warn!(path = %path.display(), error = %e, "failed to persist onboarding token");
    }
}

/// Write `content` to `path`, readable by the owner only on unix.
async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;

    // `mode` only applies on creation; tighten a file that already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }

    file.write_all(content).await?;
    file.flush().await
}
