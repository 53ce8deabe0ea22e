//! Error types for the registry client.

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Identity or onboarding token exchange failed.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// A registry call was rejected with 401. Recoverable by re-authenticating.
    #[error("authorization denied: {message}")]
    AuthorizationDenied { message: String },

    /// Network failure or a non-401 error status.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A required field is missing or empty in the source records.
    #[error("mapping error at {path}: {reason}")]
    Mapping { path: String, reason: String },

    /// Invalid response from the registry or identity service.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl RegistryError {
    pub(crate) fn mapping(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Caller must fix input
            Self::Config { .. } => 1,
            Self::Mapping { .. } => 1,

            // Auth issues
            Self::Auth { .. } => 2,
            Self::AuthorizationDenied { .. } => 2,

            // Network/transient
            Self::Transport { .. } => 5,

            // Other
            Self::InvalidResponse { .. } => 6,
        }
    }

    /// Whether the error can be recovered by re-authenticating.
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, Self::AuthorizationDenied { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthorizationDenied { .. } => Some(401),
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
