use thiserror::Error;

/// Errors raised while talking to the authorization server or driving a flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("No active device flow")]
    NoActiveFlow,
    #[error("Authorization server error {error} (status {status}){}", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Server {
        status: u16,
        error: String,
        description: Option<String>,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Browser launch failed: {0}")]
    Browser(String),
    #[error("Activation code rendering failed: {0}")]
    Render(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// OAuth error code carried by a server rejection, if any.
    pub fn oauth_code(&self) -> Option<&str> {
        match self {
            Self::Server { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }

    /// Whether a poll tick hitting this error should simply wait for the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::InvalidResponse(_) | Self::Serialization(_)
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display_includes_description() {
        let err = AuthError::Server {
            status: 401,
            error: "invalid_client".to_string(),
            description: Some("Invalid client credentials".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Authorization server error invalid_client (status 401): Invalid client credentials"
        );
        assert_eq!(err.oauth_code(), Some("invalid_client"));
    }

    #[test]
    fn server_error_display_without_description() {
        let err = AuthError::Server {
            status: 400,
            error: "invalid_scope".to_string(),
            description: None,
        };
        assert_eq!(
            err.to_string(),
            "Authorization server error invalid_scope (status 400)"
        );
    }

    #[test]
    fn network_failures_are_transient() {
        assert!(AuthError::Network("connection refused".into()).is_transient());
        assert!(!AuthError::NoActiveFlow.is_transient());
    }
}
