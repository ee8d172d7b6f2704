use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::backend::{AuthBackend, TokenTypeHint};
use super::store::FlowStateStore;
use super::token::Credential;

/// Result of a logout. Local state is always cleared; `revoked` only reports
/// whether the authorization server confirmed the revocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevocationResult {
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Invalidates issued credentials on logout.
pub struct CredentialRevoker {
    backend: Arc<dyn AuthBackend>,
    store: Arc<FlowStateStore>,
}

impl CredentialRevoker {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<FlowStateStore>) -> Self {
        Self { backend, store }
    }

    /// Clear local credential and flow state, then revoke the refresh token remotely.
    ///
    /// Local state is dropped before the remote call is made. Clearing the
    /// store also stops any poll task of the dropped flow before its next
    /// token request.
    pub async fn revoke(&self) -> RevocationResult {
        let credential = self.store.clear();
        self.revoke_credential(credential).await
    }

    /// Remote half of [`revoke`](Self::revoke) for a credential already taken out of the store.
    pub(crate) async fn revoke_credential(&self, credential: Option<Credential>) -> RevocationResult {
        let Some(refresh_token) = credential
            .as_ref()
            .filter(|c| c.has_refresh_token())
            .and_then(|c| c.refresh_token.as_deref())
        else {
            info!("logged out locally; no refresh token to revoke");
            return RevocationResult::default();
        };

        match self
            .backend
            .revoke_token(refresh_token, TokenTypeHint::RefreshToken)
            .await
        {
            Ok(()) => {
                info!("refresh token revoked");
                RevocationResult {
                    revoked: true,
                    error: None,
                }
            }
            Err(err) => {
                warn!(error = %err, "token revocation failed; local logout still applied");
                RevocationResult {
                    revoked: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
