//! Authorization-server protocol seam.

use async_trait::async_trait;
use strum::{AsRefStr, Display};

use super::device_code::{DeviceAuthorization, TokenPoll};
use super::error::AuthError;

/// Token kind announced to the revocation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

/// Endpoints of the authorization server used by the device grant.
///
/// Implement this trait to talk to a specific identity provider; the
/// scheduler and service only ever see decoded [`TokenPoll`] outcomes.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Start a device authorization request for the configured client and scopes.
    async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError>;

    /// Exchange a device code at the token endpoint.
    ///
    /// Protocol outcomes (pending, slow down, denied, ...) are `Ok`; only
    /// failures to obtain a readable answer are `Err`.
    async fn poll_token(&self, device_code: &str) -> Result<TokenPoll, AuthError>;

    /// Fetch identity claims for an access token.
    async fn fetch_user_info(&self, access_token: &str) -> Result<serde_json::Value, AuthError>;

    /// Invalidate a token with the authorization server.
    async fn revoke_token(&self, token: &str, hint: TokenTypeHint) -> Result<(), AuthError>;
}
