use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::AuthError;
use super::Credential;

/// Poll cadence used when the authorization server does not suggest one.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Device authorization response as issued by the authorization server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
}

/// Lifecycle of a device flow. `Approved`, `Denied` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowState {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One device authorization grant in progress.
///
/// # Example
/// ```no_run
/// use device_grant::auth::{DeviceFlow, FlowState};
/// use chrono::{Duration, Utc};
///
/// let started_at = Utc::now();
/// let flow = DeviceFlow {
///     device_code: "device-code".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_uri: "https://sso.example.com/device".to_string(),
///     verification_uri_complete: None,
///     activation_url: "https://localhost:3000/activate?code=ABCD-EFGH".to_string(),
///     started_at,
///     expires_at: started_at + Duration::seconds(600),
///     poll_interval_ms: 5_000,
///     state: FlowState::Pending,
/// };
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceFlow {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub activation_url: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub poll_interval_ms: u64,
    pub state: FlowState,
}

impl DeviceFlow {
    /// Build a pending flow from the server's device authorization response.
    ///
    /// Fails with [`AuthError::InvalidResponse`] when `expires_in` does not
    /// fit in a calendar date counted from `started_at`.
    pub fn issue(
        authorization: DeviceAuthorization,
        activation_url: String,
        default_interval_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let poll_interval_ms = authorization
            .interval
            .filter(|secs| *secs > 0)
            .map(|secs| secs.saturating_mul(1_000))
            .unwrap_or(default_interval_ms);
        let expires_at = expiry_after(started_at, authorization.expires_in).ok_or_else(|| {
            AuthError::InvalidResponse(format!(
                "Device authorization expires_in out of range: {}",
                authorization.expires_in
            ))
        })?;
        Ok(Self {
            device_code: authorization.device_code,
            user_code: authorization.user_code,
            verification_uri: authorization.verification_uri,
            verification_uri_complete: authorization.verification_uri_complete,
            activation_url,
            started_at,
            expires_at,
            poll_interval_ms,
            state: FlowState::Pending,
        })
    }

    /// Total grant window granted by the server.
    pub fn lifetime(&self) -> Duration {
        (self.expires_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Time left before the grant is void, measured from `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn is_pending(&self) -> bool {
        self.state == FlowState::Pending
    }
}

impl std::fmt::Debug for DeviceFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFlow")
            .field("device_code", &"..")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("verification_uri_complete", &self.verification_uri_complete)
            .field("activation_url", &self.activation_url)
            .field("started_at", &self.started_at)
            .field("expires_at", &self.expires_at)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("state", &self.state)
            .finish()
    }
}

/// `start + secs`, or `None` outside chrono's representable range.
pub fn expiry_after(start: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| start.checked_add_signed(lifetime))
}

/// Outcome of one token-endpoint poll, decoded once at the protocol boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenPoll {
    Authorized(Credential),
    /// `authorization_pending`
    Pending,
    /// `slow_down`
    SlowDown,
    /// `expired_token`
    Expired,
    /// `access_denied`
    Denied,
    /// Any other OAuth error code; terminal for the flow.
    Other {
        code: String,
        description: Option<String>,
    },
}

impl TokenPoll {
    /// Map an OAuth error code from the token endpoint.
    pub fn from_error_code(code: &str, description: Option<String>) -> Self {
        match code {
            "authorization_pending" => Self::Pending,
            "slow_down" => Self::SlowDown,
            "expired_token" => Self::Expired,
            "access_denied" => Self::Denied,
            other => Self::Other {
                code: other.to_string(),
                description,
            },
        }
    }
}
