use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::auth::backend::{AuthBackend, TokenTypeHint};
use crate::auth::device_code::{expiry_after, DeviceAuthorization, TokenPoll};
use crate::auth::error::AuthError;
use crate::auth::token::Credential;

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
pub const DEFAULT_SCOPE: &str = "openid profile email";

/// OpenID Connect endpoints of one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub device_authorization_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub revocation_url: String,
}

impl AuthEndpoints {
    /// Endpoints under `{base}/realms/{realm}/protocol/openid-connect`.
    pub fn for_realm(base_url: &str, realm: &str) -> Self {
        let auth_base = format!(
            "{}/realms/{}/protocol/openid-connect",
            base_url.trim_end_matches('/'),
            realm
        );
        Self {
            device_authorization_url: format!("{auth_base}/auth/device"),
            token_url: format!("{auth_base}/token"),
            userinfo_url: format!("{auth_base}/userinfo"),
            revocation_url: format!("{auth_base}/revoke"),
        }
    }
}

/// Keycloak device-grant client.
///
/// # Example
/// ```no_run
/// use device_grant::auth::providers::keycloak::{AuthEndpoints, KeycloakBackend};
///
/// let backend = KeycloakBackend::new(
///     "devicecis",
///     AuthEndpoints::for_realm("http://localhost:8080", "projetcis"),
/// )
/// .with_scope("openid profile");
/// ```
pub struct KeycloakBackend {
    client: reqwest::Client,
    client_id: String,
    scope: String,
    endpoints: AuthEndpoints,
}

impl KeycloakBackend {
    pub fn new(client_id: impl Into<String>, endpoints: AuthEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            scope: DEFAULT_SCOPE.to_string(),
            endpoints,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }
}

#[async_trait]
impl AuthBackend for KeycloakBackend {
    async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError> {
        let resp = self
            .client
            .post(&self.endpoints.device_authorization_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(server_error(status, &body, "Device authorization request"));
        }
        let authorization: DeviceAuthorization = serde_json::from_str(&body)?;
        Ok(authorization)
    }

    async fn poll_token(&self, device_code: &str) -> Result<TokenPoll, AuthError> {
        let resp = self
            .client
            .post(&self.endpoints.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
                ("device_code", device_code),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        let payload: DeviceTokenResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => {
                return Err(AuthError::InvalidResponse(format!(
                    "Device token request failed with status {status}"
                )));
            }
            Err(err) => return Err(err.into()),
        };
        if status.is_success() {
            if let Some(access_token) = payload.access_token {
                let now = Utc::now();
                return Ok(TokenPoll::Authorized(Credential {
                    access_token,
                    refresh_token: payload.refresh_token,
                    id_token: payload.id_token,
                    expires_at: payload.expires_in.and_then(|secs| expiry_after(now, secs)),
                    issued_at: now,
                    scopes: payload
                        .scope
                        .map(|s| s.split_whitespace().map(str::to_string).collect()),
                }));
            }
        }
        match payload.error {
            Some(code) => Ok(TokenPoll::from_error_code(&code, payload.error_description)),
            None if status.is_success() => Err(AuthError::InvalidResponse(
                "Device token response missing token and error".to_string(),
            )),
            None => Err(AuthError::InvalidResponse(format!(
                "Device token request failed with status {status}"
            ))),
        }
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<serde_json::Value, AuthError> {
        let resp = self
            .client
            .get(&self.endpoints.userinfo_url)
            .header("Accept", "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::NotLoggedIn);
        }
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "User info request failed with status {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    async fn revoke_token(&self, token: &str, hint: TokenTypeHint) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(&self.endpoints.revocation_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("token", token),
                ("token_type_hint", hint.as_ref()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(server_error(status, &body, "Token revocation"))
    }
}

#[derive(Debug, Deserialize)]
struct DeviceTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

fn server_error(status: StatusCode, body: &str, what: &str) -> AuthError {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) => AuthError::Server {
            status: status.as_u16(),
            error: err.error,
            description: err.error_description,
        },
        Err(_) => AuthError::InvalidResponse(format!("{what} failed with status {status}")),
    }
}
