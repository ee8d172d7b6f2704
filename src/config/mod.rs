//! Configuration system (layered: defaults < TOML file < env < CLI flags).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::device_code::DEFAULT_POLL_INTERVAL_MS;
use crate::auth::providers::keycloak::{AuthEndpoints, DEFAULT_SCOPE};
use crate::auth::scheduler::{PollPolicy, DEFAULT_SLOW_DOWN_INCREMENT_MS};
use crate::error::{DeviceGrantError, Result};

pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REALM: &str = "projetcis";
pub const DEFAULT_CLIENT_ID: &str = "devicecis";
pub const DEFAULT_COMPANION_URL: &str = "https://localhost:3000";
pub const DEFAULT_PORT: u16 = 4000;

/// Per-endpoint overrides for servers that do not follow the realm layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub device_authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub revocation_url: Option<String>,
}

/// Runtime configuration.
///
/// # Example
/// ```no_run
/// use device_grant::config::DeviceGrantConfig;
///
/// let config = DeviceGrantConfig::load(None)?;
/// println!("polling {}", config.endpoints().token_url);
/// # Ok::<(), device_grant::error::DeviceGrantError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceGrantConfig {
    pub auth_base_url: String,
    pub realm: String,
    pub client_id: String,
    pub scope: String,
    /// Base URL of the companion web app hosting `/activate`.
    pub companion_url: String,
    pub bind_address: IpAddr,
    pub port: u16,
    pub default_poll_interval_ms: u64,
    pub slow_down_increment_ms: u64,
    /// `0` retries failed polls until the grant expires.
    pub max_consecutive_failures: u32,
    pub request_timeout_secs: u64,
    pub endpoints: EndpointOverrides,
}

impl Default for DeviceGrantConfig {
    fn default() -> Self {
        Self {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            realm: DEFAULT_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            companion_url: DEFAULT_COMPANION_URL.to_string(),
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            default_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            slow_down_increment_ms: DEFAULT_SLOW_DOWN_INCREMENT_MS,
            max_consecutive_failures: 0,
            request_timeout_secs: 30,
            endpoints: EndpointOverrides::default(),
        }
    }
}

impl DeviceGrantConfig {
    /// Defaults, then the config file (explicit path or the per-user default
    /// if it exists), then environment variables (`.env` is loaded first).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// `~/.config/device-grant/config.toml` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "device-grant")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay environment values read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("KEYCLOAK_INTERNAL_URL").or_else(|| non_empty("KEYCLOAK_URL")) {
            self.auth_base_url = url;
        }
        if let Some(realm) = non_empty("KEYCLOAK_REALM") {
            self.realm = realm;
        }
        if let Some(client_id) = non_empty("CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Some(scope) = non_empty("DEVICE_SCOPE") {
            self.scope = scope;
        }
        if let Some(url) = non_empty("COMPANION_URL") {
            self.companion_url = url;
        }
        if let Some(addr) = non_empty("BIND_ADDRESS") {
            self.bind_address = addr.trim().parse().map_err(|_| {
                DeviceGrantError::configuration(format!("BIND_ADDRESS is not an IP address: {addr}"))
            })?;
        }
        if let Some(port) = non_empty("PORT") {
            self.port = port.trim().parse().map_err(|_| {
                DeviceGrantError::configuration(format!("PORT is not a valid port: {port}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(DeviceGrantError::configuration("client_id must not be empty"));
        }
        for (name, url) in [
            ("auth_base_url", &self.auth_base_url),
            ("companion_url", &self.companion_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DeviceGrantError::configuration(format!(
                    "{name} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        if self.default_poll_interval_ms == 0 {
            return Err(DeviceGrantError::configuration(
                "default_poll_interval_ms must be positive",
            ));
        }
        Ok(())
    }

    pub fn endpoints(&self) -> AuthEndpoints {
        let realm = AuthEndpoints::for_realm(&self.auth_base_url, &self.realm);
        let overrides = self.endpoints.clone();
        AuthEndpoints {
            device_authorization_url: overrides
                .device_authorization_url
                .unwrap_or(realm.device_authorization_url),
            token_url: overrides.token_url.unwrap_or(realm.token_url),
            userinfo_url: overrides.userinfo_url.unwrap_or(realm.userinfo_url),
            revocation_url: overrides.revocation_url.unwrap_or(realm.revocation_url),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::builder()
            .slow_down_increment_ms(self.slow_down_increment_ms)
            .max_consecutive_failures(self.max_consecutive_failures)
            .build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
