use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::backend::AuthBackend;
use super::device_code::{DeviceFlow, DEFAULT_POLL_INTERVAL_MS};
use super::error::AuthError;
use super::providers::keycloak::KeycloakBackend;
use super::revoker::{CredentialRevoker, RevocationResult};
use super::scheduler::{PollHandle, PollPolicy, PollScheduler};
use super::store::{FlowStateStore, FlowView};
use crate::activation::ActivationCode;
use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::config::DeviceGrantConfig;
use crate::config::DEFAULT_COMPANION_URL;
use crate::error::DeviceGrantError;

/// What the device shows the user once a flow has started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowHandle {
    #[serde(skip)]
    pub generation: u64,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub activation_url: String,
    /// PNG data URL of `activation_url`.
    pub qr_code: String,
    /// Seconds until the grant expires.
    pub expires_in: u64,
    /// Seconds between token polls.
    pub interval: u64,
}

/// Device-flow orchestration: start, status, logout and browser launch.
///
/// Only this service (through its scheduler and revoker) writes the
/// [`FlowStateStore`]; callers get read-only [`FlowView`] snapshots.
///
/// # Example
/// ```no_run
/// use device_grant::auth::service::DeviceFlowService;
/// use device_grant::config::DeviceGrantConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = DeviceFlowService::from_config(&DeviceGrantConfig::load(None)?)?;
/// let handle = service.start_flow().await?;
/// println!("Visit {} and enter {}", handle.verification_uri, handle.user_code);
/// # Ok(())
/// # }
/// ```
pub struct DeviceFlowService {
    backend: Arc<dyn AuthBackend>,
    store: Arc<FlowStateStore>,
    scheduler: PollScheduler,
    revoker: CredentialRevoker,
    browser: Arc<dyn BrowserLauncher>,
    companion_url: String,
    default_interval_ms: u64,
    active: Mutex<Option<PollHandle>>,
}

impl DeviceFlowService {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let store = Arc::new(FlowStateStore::new());
        Self {
            scheduler: PollScheduler::new(backend.clone(), store.clone(), PollPolicy::default()),
            revoker: CredentialRevoker::new(backend.clone(), store.clone()),
            backend,
            store,
            browser: Arc::new(SystemBrowser),
            companion_url: DEFAULT_COMPANION_URL.to_string(),
            default_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            active: Mutex::new(None),
        }
    }

    /// Build a Keycloak-backed service from configuration.
    pub fn from_config(config: &DeviceGrantConfig) -> Result<Self, DeviceGrantError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let backend = KeycloakBackend::new(config.client_id.clone(), config.endpoints())
            .with_scope(config.scope.clone())
            .with_http_client(http);
        Ok(Self::new(Arc::new(backend))
            .with_policy(config.poll_policy())
            .with_companion_url(config.companion_url.clone())
            .with_default_interval_ms(config.default_poll_interval_ms))
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.scheduler = PollScheduler::new(self.backend.clone(), self.store.clone(), policy);
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_companion_url(mut self, url: impl Into<String>) -> Self {
        self.companion_url = url.into();
        self
    }

    pub fn with_default_interval_ms(mut self, interval_ms: u64) -> Self {
        self.default_interval_ms = interval_ms;
        self
    }

    pub fn store(&self) -> &Arc<FlowStateStore> {
        &self.store
    }

    /// Request a device code, supersede any running flow and start polling.
    ///
    /// Authorization-server rejections are returned as-is; nothing is retried.
    pub async fn start_flow(&self) -> Result<FlowHandle, AuthError> {
        info!("starting device flow");
        let authorization = self.backend.request_device_code().await?;
        let activation = ActivationCode::for_user_code(&self.companion_url, &authorization.user_code)?;
        let expires_in = authorization.expires_in;
        let flow = DeviceFlow::issue(
            authorization,
            activation.url.clone(),
            self.default_interval_ms,
            Utc::now(),
        )?;

        let generation = {
            let mut active = self.active();
            if let Some(mut previous) = active.take() {
                previous.cancel();
                info!(generation = previous.generation(), "superseded previous device flow");
            }
            let generation = self.store.set(flow.clone());
            *active = Some(self.scheduler.spawn(generation, &flow));
            generation
        };

        info!(
            generation,
            user_code = %flow.user_code,
            verification_uri = %flow.verification_uri,
            interval_ms = flow.poll_interval_ms,
            expires_in,
            "device flow started"
        );

        Ok(FlowHandle {
            generation,
            user_code: flow.user_code,
            verification_uri: flow.verification_uri,
            verification_uri_complete: flow.verification_uri_complete,
            activation_url: activation.url,
            qr_code: activation.qr_data_url,
            expires_in,
            interval: flow.poll_interval_ms.div_ceil(1_000),
        })
    }

    /// Snapshot for status callers. Never fails.
    pub fn status(&self) -> FlowView {
        self.store.get()
    }

    /// Wait until the flow started as `generation` leaves `Pending` or is superseded.
    pub async fn wait_for_outcome(&self, generation: u64) -> FlowView {
        let mut rx = self.store.subscribe();
        loop {
            let view = rx.borrow_and_update().clone();
            if view.generation != generation || !view.pending {
                return view;
            }
            if rx.changed().await.is_err() {
                return self.store.get();
            }
        }
    }

    /// Cancel polling, drop local state, then revoke the refresh token remotely.
    pub async fn logout(&self) -> RevocationResult {
        let credential = {
            let mut active = self.active();
            if let Some(mut handle) = active.take() {
                handle.cancel();
            }
            self.store.clear()
        };
        self.revoker.revoke_credential(credential).await
    }

    /// Open the companion activation link of the pending flow in a local browser.
    pub fn open_companion_link(&self) -> Result<String, AuthError> {
        let flow = self.store.active_flow().ok_or(AuthError::NoActiveFlow)?;
        self.browser.open(&flow.activation_url)?;
        info!(url = %flow.activation_url, "opened companion activation link");
        Ok(flow.activation_url)
    }

    fn active(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for DeviceFlowService {
    fn drop(&mut self) {
        if let Some(mut handle) = self.active().take() {
            handle.cancel();
        }
    }
}
