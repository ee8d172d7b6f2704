#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use device_grant::auth::{
    AuthBackend, AuthError, Credential, DeviceAuthorization, TokenPoll, TokenTypeHint,
};
use device_grant::browser::BrowserLauncher;
use tokio::time::Instant;

/// One scripted answer of the token endpoint.
#[derive(Debug, Clone)]
pub enum ScriptedPoll {
    Outcome(TokenPoll),
    NetworkError,
}

#[derive(Debug, Clone)]
pub struct PollCall {
    pub device_code: String,
    pub at: Instant,
}

/// In-memory authorization server answering from a script.
pub struct ScriptedBackend {
    authorizations: Mutex<VecDeque<DeviceAuthorization>>,
    reject_device_code: Mutex<Option<(u16, String)>>,
    issued: Mutex<u32>,
    polls: Mutex<VecDeque<ScriptedPoll>>,
    fallback: Mutex<ScriptedPoll>,
    calls: Mutex<Vec<PollCall>>,
    user_info: Mutex<Option<serde_json::Value>>,
    revoke_fails: Mutex<bool>,
    revocations: Mutex<Vec<(String, TokenTypeHint)>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            authorizations: Mutex::new(VecDeque::new()),
            reject_device_code: Mutex::new(None),
            issued: Mutex::new(0),
            polls: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ScriptedPoll::Outcome(TokenPoll::Pending)),
            calls: Mutex::new(Vec::new()),
            user_info: Mutex::new(Some(serde_json::json!({
                "sub": "user-1",
                "email": "alice@example.com",
                "preferred_username": "alice"
            }))),
            revoke_fails: Mutex::new(false),
            revocations: Mutex::new(Vec::new()),
        })
    }

    pub fn push_authorization(&self, authorization: DeviceAuthorization) {
        self.authorizations.lock().unwrap().push_back(authorization);
    }

    pub fn reject_device_code(&self, status: u16, error: &str) {
        *self.reject_device_code.lock().unwrap() = Some((status, error.to_string()));
    }

    pub fn script(&self, polls: impl IntoIterator<Item = ScriptedPoll>) {
        self.polls.lock().unwrap().extend(polls);
    }

    pub fn set_fallback(&self, poll: ScriptedPoll) {
        *self.fallback.lock().unwrap() = poll;
    }

    pub fn fail_user_info(&self) {
        *self.user_info.lock().unwrap() = None;
    }

    pub fn fail_revocation(&self) {
        *self.revoke_fails.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<PollCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn revocations(&self) -> Vec<(String, TokenTypeHint)> {
        self.revocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError> {
        if let Some((status, error)) = self.reject_device_code.lock().unwrap().clone() {
            return Err(AuthError::Server {
                status,
                error,
                description: None,
            });
        }
        if let Some(next) = self.authorizations.lock().unwrap().pop_front() {
            return Ok(next);
        }
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        Ok(authorization(*issued, 600, Some(5)))
    }

    async fn poll_token(&self, device_code: &str) -> Result<TokenPoll, AuthError> {
        self.calls.lock().unwrap().push(PollCall {
            device_code: device_code.to_string(),
            at: Instant::now(),
        });
        let next = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        match next {
            ScriptedPoll::Outcome(poll) => Ok(poll),
            ScriptedPoll::NetworkError => Err(AuthError::Network("connection refused".to_string())),
        }
    }

    async fn fetch_user_info(&self, _access_token: &str) -> Result<serde_json::Value, AuthError> {
        self.user_info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AuthError::InvalidResponse("User info request failed with status 500".into()))
    }

    async fn revoke_token(&self, token: &str, hint: TokenTypeHint) -> Result<(), AuthError> {
        self.revocations
            .lock()
            .unwrap()
            .push((token.to_string(), hint));
        if *self.revoke_fails.lock().unwrap() {
            Err(AuthError::Network("revocation endpoint unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Browser stand-in recording every URL it was asked to open.
#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
}

impl RecordingBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl BrowserLauncher for RecordingBrowser {
    fn open(&self, url: &str) -> Result<(), AuthError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn authorization(n: u32, expires_in: u64, interval: Option<u64>) -> DeviceAuthorization {
    DeviceAuthorization {
        device_code: format!("device-{n}"),
        user_code: format!("CODE-{n:04}"),
        verification_uri: "http://localhost:8080/realms/projetcis/device".to_string(),
        verification_uri_complete: Some(format!(
            "http://localhost:8080/realms/projetcis/device?user_code=CODE-{n:04}"
        )),
        expires_in,
        interval,
    }
}

pub fn credential(access_token: &str, refresh_token: Option<&str>) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(String::from),
        id_token: None,
        expires_at: None,
        issued_at: Utc::now(),
        scopes: None,
    }
}

pub fn approved(access_token: &str, refresh_token: &str) -> ScriptedPoll {
    ScriptedPoll::Outcome(TokenPoll::Authorized(credential(
        access_token,
        Some(refresh_token),
    )))
}

pub fn pending() -> ScriptedPoll {
    ScriptedPoll::Outcome(TokenPoll::Pending)
}
