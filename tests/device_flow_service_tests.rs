//! Initiation, logout and companion-link behaviour of the flow service.

mod flow_support;

use std::time::Duration;

use device_grant::auth::{AuthError, DeviceFlowService, FlowState, TokenTypeHint};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use flow_support::{approved, authorization, RecordingBrowser, ScriptedBackend};

#[tokio::test(start_paused = true)]
async fn start_flow_returns_codes_and_companion_rendering() {
    let backend = ScriptedBackend::new();
    backend.push_authorization(authorization(7, 900, None));
    let service = DeviceFlowService::new(backend.clone())
        .with_companion_url("https://companion.example/");

    let handle = service.start_flow().await.expect("start flow");

    assert_eq!(handle.user_code, "CODE-0007");
    assert_eq!(
        handle.verification_uri,
        "http://localhost:8080/realms/projetcis/device"
    );
    assert_eq!(
        handle.activation_url,
        "https://companion.example/activate?code=CODE-0007"
    );
    assert!(handle.qr_code.starts_with("data:image/png;base64,"));
    assert_eq!(handle.expires_in, 900);
    // no interval from the server: default cadence
    assert_eq!(handle.interval, 5);

    let view = service.status();
    assert!(view.pending);
    assert!(!view.authenticated);
    assert_eq!(view.user_code.as_deref(), Some("CODE-0007"));
}

#[tokio::test(start_paused = true)]
async fn server_interval_is_used_when_present() {
    let backend = ScriptedBackend::new();
    backend.push_authorization(authorization(1, 600, Some(8)));
    let service = DeviceFlowService::new(backend.clone());

    let handle = service.start_flow().await.expect("start flow");

    assert_eq!(handle.interval, 8);
    assert_eq!(
        service.store().active_flow().map(|f| f.poll_interval_ms),
        Some(8_000)
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_initiation_is_surfaced_and_leaves_no_flow() {
    let backend = ScriptedBackend::new();
    backend.reject_device_code(401, "invalid_client");
    let service = DeviceFlowService::new(backend.clone());

    let err = service.start_flow().await.expect_err("rejected");

    assert_eq!(err.oauth_code(), Some("invalid_client"));
    assert!(matches!(err, AuthError::Server { status: 401, .. }));
    let view = service.status();
    assert!(!view.pending);
    assert!(!view.authenticated);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_lifetime_is_rejected_without_tracking_a_flow() {
    let backend = ScriptedBackend::new();
    backend.push_authorization(authorization(1, 100_000_000_000_000, Some(5)));
    let service = DeviceFlowService::new(backend.clone());

    let err = service.start_flow().await.expect_err("rejected");

    assert!(matches!(err, AuthError::InvalidResponse(_)));
    assert!(!service.status().pending);
    assert!(service.store().active_flow().is_none());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn sub_second_default_interval_is_reported_as_one_second() {
    let backend = ScriptedBackend::new();
    backend.push_authorization(authorization(1, 600, None));
    let service = DeviceFlowService::new(backend.clone()).with_default_interval_ms(500);

    let handle = service.start_flow().await.expect("start flow");

    assert_eq!(handle.interval, 1);
    assert_eq!(
        service.store().active_flow().map(|f| f.poll_interval_ms),
        Some(500)
    );
}

#[tokio::test(start_paused = true)]
async fn logout_revokes_refresh_token_and_clears_identity() {
    let backend = ScriptedBackend::new();
    backend.script([approved("access-1", "refresh-1")]);
    let service = DeviceFlowService::new(backend.clone());

    service.start_flow().await.expect("start flow");
    sleep(Duration::from_secs(6)).await;
    assert!(service.status().authenticated);

    let result = service.logout().await;

    assert!(result.revoked);
    assert!(result.error.is_none());
    assert_eq!(
        backend.revocations(),
        vec![("refresh-1".to_string(), TokenTypeHint::RefreshToken)]
    );
    let view = service.status();
    assert!(!view.authenticated);
    assert!(view.user.is_none());
    assert!(service.store().credential().is_none());
}

#[tokio::test(start_paused = true)]
async fn logout_reports_remote_failure_but_clears_locally() {
    let backend = ScriptedBackend::new();
    backend.fail_revocation();
    backend.script([approved("access-1", "refresh-1")]);
    let service = DeviceFlowService::new(backend.clone());

    service.start_flow().await.expect("start flow");
    sleep(Duration::from_secs(6)).await;

    let result = service.logout().await;

    assert!(!result.revoked);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("revocation endpoint unreachable")));
    assert!(!service.status().authenticated);
}

#[tokio::test(start_paused = true)]
async fn logout_when_signed_out_is_a_no_op() {
    let backend = ScriptedBackend::new();
    let service = DeviceFlowService::new(backend.clone());

    let result = service.logout().await;

    assert!(!result.revoked);
    assert!(result.error.is_none());
    assert!(backend.revocations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn new_flow_keeps_existing_credential_until_outcome() {
    let backend = ScriptedBackend::new();
    backend.script([approved("access-1", "refresh-1")]);
    let service = DeviceFlowService::new(backend.clone());

    service.start_flow().await.expect("first flow");
    sleep(Duration::from_secs(6)).await;
    service.start_flow().await.expect("second flow");

    let view = service.status();
    assert!(view.authenticated);
    assert!(view.pending);
    assert_eq!(view.user_code.as_deref(), Some("CODE-0002"));
    assert_eq!(view.last_outcome, None);
}

#[tokio::test(start_paused = true)]
async fn open_companion_link_without_flow_is_rejected() {
    let backend = ScriptedBackend::new();
    let browser = RecordingBrowser::new();
    let service = DeviceFlowService::new(backend).with_browser(browser.clone());

    let err = service.open_companion_link().expect_err("no flow");

    assert!(matches!(err, AuthError::NoActiveFlow));
    assert_eq!(err.to_string(), "No active device flow");
    assert!(browser.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn open_companion_link_opens_activation_url() {
    let backend = ScriptedBackend::new();
    let browser = RecordingBrowser::new();
    let service = DeviceFlowService::new(backend).with_browser(browser.clone());

    service.start_flow().await.expect("start flow");
    let url = service.open_companion_link().expect("open link");

    assert_eq!(url, "https://localhost:3000/activate?code=CODE-0001");
    assert_eq!(browser.opened(), vec![url]);
}

#[tokio::test(start_paused = true)]
async fn open_companion_link_after_outcome_is_rejected() {
    let backend = ScriptedBackend::new();
    backend.script([approved("access-1", "refresh-1")]);
    let browser = RecordingBrowser::new();
    let service = DeviceFlowService::new(backend).with_browser(browser.clone());

    service.start_flow().await.expect("start flow");
    sleep(Duration::from_secs(6)).await;
    assert_eq!(service.status().last_outcome, Some(FlowState::Approved));

    assert!(matches!(
        service.open_companion_link(),
        Err(AuthError::NoActiveFlow)
    ));
    assert!(browser.opened().is_empty());
}
