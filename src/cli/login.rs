//! Terminal rendition of the device flow.

use crate::activation::qr_terminal;
use crate::auth::{DeviceFlowService, FlowState};
use crate::error::Result;

/// Start a flow, show the code and wait for a terminal state.
///
/// Ctrl-C abandons the flow and clears local state.
pub async fn handle_login(service: &DeviceFlowService, open_browser: bool, show_qr: bool) -> Result<FlowState> {
    let handle = service.start_flow().await?;

    println!("🔗 Visit: {}", handle.verification_uri);
    println!("📋 Enter code: {}", handle.user_code);
    if let Some(complete) = &handle.verification_uri_complete {
        println!("   Or open: {complete}");
    }
    println!("📱 Companion link: {}", handle.activation_url);
    if show_qr {
        match qr_terminal(&handle.activation_url) {
            Ok(qr) => println!("{qr}"),
            Err(e) => eprintln!("⚠️  Could not render QR code: {e}"),
        }
    }
    if open_browser {
        if let Err(e) = service.open_companion_link() {
            eprintln!("⚠️  Could not open browser: {e}");
        }
    }
    println!("⏳ Waiting for authorization (expires in {}s)...", handle.expires_in);

    let view = tokio::select! {
        view = service.wait_for_outcome(handle.generation) => view,
        _ = tokio::signal::ctrl_c() => {
            service.logout().await;
            eprintln!("❌ Login abandoned");
            return Ok(FlowState::Pending);
        }
    };

    let outcome = view.last_outcome.unwrap_or(FlowState::Pending);
    match outcome {
        FlowState::Approved => {
            let who = view
                .user
                .as_ref()
                .and_then(|u| u.get("email").or_else(|| u.get("preferred_username")))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown user");
            println!("✅ Logged in as {who}");
        }
        FlowState::Denied => eprintln!("❌ Authorization denied"),
        FlowState::Expired => eprintln!("❌ Device code expired, please try again"),
        FlowState::Pending => eprintln!("❌ Flow superseded before completion"),
    }
    Ok(outcome)
}
