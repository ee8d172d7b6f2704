//! Launching the companion activation link on the local machine.

use crate::auth::AuthError;

/// Opens URLs in a browser context.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), AuthError>;
}

/// Uses the platform's default handler (`xdg-open`, `open`, `start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), AuthError> {
        open::that_detached(url).map_err(|e| AuthError::Browser(e.to_string()))
    }
}
