//! device-grant: OAuth2 device authorization grant for display-limited devices.
//!
//! The device asks the authorization server for a device code, shows the
//! user a short code plus a scannable companion link, and polls the token
//! endpoint until the user approves or denies on a second device, or the
//! grant expires.
//!
//! # Quick Start
//!
//! ```no_run
//! use device_grant::prelude::*;
//!
//! # async fn example() -> device_grant::error::Result<()> {
//! let config = DeviceGrantConfig::load(None)?;
//! let service = DeviceFlowService::from_config(&config)?;
//! let handle = service.start_flow().await?;
//! println!("Enter {} at {}", handle.user_code, handle.verification_uri);
//! let view = service.wait_for_outcome(handle.generation).await;
//! println!("authenticated: {}", view.authenticated);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod auth;
pub mod browser;
pub mod config;
pub mod error;
pub mod prelude;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
