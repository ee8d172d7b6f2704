//! CLI entry point for the device app.

pub mod login;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::DeviceGrantConfig;

const DEFAULT_LOG_FILTER: &str = "device_grant=info,tower_http=info";

/// OAuth2 device authorization grant for display-limited devices
#[derive(Parser, Debug)]
#[command(name = "device-grant", version, about = "Device authorization grant app")]
pub struct Cli {
    /// Config file (defaults to the per-user config path if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP status/control surface
    Serve(ServeArgs),
    /// Run one device flow in the terminal
    Login(LoginArgs),
}

/// Arguments for `device-grant serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides BIND_ADDRESS)
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for `device-grant login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Do not open the activation link in a local browser
    #[arg(long)]
    pub no_browser: bool,

    /// Do not print the activation QR code
    #[arg(long)]
    pub no_qr: bool,
}

impl ServeArgs {
    /// Apply flag overrides on top of file and environment values.
    pub fn apply(&self, config: &mut DeviceGrantConfig) {
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

/// Install the global `tracing` subscriber (`RUST_LOG` overrides the default filter).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
