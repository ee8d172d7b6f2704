//! device-grant binary entry point.

use std::sync::Arc;

use clap::Parser;
use device_grant::auth::{DeviceFlowService, FlowState};
use device_grant::cli::{Cli, Commands};
use device_grant::config::DeviceGrantConfig;
use device_grant::error::Result;

#[tokio::main]
async fn main() {
    device_grant::cli::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = DeviceGrantConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut config);
            let service = Arc::new(DeviceFlowService::from_config(&config)?);
            let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
            device_grant::server::serve(listener, service).await?;
            Ok(0)
        }
        Commands::Login(args) => {
            let service = DeviceFlowService::from_config(&config)?;
            let outcome = device_grant::cli::login::handle_login(&service, !args.no_browser, !args.no_qr).await?;
            Ok(if outcome == FlowState::Approved { 0 } else { 1 })
        }
    }
}
