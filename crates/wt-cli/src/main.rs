//! webssh-tunnel: serve a web terminal through a remote tunnel
//!
//! Usage:
//!   webssh-tunnel --name box --remote tunnel.example.com:8088
//!   webssh-tunnel version

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use webssh_tunnel::cli::{log_filter, Cli, Commands};
use webssh_tunnel::output::{print_error, print_info, print_success, print_warning};
use wt_agent::ServiceOrchestrator;
use wt_core::config::{self, ProcessEnv};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("webssh-tunnel version: {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let flags = cli.run.into_flags();
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_filter(
            flags.debug,
            std::env::var("RUST_LOG").ok(),
        )))
        .with(fmt::layer().with_target(false))
        .init();

    let config = config::resolve(flags, &ProcessEnv).context("Invalid configuration")?;

    if !config.requires_auth() {
        print_warning("No password set; the web terminal is open to anyone with the URL");
    }
    print_info(&format!(
        "Connecting '{}' to tunnel server {}",
        config.name,
        config.tunnel_url()
    ));

    match ServiceOrchestrator::new(config).start().await {
        Ok(()) => {
            print_success("Stopped");
            Ok(())
        }
        Err(e) if e.is_graceful() => {
            print_info(&e.to_string());
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            Err(e).context("Service stopped with an error")
        }
    }
}
