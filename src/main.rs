//! llm-bridge - Local HTTP bridge for streaming language-model chat
//!
//! Exposes a single POST /chat endpoint that selects a configured model
//! by vendor/family and streams its output back as plain text.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use llm_bridge::backend::HttpBackend;
use llm_bridge::bridge::BridgeServer;
use llm_bridge::Config;

#[derive(Parser)]
#[command(name = "llm-bridge")]
#[command(about = "Local HTTP bridge for streaming language-model chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "bridge.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "bridge.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llm_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let mut config = Config::from_file(&config)?;

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            let backend = Arc::new(HttpBackend::new(config.vendors.clone())?);
            let mut server = BridgeServer::new(config.server.listen.clone(), backend);
            server.start().await?;

            // The bridge runs until the owning process asks it to stop;
            // ctrl-c is the deactivation hook that releases the socket.
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown signal received");
            server.stop().await;

            Ok(())
        }

        Commands::Check { config } => {
            let config = Config::from_file(&config)?;
            for vendor in &config.vendors {
                tracing::info!(
                    vendor = %vendor.name,
                    url = %vendor.url,
                    families = ?vendor.families,
                    "Configured vendor"
                );
            }
            tracing::info!(listen = %config.server.listen, "Configuration OK");
            Ok(())
        }
    }
}
