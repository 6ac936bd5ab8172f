//! Coordinator binary

use clap::{Parser, Subcommand};
use quorumkv::{Config, Protocol, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quorumkv-coord")]
#[command(about = "quorumkv coordinator with in-process replicas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordinator and its replicas
    Serve {
        /// Config file (defaults to ./quorumkv.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replication protocol
        #[arg(long, value_enum)]
        protocol: Option<Protocol>,

        /// Bind address for the client HTTP API
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            protocol,
            bind,
        } => {
            // File and environment first, CLI flags win
            let mut config = Config::load(config.as_deref())?;
            if let Some(protocol) = protocol {
                config.protocol = protocol;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            Server::new(config)?.serve().await?;
        }
    }

    Ok(())
}
