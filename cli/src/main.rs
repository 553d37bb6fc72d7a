// peerbeam — signaling relay and file-transfer peers
//
// `serve` runs the relay; `send` and `recv` are terminal peers that use
// the relayed file-chunk fallback path.

mod config;
mod recv;
mod send;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use peerbeam_core::signal::DEFAULT_SESSION;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "peerbeam")]
#[command(about = "Peerbeam — peer-to-peer file sharing over a signaling relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay service
    Serve {
        /// Listen port (overrides the PORT environment variable)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send a file into a relay session
    Send {
        /// File to send
        file: PathBuf,
        #[arg(short, long, default_value = "ws://127.0.0.1:5000")]
        relay: String,
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Receive a file from a relay session
    Recv {
        /// Directory to save the received file into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        #[arg(short, long, default_value = "ws://127.0.0.1:5000")]
        relay: String,
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = config::RelayConfig::from_env();
            if let Some(port) = port {
                config.listen_port = port;
            }
            println!(
                "{} relay on {}:{}",
                "Starting".bold(),
                config.bind_addr,
                config.listen_port
            );
            server::run(config).await
        }
        Commands::Send {
            file,
            relay,
            session,
        } => send::run(&relay, &session, &file).await,
        Commands::Recv {
            output,
            relay,
            session,
        } => recv::run(&relay, &session, &output).await,
    }
}
