//! Edge gateway binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Edge gateway with rate limiting and per-backend circuit breakers", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match edge_gateway::lifecycle::startup::run(args.config.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet.
            eprintln!("edge-gateway: {}", e);
            tracing::error!(error = %e, "Gateway exited with error");
            ExitCode::FAILURE
        }
    }
}
