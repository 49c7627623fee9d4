use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001", env = "GATEWAY_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every backend and show aggregated health
    Health,
    /// Show circuit breaker state per backend
    Breakers,
    /// Dump Prometheus metrics
    Metrics,
    /// Force a backend's circuit breaker closed
    Reset {
        /// Backend name as configured
        backend: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            // 503 still carries the per-service breakdown.
            print_json(res, true).await?;
        }
        Commands::Breakers => {
            let res = client.get(format!("{}/breakers", base)).send().await?;
            print_json(res, false).await?;
        }
        Commands::Reset { backend } => {
            let res = client
                .post(format!("{}/breakers/{}/reset", base, backend))
                .send()
                .await?;
            print_json(res, false).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            if !res.status().is_success() {
                eprintln!("Error: gateway returned status {}", res.status());
                std::process::exit(1);
            }
            print!("{}", res.text().await?);
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response, allow_unavailable: bool) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let acceptable = status.is_success()
        || (allow_unavailable && status == reqwest::StatusCode::SERVICE_UNAVAILABLE);

    if !acceptable {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);

    if !status.is_success() {
        std::process::exit(2);
    }
    Ok(())
}
