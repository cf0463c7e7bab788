use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Status CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Correlation id to send with the request
    #[arg(short, long)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate health of the gateway and its services; non-zero exit when degraded
    Health,
    /// Gateway name, version and environment
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let path = match cli.command {
        Commands::Health => "/health",
        Commands::Info => "/",
    };

    let mut request = client.get(format!("{}{}", base, path));
    if let Some(id) = &cli.request_id {
        request = request.header("x-request-id", id);
    }
    let res = request.send().await?;
    let status = res.status();
    let body: Value = res.json().await?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    match cli.command {
        Commands::Health => {
            let overall = body["status"].as_str().unwrap_or("unknown");
            if status.is_success() && overall == "healthy" {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Gateway is {} (HTTP {})", overall, status.as_u16());
                Ok(ExitCode::from(2))
            }
        }
        Commands::Info if status.is_success() => Ok(ExitCode::SUCCESS),
        Commands::Info => {
            eprintln!("Error: gateway returned status {}", status);
            Ok(ExitCode::FAILURE)
        }
    }
}
