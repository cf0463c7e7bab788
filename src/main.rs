use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_gateway::config::load_config;
use api_gateway::lifecycle::startup;
use api_gateway::observability::init_logging;

/// API gateway for the LLM frontend services.
#[derive(Parser)]
#[command(name = "api-gateway", version, about)]
struct Cli {
    /// Path to a TOML configuration file (environment variables override it).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is normal
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("api-gateway: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guards = match init_logging(&config.observability) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("api-gateway: {}", e);
            return ExitCode::FAILURE;
        }
    };
    startup::install_panic_hook();

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed to start");
            ExitCode::FAILURE
        }
    }
}
