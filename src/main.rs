//! bulk-gateway - HTTP gateway with a transactional bulk endpoint

use bulk_rs::config::Config;
use bulk_rs::server;
use bulk_rs::utils::logging::init_tracing;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "bulk-gateway", version, about)]
struct Cli {
    /// YAML configuration file; skipped when it does not exist
    #[arg(short, long, env = "BULK_CONFIG", default_value = "config/gateway.yaml")]
    config: PathBuf,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

/// File settings first, then `BULK_*` environment variables on top
async fn load_config(cli: &Cli) -> bulk_rs::Result<Config> {
    let env = Config::from_env()?;
    if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
        Ok(Config::from_file(&cli.config).await?.merge(env))
    } else {
        Ok(env)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.print_config {
        return match config.to_yaml() {
            Ok(yaml) => {
                println!("{}", yaml);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = init_tracing(config.logging()) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    info!(config = %cli.config.display(), "Starting bulk gateway");

    match server::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
