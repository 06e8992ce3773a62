use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crm_data_sync::api::{start_server, ApiState};
use crm_data_sync::config::{AppConfig, Secrets, DEFAULT_CONFIG_PATH};
use crm_data_sync::logging::init_tracing;
use crm_data_sync::store::DynamoStore;

/// Serve the configured DynamoDB table over a token-gated read API
#[derive(Parser, Debug)]
#[command(name = "crm_api", version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let secrets = Secrets::from_env()?;
    let token = secrets.api_token()?;
    let credentials = secrets.aws_credentials()?;
    let config = AppConfig::load(&cli.config)?;

    let store = DynamoStore::connect(&config.dynamo_settings(&credentials)).await;
    let state = ApiState::new(Arc::new(store), config.dynamodb.table_name.clone(), token);
    start_server(state, &config.api.host, config.api.port).await?;
    Ok(())
}

#[actix_web::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing("info");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
