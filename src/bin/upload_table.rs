use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crm_data_sync::config::{AppConfig, Secrets, DEFAULT_CONFIG_PATH};
use crm_data_sync::logging::init_tracing;
use crm_data_sync::processing::Transform;
use crm_data_sync::store::DynamoStore;
use crm_data_sync::upload::Uploader;

/// Upload a CSV/spreadsheet into the configured DynamoDB table
#[derive(Parser, Debug)]
#[command(name = "upload_table", version, about, long_about = None)]
struct Cli {
    /// File to upload (.csv, or the first sheet of a workbook)
    file: PathBuf,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Transform applied before upload; repeat to chain
    #[arg(long = "transform", value_name = "SPEC")]
    transforms: Vec<Transform>,
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = Secrets::from_env()?.aws_credentials()?;
    if !cli.file.exists() {
        return Err(format!("file not found: {}", cli.file.display()).into());
    }
    let config = AppConfig::load(&cli.config)?;

    let store = DynamoStore::connect(&config.dynamo_settings(&credentials)).await;
    let uploader = Uploader::new(
        Arc::new(store),
        config.dynamodb.table_name.clone(),
        config.dynamodb.primary_key_column.clone(),
    )
    .with_transforms(cli.transforms);

    let summary = uploader.upload_file(&cli.file).await?;
    println!(
        "Uploaded {} items to '{}' ({} skipped)",
        summary.uploaded, config.dynamodb.table_name, summary.skipped
    );
    Ok(())
}

#[tokio::main]
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
