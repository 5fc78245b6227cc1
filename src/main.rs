//! sqlrag - answer questions with SQL run on a data warehouse.

use sqlrag::cli::{Cli, OutputFormat};
use sqlrag::config::{Config, WarehouseConfig};
use sqlrag::error::{Result, RetrieverError};
use sqlrag::execution::Document;
use sqlrag::generator::LlmSqlGenerator;
use sqlrag::llm::create_client;
use sqlrag::logging::init_stderr_logging;
use sqlrag::retriever::SqlRetriever;
use sqlrag::warehouse::{self, LocalWarehouse, QueryExecutionClient, WarehouseBackend};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let format = cli
        .parse_output_format()
        .map_err(RetrieverError::config)?;

    // Build configuration with precedence:
    // 1. CLI arguments (highest)
    // 2. Config file
    // 3. Environment variables
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_to(&mut config)?;
    config.warehouse.apply_env_defaults();
    config.llm.inherit_aws_settings(&config.warehouse);
    config.validate()?;

    info!(
        "LLM: {}, warehouse: {}",
        config.llm.provider,
        config.warehouse.display_string()
    );

    let llm = create_client(&config.llm).await?;
    let generator = LlmSqlGenerator::new(llm).with_prompt(config.prompt.clone());
    let warehouse = open_warehouse(&config.warehouse, cli.seed.as_deref()).await?;

    let retriever = SqlRetriever::builder()
        .generator(Arc::new(generator))
        .warehouse(warehouse)
        .schedule(config.polling.schedule())
        .database(config.warehouse.database_or_default())
        .output_location(config.warehouse.output_location_or_default())
        .build()?;

    let result = retriever.retrieve(&cli.question, &cli.run_context()).await?;
    print_documents(&result.into_documents(), format)
}

/// Connects to the configured warehouse, seeding the local backend if asked.
async fn open_warehouse(
    config: &WarehouseConfig,
    seed: Option<&Path>,
) -> Result<Arc<dyn QueryExecutionClient>> {
    let Some(seed) = seed else {
        return Ok(Arc::from(warehouse::connect(config).await?));
    };

    if config.backend != WarehouseBackend::Local {
        return Err(RetrieverError::config(
            "--seed is only supported with the local warehouse",
        ));
    }

    let path = config
        .local_path
        .as_deref()
        .ok_or_else(|| RetrieverError::config("Local warehouse requires warehouse.local_path"))?;
    let script = std::fs::read_to_string(seed).map_err(|e| {
        RetrieverError::config(format!("Failed to read seed file {}: {e}", seed.display()))
    })?;

    let local = LocalWarehouse::open(path).await?;
    local.seed(&script).await?;
    info!("Seeded local warehouse from {}", seed.display());

    Ok(Arc::new(local))
}

fn print_documents(documents: &[Document; 2], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let [data, metadata] = documents;
            println!("{}", data.page_content);
            for (key, value) in &metadata.metadata {
                println!("{key}: {value}");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(documents).map_err(|e| {
                RetrieverError::internal(format!("Failed to serialize documents: {e}"))
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
