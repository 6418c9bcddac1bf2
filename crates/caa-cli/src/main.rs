use std::sync::Arc;

use anyhow::{Context, Result};
use caa_pipeline::{maybe_build_scheduler, Aggregator, AggregatorConfig};
use caa_source::MongoSourceStore;
use caa_warehouse::{PgWarehouse, Warehouse};
use caa_web::AppState;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "caa-cli")]
#[command(about = "Clinic aggregation service command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP server and the daily scheduler.
    Serve,
    /// Run the pipeline once and print a summary.
    Run,
    /// Bootstrap the warehouse tables and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AggregatorConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let aggregator = build_aggregator(&config).await?;
            if let Some(scheduler) = maybe_build_scheduler(aggregator.clone(), &config).await? {
                scheduler.start().await.context("starting scheduler")?;
                info!(cron = %config.cron, "daily aggregation scheduler started");
            }
            caa_web::serve(AppState::new(aggregator), &config.base_path, config.port).await?;
        }
        Commands::Run => {
            let aggregator = build_aggregator(&config).await?;
            let bundle = aggregator.run().await?;
            println!(
                "aggregation complete: doctors={} months={} specialties={}",
                bundle.appointments_per_doctor.len(),
                bundle.appointment_frequency.len(),
                bundle.common_conditions_by_specialty.len()
            );
        }
        Commands::Migrate => {
            let warehouse = PgWarehouse::connect(&config.database_url).await?;
            warehouse.ensure_schema().await?;
            println!("warehouse schema is up to date");
        }
    }

    Ok(())
}

async fn build_aggregator(config: &AggregatorConfig) -> Result<Arc<Aggregator>> {
    let source = MongoSourceStore::connect(&config.mongo_uri, &config.mongo_db).await?;
    let warehouse = PgWarehouse::connect(&config.database_url).await?;
    warehouse.ensure_schema().await?;
    Ok(Arc::new(Aggregator::new(
        Arc::new(source),
        Arc::new(warehouse),
        config.snapshot_path.clone(),
    )))
}
