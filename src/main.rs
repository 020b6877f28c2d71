/// Login Ingest
///
/// Polls login events from SQS, masks PII fields and loads the records into PostgreSQL.
mod cli;
mod config;
mod db;
mod etl;
mod logging;
mod models;
mod pipeline;
mod sqs;

use anyhow::{Context, Result};
use crate::config::Settings;
use clap::Parser;
use cli::Cli;
use etl::{extract::SqsSource, load::PostgresWriter};
use pipeline::{Pipeline, PipelineConfig};
use sqs::SqsClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config).context("Failed to load configuration")?;
    let pipeline_settings = cli.merge(settings.pipeline.clone());
    Cli::validate(&pipeline_settings)?;

    let client = SqsClient::new(&settings.sqs).await;
    tracing::info!("Polling queue {}", client.queue_url());
    let source = SqsSource::new(client, pipeline_settings.max_messages, pipeline_settings.wait_seconds);

    let options = db::connect_options(&settings.postgres);
    if let Err(e) = db::test_connection(&options).await {
        // Writes open their own connections, so an unavailable database is not fatal here
        tracing::warn!(
            "Database {}:{} not reachable at startup: {}",
            settings.postgres.host,
            settings.postgres.port,
            e
        );
    }
    let writer = PostgresWriter::new(options, pipeline_settings.write_timeout());

    let pipeline = Pipeline::new(source, PipelineConfig { ack_mode: pipeline_settings.ack_mode });

    if cli.once {
        let stats = pipeline.run_cycle(&writer).await.context("Poll cycle failed")?;
        tracing::info!(
            "Cycle complete: {} received, {} written, {} failed",
            stats.messages_received,
            stats.records_written,
            stats.write_failures
        );
        return Ok(());
    }

    pipeline.run(&writer).await.context("Pipeline stopped")?;

    Ok(())
}
