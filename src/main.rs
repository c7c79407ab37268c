use dotenvy::dotenv;
use finsync::config;
use finsync::core::category;
use finsync::errors::{Error, Result};
use finsync::sync::adapters;
use finsync::sync::importer::{Importer, SinkTarget};
use finsync::sync::workers::WorkerSupervisor;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (non-fatal, env vars can be set externally)
    dotenv().ok();

    // 3. Load the source/sink configuration
    let app_config = config::sources::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    if app_config.sources.is_empty() {
        error!("config.toml defines no [[sources]]; nothing to import");
        return Err(Error::Config {
            message: "no sources configured".to_string(),
        });
    }
    info!(sources = app_config.sources.len(), "Configuration loaded");

    // 4. Initialize the database
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;
    config::database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    // 5. Seed system categories (idempotent)
    category::seed_system_categories(&db).await?;

    // 6. Resolve adapters and register one worker per source
    let http_timeout = Duration::from_secs(app_config.import.http_timeout_secs);
    let sink = match &app_config.sink {
        Some(sink_config) => Some(SinkTarget {
            adapter: adapters::build_sink(sink_config, http_timeout)?,
            account: sink_config.account.clone(),
        }),
        None => None,
    };

    let supervisor = WorkerSupervisor::new(Duration::from_secs(
        app_config.import.stop_timeout_secs,
    ));
    for source_config in &app_config.sources {
        let source = adapters::build_source(source_config, http_timeout)?;
        let interval = Duration::from_secs(source_config.interval_secs);
        let importer = Importer::new(
            db.clone(),
            source,
            sink.clone(),
            source_config.clone(),
            app_config.import.clone(),
        );
        supervisor.register(importer, interval);
    }

    // 7. Run until interrupted
    supervisor.start_all()?;
    info!("Import workers running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    supervisor.stop_all().await?;

    Ok(())
}
