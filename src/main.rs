use variant_reconciler::config::AppConfig;
use variant_reconciler::store::PostgresStore;
use variant_reconciler::{seed, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    if config.database.in_memory {
        log::info!("Serving the demo catalog from memory");
        return serve(seed::apparel_catalog(), &config).await;
    }

    log::info!("Connecting to PostgreSQL...");
    let database_url = config.database_url()?;
    let postgres_store =
        PostgresStore::new(&database_url, config.database.max_connections.unwrap_or(20)).await?;

    log::info!("Running database migrations...");
    postgres_store.migrate().await?;

    serve(postgres_store, &config).await
}
