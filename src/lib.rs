pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{EngineResult, ReconcileError};

pub use logic::{
    CombinationGenerator, CombinationKeyEncoder, QueueReport, ReconcileCommand, ReconcileQueue,
    VariantEngine,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

/// Build the router over a store and serve it on the configured address
pub async fn serve<S: Store + 'static>(store: S, config: &config::AppConfig) -> anyhow::Result<()> {
    use std::sync::Arc;
    use tokio::net::TcpListener;

    let engine = Arc::new(VariantEngine::new(Arc::new(store), config.reconcile.clone()));
    let app = crate::api::routes::create_router().with_state(engine);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Variant reconciler listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
