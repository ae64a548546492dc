use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Variant generation
        .route(
            "/trigger/variant-generator",
            post(handlers::trigger_variant_generator::<S>),
        )
        // Previews
        .route(
            "/products/:id/variant-preview",
            get(handlers::preview_variant_breakdown::<S>),
        )
        .route(
            "/products/:id/variant-preview/count",
            get(handlers::preview_variant_count::<S>),
        )
}
