use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{contract::contract_handler, negotiation::negotiation_handler, realtime::realtime_handler},
    middleware::auth,
    AppState,
};

// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest(
            "/negotiations",
            negotiation_handler().layer(middleware::from_fn(auth)),
        )
        .nest(
            "/contracts",
            contract_handler().layer(middleware::from_fn(auth)),
        )
        .nest(
            "/realtime",
            realtime_handler().layer(middleware::from_fn(auth)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
