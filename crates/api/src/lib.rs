pub mod error;
pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The upload route carries its own body limit; the JSON routes keep the
    // axum default.
    let upload_routes = Router::new()
        .route("/process", post(routes::meeting::process))
        .layer(DefaultBodyLimit::max(state.max_upload_mb * 1024 * 1024));

    let meeting_routes = Router::new()
        .merge(upload_routes)
        .route("/resolve", post(routes::meeting::resolve))
        .route("/actions", post(routes::meeting::actions));

    let api = Router::new().nest("/meeting", meeting_routes);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
