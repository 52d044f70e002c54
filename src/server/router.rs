use axum::{http::Method, response::Html, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use super::state::ServeState;
use super::ws;
use crate::CONSOLE_HTML;

pub fn build_console_router(state: ServeState) -> Router {
    Router::new()
        .route("/", get(|| async { Html(CONSOLE_HTML) }))
        .route("/health", get(health_handler))
        .merge(ws::router())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
