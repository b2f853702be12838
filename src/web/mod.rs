mod auth_middleware;
mod auth_routes;
mod chats;
pub mod stream;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub use auth_middleware::validate_jwt;
pub use auth_routes::router as auth_routes;
pub use chats::router as chat_routes;
pub use stream::router as stream_routes;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}
