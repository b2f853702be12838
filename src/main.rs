use crate::config::{AppConfig, ConfigError};
use crate::db::{setup_db, DBConnection, DBError};
use crate::generation::BackendSelector;
use crate::jwt::JwtError;
use crate::models::chats::ChatError;
use crate::models::prompts::PromptError;
use crate::models::users::UserError;
use crate::web::stream::ActiveStreams;
use axum::{http::HeaderValue, http::StatusCode, response::IntoResponse, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod generation;
mod jwt;
mod models;
mod web;

#[cfg(test)]
mod test_support;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid email or password")]
    InvalidUsernameOrPassword,

    #[error("Invalid JWT")]
    InvalidJwt,

    #[error("Internal server error")]
    InternalServerError,

    #[error("Bad Request")]
    BadRequest,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Resource not found")]
    NotFound,

    #[error("A response is already streaming for this prompt")]
    StreamInProgress,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidUsernameOrPassword => StatusCode::UNAUTHORIZED,
            ApiError::InvalidJwt => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::EmailAlreadyExists => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::StreamInProgress => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<DBError> for ApiError {
    fn from(err: DBError) -> Self {
        match err {
            DBError::UserNotFound
            | DBError::ChatError(ChatError::NotFound)
            | DBError::PromptError(PromptError::NotFound) => ApiError::NotFound,
            DBError::UserError(UserError::DuplicateEmail) => ApiError::EmailAlreadyExists,
            _ => {
                error!("Database error: {:?}", err);
                ApiError::InternalServerError
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Validation(_) => ApiError::InvalidJwt,
            JwtError::TokenCreation(e) => {
                error!("Could not create token: {:?}", e);
                ApiError::InternalServerError
            }
        }
    }
}

pub struct AppState {
    db: Arc<dyn DBConnection + Send + Sync>,
    config: AppConfig,
    backends: BackendSelector,
    active_streams: Arc<ActiveStreams>,
}

impl AppState {
    pub fn new(db: Arc<dyn DBConnection + Send + Sync>, config: AppConfig) -> Self {
        let backends = BackendSelector::new(config.backends.clone());
        Self {
            db,
            config,
            backends,
            active_streams: Arc::new(ActiveStreams::new()),
        }
    }

    fn jwt_secret(&self) -> &[u8] {
        self.config.jwt_secret.as_bytes()
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DBError),
    #[error("Invalid CORS origin: {0}")]
    CorsOrigin(String),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, StartupError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin {
        Some(origin) => {
            let value = HeaderValue::from_str(origin)
                .map_err(|_| StartupError::CorsOrigin(origin.to_string()))?;
            Ok(layer.allow_origin(value))
        }
        None => Ok(layer.allow_origin(Any)),
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(web::health_routes())
        .merge(web::auth_routes(state.clone()))
        .merge(web::chat_routes(state.clone()))
        .merge(web::stream_routes(state))
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    let db = setup_db(&config.database_url)?;

    let cors = cors_layer(config.cors_origin.as_deref())?;
    let address = config.bind_address();
    let state = Arc::new(AppState::new(Arc::new(db), config));

    let app = app(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("Startup failed: {}", e);
        std::process::exit(1);
    }
}
