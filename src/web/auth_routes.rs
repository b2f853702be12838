use crate::db::DBError;
use crate::jwt::new_access_token;
use crate::models::users::{NewUser, User};
use crate::{ApiError, AppState};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use password_auth::{generate_hash, verify_password};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Deserialize, Clone)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Clone)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn register(
    State(data): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let email = normalize_email(&body.email);
    if body.name.trim().is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest);
    }

    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || generate_hash(password))
        .await
        .map_err(|e| {
            error!("Password hashing task failed: {:?}", e);
            ApiError::InternalServerError
        })?;

    let user = data
        .db
        .create_user(NewUser::new(
            body.name.trim().to_string(),
            email,
            password_hash,
        ))
        .map_err(ApiError::from)?;

    info!("Registered user {}", user.uuid);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.uuid,
            name: user.name,
            email: user.email,
        }),
    ))
}

async fn login(
    State(data): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&body.email);
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest);
    }

    let user = match data.db.get_user_by_email(&email) {
        Ok(user) => user,
        Err(DBError::UserNotFound) => {
            debug!("Login attempt for unknown email");
            return Err(ApiError::InvalidUsernameOrPassword);
        }
        Err(e) => return Err(e.into()),
    };

    if !password_matches(&user, body.password).await? {
        debug!("Wrong password for user {}", user.uuid);
        return Err(ApiError::InvalidUsernameOrPassword);
    }

    let access_token = new_access_token(&user, data.jwt_secret())?;
    Ok(Json(LoginResponse { access_token }))
}

async fn password_matches(user: &User, password: String) -> Result<bool, ApiError> {
    let hash = user.password_hash.clone();
    tokio::task::spawn_blocking(move || verify_password(password, &hash).is_ok())
        .await
        .map_err(|e| {
            error!("Password verification task failed: {:?}", e);
            ApiError::InternalServerError
        })
}

async fn logout() -> Json<MessageResponse> {
    // access tokens are stateless; the client discards its copy
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}
