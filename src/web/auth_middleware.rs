use crate::db::DBError;
use crate::jwt::{validate_token, USER_ACCESS};
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Resolves the bearer token to a [`crate::models::users::User`] and stores it
/// in the request extensions.
pub async fn validate_jwt(
    State(data): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer ").map(ToString::to_string))
    {
        Some(token) => token,
        None => return ApiError::InvalidJwt.into_response(),
    };

    let claims = match validate_token(&token, data.jwt_secret(), USER_ACCESS) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Rejected token: {:?}", e);
            return ApiError::InvalidJwt.into_response();
        }
    };

    let user_uuid = match Uuid::parse_str(&claims.sub) {
        Ok(uuid) => uuid,
        Err(e) => {
            error!("Error parsing user uuid: {:?}", e);
            return ApiError::InvalidJwt.into_response();
        }
    };

    let user = match data.db.get_user_by_uuid(user_uuid) {
        Ok(user) => user,
        Err(DBError::UserNotFound) => return ApiError::Unauthorized.into_response(),
        Err(e) => {
            error!("Error getting user: {:?}", e);
            return ApiError::InternalServerError.into_response();
        }
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}
