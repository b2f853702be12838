use crate::models::users::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const USER_ACCESS: &str = "access";

const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token creation failed: {0}")]
    TokenCreation(jsonwebtoken::errors::Error),
    #[error("Token validation failed: {0}")]
    Validation(jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn new_access_token(user: &User, secret: &[u8]) -> Result<String, JwtError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.uuid.to_string(),
        aud: USER_ACCESS.to_string(),
        exp: (now + Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS)).timestamp(),
        iat: now.timestamp(),
    };
    encode_claims(&claims, secret)
}

fn encode_claims(claims: &Claims, secret: &[u8]) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(JwtError::TokenCreation)
}

pub fn validate_token(token: &str, secret: &[u8], audience: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(JwtError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &[u8] = b"unit-test-secret";

    fn test_user() -> User {
        User {
            id: 1,
            uuid: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip_carries_user_uuid() {
        let user = test_user();
        let token = new_access_token(&user, SECRET).unwrap();
        let claims = validate_token(&token, SECRET, USER_ACCESS).unwrap();
        assert_eq!(claims.sub, user.uuid.to_string());
        assert_eq!(claims.aud, USER_ACCESS);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = new_access_token(&test_user(), SECRET).unwrap();
        assert!(validate_token(&token, b"another-secret", USER_ACCESS).is_err());
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let token = new_access_token(&test_user(), SECRET).unwrap();
        assert!(validate_token(&token, SECRET, "refresh").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issued = Utc::now() - Duration::hours(48);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            aud: USER_ACCESS.to_string(),
            exp: (issued + Duration::hours(1)).timestamp(),
            iat: issued.timestamp(),
        };
        let token = encode_claims(&claims, SECRET).unwrap();
        assert!(validate_token(&token, SECRET, USER_ACCESS).is_err());
    }
}
