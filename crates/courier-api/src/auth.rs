use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};

use courier_db::Database;
use courier_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Username must be free
    if state.db.get_user(&req.username)?.is_some() {
        return Err(ApiError::DuplicateUser);
    }

    // Hash password with Argon2id; the raw value is never stored
    let password_hash = hash_password(&req.password)?;

    let now = Utc::now().to_rfc3339();
    state.db.create_user(
        &req.username,
        &password_hash,
        &req.first_name,
        &req.last_name,
        &req.phone,
        &now,
    )?;

    let token = create_token(&state.jwt_secret, &req.username)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !authenticate(&state.db, &req.username, &req.password)? {
        return Err(ApiError::InvalidCredentials);
    }

    if !state.db.touch_login(&req.username, &Utc::now().to_rfc3339())? {
        return Err(ApiError::NotFound(format!("No such user: {}", req.username)));
    }

    let token = create_token(&state.jwt_secret, &req.username)?;

    Ok(Json(TokenResponse { token }))
}

/// Is this username/password pair valid? Unknown usernames and wrong
/// passwords both come back as a plain false so callers cannot tell
/// which check failed. Only a store failure or a corrupt stored hash is
/// an error.
pub fn authenticate(db: &Database, username: &str, password: &str) -> Result<bool, ApiError> {
    let Some(user) = db.get_user(username)? else {
        return Ok(false);
    };

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow!("corrupt password hash for {username}: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

pub(crate) fn create_token(secret: &str, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        username: username.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
