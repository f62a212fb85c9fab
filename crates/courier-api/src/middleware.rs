use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use courier_db::models::MessageDetailRow;
use courier_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header, then make
/// the claims available to handlers as a request extension. The secret
/// comes from the shared state, never from ambient globals.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(&state.jwt_secret, token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::InvalidToken)
}

/// A user's routes are theirs alone.
pub fn ensure_correct_user(route_username: &str, token_username: &str) -> Result<(), ApiError> {
    if route_username == token_username {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Only the sender or the recipient may see a message.
pub fn ensure_message_party(message: &MessageDetailRow, username: &str) -> Result<(), ApiError> {
    if message.from.username == username || message.to.username == username {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_db::models::ProfileRow;

    fn profile(username: &str) -> ProfileRow {
        ProfileRow {
            username: username.to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            phone: "555-0000".to_string(),
        }
    }

    fn message(from: &str, to: &str) -> MessageDetailRow {
        MessageDetailRow {
            id: "m1".to_string(),
            body: "hi".to_string(),
            sent_at: "2026-08-01T10:00:00+00:00".to_string(),
            read_at: None,
            from: profile(from),
            to: profile(to),
        }
    }

    #[test]
    fn token_roundtrip_recovers_the_username() {
        let token = crate::auth::create_token("secret", "alice").unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn token_signed_with_another_secret_is_invalid() {
        let token = crate::auth::create_token("secret", "alice").unwrap();
        let err = verify_token("other-secret", &token).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[test]
    fn garbage_tokens_are_invalid() {
        let err = verify_token("secret", "not.a.jwt").unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[test]
    fn correct_user_check() {
        assert!(ensure_correct_user("alice", "alice").is_ok());
        let err = ensure_correct_user("alice", "bob").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn message_party_check() {
        let msg = message("alice", "bob");
        assert!(ensure_message_party(&msg, "alice").is_ok());
        assert!(ensure_message_party(&msg, "bob").is_ok());
        let err = ensure_message_party(&msg, "mallory").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }
}
