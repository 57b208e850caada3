use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::error;

use chairside_types::api::AuthUser;
use chairside_types::models::Role;

use crate::AppState;

/// Resolve HTTP Basic credentials against the users table and attach the
/// authenticated caller as an `AuthUser` extension. Everything behind this
/// layer receives an already-authorized caller and role.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(credentials) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic)
    else {
        return unauthorized();
    };
    let (username, password) = credentials;

    let db = state.db.clone();
    let lookup_name = username.clone();
    let row = match tokio::task::spawn_blocking(move || db.user_by_username(&lookup_name)).await {
        Ok(Ok(row)) => row,
        Ok(Err(e)) => {
            error!("User lookup failed for {}: {:#}", username, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(row) = row else {
        return unauthorized();
    };

    if !verify_password(&password, &row.password_hash) {
        return unauthorized();
    }

    let user = AuthUser {
        id: row.id,
        username: row.username,
        role: Role::parse(&row.role).unwrap_or(Role::Staff),
    };
    req.extensions_mut().insert(user);
    next.run(req).await
}

fn parse_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = B64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Chairside\"")],
        "Authentication required.",
    )
        .into_response()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_credentials() {
        // "alice:s3cret"
        let parsed = parse_basic("Basic YWxpY2U6czNjcmV0").unwrap();
        assert_eq!(parsed, ("alice".to_string(), "s3cret".to_string()));

        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic not-base64!!").is_none());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
