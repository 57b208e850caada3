use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use chairside_db::is_unique_violation;
use chairside_types::api::{AuthUser, CreateUserRequest};
use chairside_types::models::Role;

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::hash_password;

fn ensure_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.role != Role::Admin {
        return Err(ApiError::forbidden());
    }
    Ok(())
}

/// GET /api/users (admin)
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&user)?;

    let db = state.db.clone();
    let users = tokio::task::spawn_blocking(move || db.list_users())
        .await
        .map_err(|e| ApiError::internal(&anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(|e| ApiError::internal(&e))?;
    Ok(Json(users))
}

/// POST /api/users (admin)
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&user)?;

    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::bad_request("username must be 3-32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError::internal(&e))?;

    let db = state.db.clone();
    let username = req.username.clone();
    let role = req.role;
    let id = match tokio::task::spawn_blocking(move || db.insert_user(&username, &password_hash, role))
        .await
        .map_err(|e| ApiError::internal(&anyhow::anyhow!("spawn_blocking join error: {}", e)))?
    {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict(format!("username '{}' is taken", req.username)));
        }
        Err(e) => return Err(ApiError::internal(&e)),
    };

    Ok((
        StatusCode::CREATED,
        Json(chairside_types::models::User {
            id,
            username: req.username,
            role: req.role,
        }),
    ))
}

/// DELETE /api/users/{id} (admin)
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&user)?;

    if user.id == id {
        return Err(ApiError::bad_request("cannot delete the authenticated user"));
    }

    let db = state.db.clone();
    let affected = tokio::task::spawn_blocking(move || db.delete_user(id))
        .await
        .map_err(|e| ApiError::internal(&anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(|e| ApiError::internal(&e))?;

    if affected == 0 {
        return Err(ApiError::not_found(format!("User {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
