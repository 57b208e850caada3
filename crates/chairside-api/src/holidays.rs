use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use chairside_types::api::{AuthUser, CreateHolidayRequest};
use chairside_types::models::{HolidayType, Role};

use crate::AppState;
use crate::error::ApiError;

fn ensure_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.role != Role::Admin {
        return Err(ApiError::forbidden());
    }
    Ok(())
}

/// GET /api/holidays — readable by any authenticated role; the grid
/// consumes this to suppress bookable slots.
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let holidays = tokio::task::spawn_blocking(move || db.list_holidays())
        .await
        .map_err(|e| ApiError::internal(&anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(|e| ApiError::internal(&e))?;
    Ok(Json(holidays))
}

/// POST /api/holidays (admin)
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateHolidayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&user)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    match req.kind {
        HolidayType::SpecificDate => {
            if req.date.is_none() {
                return Err(ApiError::bad_request("date is required for specific date holidays"));
            }
            if req.day_of_week.is_some() {
                return Err(ApiError::bad_request("day_of_week is not allowed for specific date holidays"));
            }
        }
        HolidayType::RecurringDay => {
            match req.day_of_week {
                None => {
                    return Err(ApiError::bad_request("day_of_week is required for recurring day holidays"));
                }
                Some(day) if !(0..=6).contains(&day) => {
                    return Err(ApiError::bad_request("day_of_week must be 0-6"));
                }
                Some(_) => {}
            }
            if req.date.is_some() {
                return Err(ApiError::bad_request("date is not allowed for recurring day holidays"));
            }
        }
    }

    let db = state.db.clone();
    let holiday = tokio::task::spawn_blocking(move || db.insert_holiday(&req))
        .await
        .map_err(|e| ApiError::internal(&anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(|e| ApiError::internal(&e))?;

    Ok((StatusCode::CREATED, Json(holiday)))
}

/// DELETE /api/holidays/{id} (admin)
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&user)?;

    let db = state.db.clone();
    let affected = tokio::task::spawn_blocking(move || db.delete_holiday(id))
        .await
        .map_err(|e| ApiError::internal(&anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(|e| ApiError::internal(&e))?;

    if affected == 0 {
        return Err(ApiError::not_found(format!("Holiday {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
