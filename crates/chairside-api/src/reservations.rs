use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use chairside_types::api::ReservationQuery;
use chairside_types::events::SaveReservation;

use crate::AppState;
use crate::error::ApiError;

/// GET /api/reservations?date=YYYY-MM-DD
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ReservationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let reservations = state.service.list_for_date(&query.date).await?;
    Ok(Json(reservations))
}

/// POST /api/reservations — create, then broadcast to the date room so
/// REST writers and gateway clients stay in sync.
pub async fn create(
    State(state): State<AppState>,
    Json(mut cmd): Json<SaveReservation>,
) -> Result<impl IntoResponse, ApiError> {
    cmd.id = None;
    let saved = state.service.save(cmd).await?;
    state.broadcaster.publish_for_date(&saved.date).await;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// PUT /api/reservations/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut cmd): Json<SaveReservation>,
) -> Result<impl IntoResponse, ApiError> {
    cmd.id = Some(id);
    let saved = state.service.save(cmd).await?;
    state.broadcaster.publish_for_date(&saved.date).await;
    Ok(Json(saved))
}

/// DELETE /api/reservations/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.service.delete(id).await?;
    state.broadcaster.publish_for_date(&deleted.date).await;
    Ok(StatusCode::NO_CONTENT)
}
