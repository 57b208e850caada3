use serde::{Deserialize, Serialize};

use crate::models::{HolidayType, Role};

/// The already-authenticated caller, resolved by the Basic-auth middleware
/// before any request reaches the core. Canonical definition lives here so
/// both the REST layer and the gateway share one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

// -- Reservations --

#[derive(Debug, Deserialize)]
pub struct ReservationQuery {
    pub date: String,
}

// -- Holidays --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateHolidayRequest {
    #[serde(rename = "type")]
    pub kind: HolidayType,
    pub date: Option<String>,
    pub day_of_week: Option<i64>,
    pub name: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

// -- Handwriting upload --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadHandwritingResponse {
    pub filename: String,
    pub size: u64,
}
