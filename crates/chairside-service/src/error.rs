use thiserror::Error;

use chairside_types::events::ErrorPayload;
use chairside_types::models::Reservation;

/// Outcome of a reservation mutation. Conflict and NotFound are expected,
/// recoverable results reported back to the originating caller; Database
/// is surfaced generically and logged with full detail server-side.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// The slot is already occupied. Carries the occupying record when it
    /// could be loaded, for client-side diagnostics.
    #[error("time slot already occupied")]
    Conflict { existing: Option<Reservation> },

    #[error("reservation {id} not found")]
    NotFound { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// The structured error sent to the invoking connection. Database
    /// detail never leaves the server.
    pub fn client_payload(&self) -> ErrorPayload {
        let message = match self {
            Self::Database(_) => "An unexpected error occurred".to_string(),
            Self::Conflict { .. } => "Time slot already occupied".to_string(),
            other => other.to_string(),
        };
        let conflicting_reservation = match self {
            Self::Conflict { existing } => existing.clone(),
            _ => None,
        };
        ErrorPayload {
            code: self.code().to_string(),
            message,
            conflicting_reservation,
        }
    }
}
