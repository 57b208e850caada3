use serde::{Deserialize, Serialize};

use crate::models::Reservation;

/// A save command — create when `id` is absent, in-place update when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReservation {
    #[serde(default)]
    pub id: Option<i64>,
    pub date: String,
    pub time_min: i64,
    pub column_index: i64,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub handwriting: Option<String>,
}

/// Commands sent FROM client TO server over the WebSocket gateway.
/// Wire names are case-sensitive kebab-case, e.g. `save-reservation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Enter the date room for `date`, leaving any previous room.
    JoinDateRoom { date: String },

    /// Leave the date room for `date`. A no-op if not a member.
    LeaveDateRoom { date: String },

    /// Private read — the reservation list is sent back to the caller only.
    FetchReservations { date: String },

    /// Create or update a reservation. On success the full list for the
    /// affected date is broadcast to that date's room.
    SaveReservation(SaveReservation),

    /// Delete a reservation by id. Broadcasts like a save on success.
    DeleteReservation { id: i64 },
}

/// Structured error reply, always scoped to the invoking connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    /// The occupying booking when the error is a slot conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_reservation: Option<Reservation>,
}

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The authoritative, full reservation list for a date, ordered by
    /// time_min. Clients replace their local set with this — no merging.
    ReservationsUpdated(Vec<Reservation>),

    /// Error reply to the caller. Never broadcast.
    Error(ErrorPayload),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_names_are_kebab_case() {
        let cmd = ClientCommand::SaveReservation(SaveReservation {
            id: None,
            date: "2025-07-16".into(),
            time_min: 600,
            column_index: 2,
            patient_name: Some("Taro".into()),
            handwriting: None,
        });
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "save-reservation");
        assert_eq!(json["data"]["time_min"], 600);

        let cmd = ClientCommand::JoinDateRoom { date: "2025-07-16".into() };
        assert_eq!(serde_json::to_value(&cmd).unwrap()["type"], "join-date-room");
    }

    #[test]
    fn parses_delete_command() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"delete-reservation","data":{"id":7}}"#).unwrap();
        match cmd {
            ClientCommand::DeleteReservation { id } => assert_eq!(id, 7),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn error_payload_omits_absent_conflict() {
        let event = ServerEvent::Error(ErrorPayload {
            code: "NOT_FOUND".into(),
            message: "Reservation 9 not found".into(),
            conflicting_reservation: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert!(json["data"].get("conflicting_reservation").is_none());
    }

    #[test]
    fn reservations_updated_wire_shape() {
        let event = ServerEvent::ReservationsUpdated(vec![]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reservations-updated");
        assert!(json["data"].as_array().unwrap().is_empty());
    }
}
