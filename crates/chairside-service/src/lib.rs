pub mod error;
pub mod storage;

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use tokio::task;
use tracing::debug;

use chairside_db::{Database, is_unique_violation};
use chairside_types::events::SaveReservation;
use chairside_types::models::Reservation;

pub use error::ServiceError;
pub use storage::HandwritingStore;

/// Grid geometry bounds used for command validation. Rendering itself is
/// a client concern; the service only rejects slots that cannot exist.
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    pub columns: i64,
    pub slot_interval_min: i64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 5,
            slot_interval_min: 5,
        }
    }
}

/// Single authoritative entry point for mutating reservation state.
/// Owns the conflict check-then-act sequence; the store's UNIQUE index
/// remains the final arbiter under concurrent saves, and a constraint
/// violation is mapped to the same Conflict outcome as the pre-check.
pub struct ReservationService {
    db: Arc<Database>,
    files: HandwritingStore,
    grid: GridConfig,
}

impl ReservationService {
    pub fn new(db: Arc<Database>, files: HandwritingStore, grid: GridConfig) -> Self {
        Self { db, files, grid }
    }

    pub fn files(&self) -> &HandwritingStore {
        &self.files
    }

    /// Create (no id) or update (with id) a reservation, returning the
    /// refreshed entity on success.
    pub async fn save(&self, cmd: SaveReservation) -> Result<Reservation, ServiceError> {
        self.validate(&cmd)?;

        let db = self.db.clone();
        run_blocking(move || save_blocking(&db, cmd)).await
    }

    /// Delete by id, returning the deleted entity. Any attached
    /// handwriting file is removed best-effort afterwards — file cleanup
    /// failure never fails the delete.
    pub async fn delete(&self, id: i64) -> Result<Reservation, ServiceError> {
        let db = self.db.clone();
        let deleted = run_blocking(move || delete_blocking(&db, id)).await?;

        if let Some(filename) = &deleted.handwriting {
            debug!("Removing handwriting file {} for deleted reservation {}", filename, id);
            self.files.remove(filename).await;
        }

        Ok(deleted)
    }

    /// All reservations for a date, ordered by time_min ascending.
    pub async fn list_for_date(&self, date: &str) -> Result<Vec<Reservation>, ServiceError> {
        let db = self.db.clone();
        let date = date.to_string();
        run_blocking(move || db.reservations_for_date(&date).map_err(ServiceError::from)).await
    }

    /// Rejects malformed commands before the store is touched.
    fn validate(&self, cmd: &SaveReservation) -> Result<(), ServiceError> {
        if NaiveDate::parse_from_str(&cmd.date, "%Y-%m-%d").is_err() {
            return Err(ServiceError::Validation(format!(
                "date must be YYYY-MM-DD, got '{}'",
                cmd.date
            )));
        }
        if !(0..24 * 60).contains(&cmd.time_min) {
            return Err(ServiceError::Validation(format!(
                "time_min must be within 0..1440, got {}",
                cmd.time_min
            )));
        }
        if cmd.time_min % self.grid.slot_interval_min != 0 {
            return Err(ServiceError::Validation(format!(
                "time_min must be a multiple of {}, got {}",
                self.grid.slot_interval_min, cmd.time_min
            )));
        }
        if !(0..self.grid.columns).contains(&cmd.column_index) {
            return Err(ServiceError::Validation(format!(
                "column_index must be within 0..{}, got {}",
                self.grid.columns, cmd.column_index
            )));
        }
        let has_name = cmd.patient_name.as_deref().is_some_and(|s| !s.trim().is_empty());
        let has_note = cmd.handwriting.as_deref().is_some_and(|s| !s.is_empty());
        if !has_name && !has_note {
            return Err(ServiceError::Validation(
                "either patient_name or handwriting is required".into(),
            ));
        }
        Ok(())
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Database(anyhow!("blocking task join error: {}", e)))?
}

fn save_blocking(db: &Database, cmd: SaveReservation) -> Result<Reservation, ServiceError> {
    let now = Utc::now().to_rfc3339();

    match cmd.id {
        None => {
            if let Some(existing) =
                db.find_conflict(&cmd.date, cmd.time_min, cmd.column_index, None)?
            {
                return Err(ServiceError::Conflict {
                    existing: Some(existing),
                });
            }

            let id = match db.insert_reservation(&cmd, &now) {
                Ok(id) => id,
                Err(e) if is_unique_violation(&e) => {
                    // Lost the race to another save; report it like the
                    // pre-check would have.
                    return Err(conflict_from_race(db, &cmd, None));
                }
                Err(e) => return Err(e.into()),
            };

            db.find_reservation(id)?
                .ok_or_else(|| ServiceError::Database(anyhow!("reservation {} missing after insert", id)))
        }

        Some(id) => {
            let current = db
                .find_reservation(id)?
                .ok_or(ServiceError::NotFound { id })?;

            let moved = cmd.date != current.date
                || cmd.time_min != current.time_min
                || cmd.column_index != current.column_index;

            if moved {
                if let Some(existing) =
                    db.find_conflict(&cmd.date, cmd.time_min, cmd.column_index, Some(id))?
                {
                    return Err(ServiceError::Conflict {
                        existing: Some(existing),
                    });
                }
            }

            let affected = match db.update_reservation(id, &cmd, &now) {
                Ok(n) => n,
                Err(e) if is_unique_violation(&e) => {
                    return Err(conflict_from_race(db, &cmd, Some(id)));
                }
                Err(e) => return Err(e.into()),
            };
            if affected == 0 {
                return Err(ServiceError::NotFound { id });
            }

            db.find_reservation(id)?
                .ok_or_else(|| ServiceError::Database(anyhow!("reservation {} missing after update", id)))
        }
    }
}

/// Re-query the occupying row after a storage-level constraint violation
/// so the Conflict payload matches the pre-check path.
fn conflict_from_race(db: &Database, cmd: &SaveReservation, exclude: Option<i64>) -> ServiceError {
    let existing = db
        .find_conflict(&cmd.date, cmd.time_min, cmd.column_index, exclude)
        .unwrap_or(None);
    ServiceError::Conflict { existing }
}

fn delete_blocking(db: &Database, id: i64) -> Result<Reservation, ServiceError> {
    let doomed = db
        .find_reservation(id)?
        .ok_or(ServiceError::NotFound { id })?;

    // A concurrent delete winning the race is still "not found".
    if db.delete_reservation(id)? == 0 {
        return Err(ServiceError::NotFound { id });
    }

    Ok(doomed)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_service() -> (ReservationService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let files = HandwritingStore::new(dir.path().to_path_buf()).await.unwrap();
        let service = ReservationService::new(db, files, GridConfig::default());
        (service, dir)
    }

    fn taro() -> SaveReservation {
        SaveReservation {
            id: None,
            date: "2025-07-16".into(),
            time_min: 600,
            column_index: 2,
            patient_name: Some("Taro".into()),
            handwriting: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let (service, _dir) = test_service().await;
        let saved = service.save(taro()).await.unwrap();
        assert!(saved.id > 0);
        assert_eq!(saved.time_min, 600);
        assert!(!saved.created_at.is_empty());
        assert_eq!(saved.created_at, saved.updated_at);
    }

    #[tokio::test]
    async fn second_create_into_same_slot_conflicts() {
        let (service, _dir) = test_service().await;
        let original = service.save(taro()).await.unwrap();

        let mut second = taro();
        second.patient_name = Some("Hanako".into());
        match service.save(second).await {
            Err(ServiceError::Conflict { existing }) => {
                assert_eq!(existing.unwrap().id, original.id);
            }
            other => panic!("expected conflict, got {:?}", other.map(|r| r.id)),
        }

        // Store unchanged: still exactly the original record.
        let list = service.list_for_date("2025-07-16").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].patient_name.as_deref(), Some("Taro"));
    }

    #[tokio::test]
    async fn update_onto_own_slot_never_conflicts() {
        let (service, _dir) = test_service().await;
        let saved = service.save(taro()).await.unwrap();

        let mut renamed = taro();
        renamed.id = Some(saved.id);
        renamed.patient_name = Some("Taro Yamada".into());
        let updated = service.save(renamed).await.unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.patient_name.as_deref(), Some("Taro Yamada"));
    }

    #[tokio::test]
    async fn moving_into_occupied_slot_conflicts() {
        let (service, _dir) = test_service().await;
        let blocker = service.save(taro()).await.unwrap();

        let mut other = taro();
        other.time_min = 700;
        let other = service.save(other).await.unwrap();

        let mut moved = taro();
        moved.id = Some(other.id);
        match service.save(moved).await {
            Err(ServiceError::Conflict { existing }) => {
                assert_eq!(existing.unwrap().id, blocker.id);
            }
            other => panic!("expected conflict, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn update_missing_id_is_not_found() {
        let (service, _dir) = test_service().await;
        let mut cmd = taro();
        cmd.id = Some(424242);
        match service.save(cmd).await {
            Err(ServiceError::NotFound { id }) => assert_eq!(id, 424242),
            other => panic!("expected not found, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let (service, _dir) = test_service().await;
        match service.delete(9).await {
            Err(ServiceError::NotFound { id }) => assert_eq!(id, 9),
            other => panic!("expected not found, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn delete_removes_attached_handwriting_file() {
        let (service, _dir) = test_service().await;
        let filename = service.files().store(b"png bytes").await.unwrap();

        let mut cmd = taro();
        cmd.patient_name = None;
        cmd.handwriting = Some(filename.clone());
        let saved = service.save(cmd).await.unwrap();

        service.delete(saved.id).await.unwrap();
        assert!(service.list_for_date("2025-07-16").await.unwrap().is_empty());
        assert!(!service.files().file_path(&filename).exists());
    }

    #[tokio::test]
    async fn validation_rejects_before_store() {
        let (service, _dir) = test_service().await;

        let mut bad_date = taro();
        bad_date.date = "16/07/2025".into();
        assert!(matches!(service.save(bad_date).await, Err(ServiceError::Validation(_))));

        let mut unaligned = taro();
        unaligned.time_min = 603;
        assert!(matches!(service.save(unaligned).await, Err(ServiceError::Validation(_))));

        let mut out_of_grid = taro();
        out_of_grid.column_index = 5;
        assert!(matches!(service.save(out_of_grid).await, Err(ServiceError::Validation(_))));

        let mut empty = taro();
        empty.patient_name = Some("   ".into());
        assert!(matches!(service.save(empty).await, Err(ServiceError::Validation(_))));

        assert!(service.list_for_date("2025-07-16").await.unwrap().is_empty());
    }
}
