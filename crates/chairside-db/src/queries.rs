use crate::Database;
use crate::models::UserRow;
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::warn;

use chairside_types::api::CreateHolidayRequest;
use chairside_types::events::SaveReservation;
use chairside_types::models::{Holiday, HolidayType, Reservation, Role, User};

impl Database {
    // -- Reservations --

    /// Inserts a new reservation and returns its id. The UNIQUE index on
    /// (date, time_min, column_index) surfaces as a constraint violation
    /// when the slot is already taken; see `is_unique_violation`.
    pub fn insert_reservation(&self, res: &SaveReservation, now: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reservations
                     (date, time_min, column_index, patient_name, handwriting, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    res.date,
                    res.time_min,
                    res.column_index,
                    res.patient_name,
                    res.handwriting,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Rewrites a reservation in place. Returns the affected row count —
    /// 0 means "not found", never an implicit create.
    pub fn update_reservation(&self, id: i64, res: &SaveReservation, now: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE reservations
                 SET date = ?1, time_min = ?2, column_index = ?3,
                     patient_name = ?4, handwriting = ?5, updated_at = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    res.date,
                    res.time_min,
                    res.column_index,
                    res.patient_name,
                    res.handwriting,
                    now,
                    id,
                ],
            )?;
            Ok(affected)
        })
    }

    pub fn delete_reservation(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM reservations WHERE id = ?1", [id])?;
            Ok(affected)
        })
    }

    pub fn find_reservation(&self, id: i64) -> Result<Option<Reservation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, time_min, column_index, patient_name, handwriting,
                        created_at, updated_at
                 FROM reservations WHERE id = ?1",
            )?;
            stmt.query_row([id], map_reservation).optional()
        })
    }

    /// All reservations for a date, ordered by time_min ascending. The
    /// broadcaster relies on this exact ordering being stable.
    pub fn reservations_for_date(&self, date: &str) -> Result<Vec<Reservation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, time_min, column_index, patient_name, handwriting,
                        created_at, updated_at
                 FROM reservations
                 WHERE date = ?1
                 ORDER BY time_min, column_index",
            )?;
            let rows = stmt
                .query_map([date], map_reservation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The reservation occupying a slot, if any. `exclude_id` skips a
    /// record's own row when re-validating a move.
    pub fn find_conflict(
        &self,
        date: &str,
        time_min: i64,
        column_index: i64,
        exclude_id: Option<i64>,
    ) -> Result<Option<Reservation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, time_min, column_index, patient_name, handwriting,
                        created_at, updated_at
                 FROM reservations
                 WHERE date = ?1 AND time_min = ?2 AND column_index = ?3
                   AND (?4 IS NULL OR id != ?4)",
            )?;
            stmt.query_row(
                rusqlite::params![date, time_min, column_index, exclude_id],
                map_reservation,
            )
            .optional()
        })
    }

    // -- Holidays --

    pub fn insert_holiday(&self, req: &CreateHolidayRequest) -> Result<Holiday> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO holidays (type, date, day_of_week, name) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![req.kind.as_str(), req.date, req.day_of_week, req.name],
            )?;
            let id = conn.last_insert_rowid();
            let mut stmt = conn.prepare(
                "SELECT id, type, date, day_of_week, name FROM holidays WHERE id = ?1",
            )?;
            let holiday = stmt.query_row([id], map_holiday)?;
            Ok(holiday)
        })
    }

    pub fn list_holidays(&self) -> Result<Vec<Holiday>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, type, date, day_of_week, name FROM holidays ORDER BY id")?;
            let rows = stmt
                .query_map([], map_holiday)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_holiday(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM holidays WHERE id = ?1", [id])?;
            Ok(affected)
        })
    }

    // -- Users --

    pub fn insert_user(&self, username: &str, password_hash: &str, role: Role) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, password_hash, role.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, username, role FROM users ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .map(|(id, username, role)| User {
                    id,
                    username,
                    role: parse_role(id, &role),
                })
                .collect())
        })
    }

    pub fn delete_user(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(affected)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}

fn map_reservation(row: &Row) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: row.get(0)?,
        date: row.get(1)?,
        time_min: row.get(2)?,
        column_index: row.get(3)?,
        patient_name: row.get(4)?,
        handwriting: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_holiday(row: &Row) -> rusqlite::Result<Holiday> {
    let kind: String = row.get(1)?;
    Ok(Holiday {
        id: row.get(0)?,
        kind: HolidayType::parse(&kind).unwrap_or(HolidayType::SpecificDate),
        date: row.get(2)?,
        day_of_week: row.get(3)?,
        name: row.get(4)?,
    })
}

fn parse_role(user_id: i64, role: &str) -> Role {
    Role::parse(role).unwrap_or_else(|| {
        warn!("Unknown role '{}' on user {}, treating as staff", role, user_id);
        Role::Staff
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password_hash, role FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                role: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, is_unique_violation};
    use chairside_types::events::SaveReservation;
    use chairside_types::models::Role;

    fn save(date: &str, time_min: i64, column_index: i64, name: &str) -> SaveReservation {
        SaveReservation {
            id: None,
            date: date.into(),
            time_min,
            column_index,
            patient_name: Some(name.into()),
            handwriting: None,
        }
    }

    #[test]
    fn insert_and_fetch_ordered_by_time() {
        let db = Database::open_in_memory().unwrap();
        let now = "2025-07-16T09:00:00+00:00";

        db.insert_reservation(&save("2025-07-16", 720, 1, "late"), now).unwrap();
        db.insert_reservation(&save("2025-07-16", 600, 2, "early"), now).unwrap();
        db.insert_reservation(&save("2025-07-17", 600, 2, "other day"), now).unwrap();

        let rows = db.reservations_for_date("2025-07-16").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time_min, 600);
        assert_eq!(rows[1].time_min, 720);
    }

    #[test]
    fn duplicate_slot_hits_unique_constraint() {
        let db = Database::open_in_memory().unwrap();
        let now = "2025-07-16T09:00:00+00:00";

        db.insert_reservation(&save("2025-07-16", 600, 2, "Taro"), now).unwrap();
        let err = db
            .insert_reservation(&save("2025-07-16", 600, 2, "Hanako"), now)
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn find_conflict_respects_exclude_id() {
        let db = Database::open_in_memory().unwrap();
        let now = "2025-07-16T09:00:00+00:00";

        let id = db.insert_reservation(&save("2025-07-16", 600, 2, "Taro"), now).unwrap();

        let hit = db.find_conflict("2025-07-16", 600, 2, None).unwrap();
        assert_eq!(hit.map(|r| r.id), Some(id));

        // A record never conflicts with itself.
        assert!(db.find_conflict("2025-07-16", 600, 2, Some(id)).unwrap().is_none());
        // But another record in the same slot still does.
        assert!(db.find_conflict("2025-07-16", 600, 2, Some(id + 1)).unwrap().is_some());
    }

    #[test]
    fn update_missing_row_affects_nothing() {
        let db = Database::open_in_memory().unwrap();
        let now = "2025-07-16T09:00:00+00:00";

        let affected = db.update_reservation(999, &save("2025-07-16", 600, 2, "x"), now).unwrap();
        assert_eq!(affected, 0);
        assert!(db.reservations_for_date("2025-07-16").unwrap().is_empty());
    }

    #[test]
    fn delete_returns_affected_count() {
        let db = Database::open_in_memory().unwrap();
        let now = "2025-07-16T09:00:00+00:00";

        let id = db.insert_reservation(&save("2025-07-16", 600, 2, "Taro"), now).unwrap();
        assert_eq!(db.delete_reservation(id).unwrap(), 1);
        assert_eq!(db.delete_reservation(id).unwrap(), 0);
    }

    #[test]
    fn user_roundtrip_without_hash_leak() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user("alice", "$argon2id$fake", Role::Admin).unwrap();

        let row = db.user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.password_hash, "$argon2id$fake");

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(db.count_users().unwrap(), 1);
    }
}
