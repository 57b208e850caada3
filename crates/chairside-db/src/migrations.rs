use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'staff'
        );

        CREATE TABLE IF NOT EXISTS reservations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            date            TEXT NOT NULL,
            time_min        INTEGER NOT NULL,
            column_index    INTEGER NOT NULL,
            patient_name    TEXT,
            handwriting     TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE(date, time_min, column_index)
        );

        CREATE INDEX IF NOT EXISTS idx_reservations_date
            ON reservations(date, time_min);

        CREATE TABLE IF NOT EXISTS holidays (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            type            TEXT NOT NULL,
            date            TEXT,
            day_of_week     INTEGER,
            name            TEXT
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
