/// Database row types that differ from the API-facing models.
/// Reservations and holidays map 1:1 onto `chairside-types` models and are
/// returned directly; the user row carries the password hash, which the
/// API model deliberately omits.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}
