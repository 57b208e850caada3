use serde::{Deserialize, Serialize};

/// A booked slot on the day grid. The triple (date, time_min, column_index)
/// is unique among all reservations — one chair, one time, one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    /// Calendar day, 'YYYY-MM-DD'.
    pub date: String,
    /// Minutes since midnight, aligned to the slot interval.
    pub time_min: i64,
    /// 0-based chair column.
    pub column_index: i64,
    pub patient_name: Option<String>,
    /// Opaque filename of a handwritten-note PNG, if one is attached.
    pub handwriting: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayType {
    SpecificDate,
    RecurringDay,
}

impl HolidayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpecificDate => "SPECIFIC_DATE",
            Self::RecurringDay => "RECURRING_DAY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SPECIFIC_DATE" => Some(Self::SpecificDate),
            "RECURRING_DAY" => Some(Self::RecurringDay),
            _ => None,
        }
    }
}

/// A rule that suppresses bookable slots on the grid: either a one-off
/// date or a weekly recurring closing day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: HolidayType,
    /// Populated iff kind is SpecificDate, 'YYYY-MM-DD'.
    pub date: Option<String>,
    /// Populated iff kind is RecurringDay, 0 (Sunday) through 6.
    pub day_of_week: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }
}

/// A staff account as exposed over the API — never carries the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
}
