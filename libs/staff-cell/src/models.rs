use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub display_name: String,
    pub role: StaffRole,
    pub is_active: bool,
    #[serde(default)]
    pub availability: HashMap<NaiveDate, DaySchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Clinical,
    FrontDesk,
    Admin,
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaffRole::Clinical => write!(f, "clinical"),
            StaffRole::FrontDesk => write!(f, "front_desk"),
            StaffRole::Admin => write!(f, "admin"),
        }
    }
}

/// Working hours for a single calendar date. A date with `enabled = false`
/// (or missing entirely) produces no bookable slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
}

/// A working-hours window in wall-clock "HH:MM" form. Kept as raw strings so
/// a malformed entry can be skipped at slot generation instead of poisoning
/// the whole schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStaffRequest {
    pub display_name: String,
    pub role: StaffRole,
    pub availability: Option<HashMap<NaiveDate, DaySchedule>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStaffRequest {
    pub display_name: Option<String>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertDayScheduleRequest {
    pub date: NaiveDate,
    pub enabled: bool,
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
}

/// Minimal appointment row fetched when excluding already-booked times.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedAppointment {
    pub visit_time: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StaffError {
    #[error("Staff member not found")]
    NotFound,

    #[error("Staff member '{0}' already exists")]
    DuplicateName(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
