use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use billing_cell::models::BillingRecord;

/// A booked visit. Staff are referenced by display name; the front desk
/// books against names, not identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub staff_name: String,
    pub visit_date: NaiveDate,
    /// Wall-clock "HH:MM".
    pub visit_time: String,
    pub status: AppointmentStatus,
    /// At most one charge per appointment; present means billed.
    pub billing: Option<BillingRecord>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Ongoing,
    Completed,
    Cancelled,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Ongoing => write!(f, "ongoing"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub staff_name: String,
    pub visit_date: NaiveDate,
    pub visit_time: String,
    pub notes: Option<String>,
    /// Operator confirmation to book despite detected conflicts.
    #[serde(default)]
    pub override_conflicts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckRequest {
    pub staff_name: String,
    pub visit_date: NaiveDate,
    pub visit_time: String,
    pub tolerance_minutes: Option<i64>,
}

/// Advisory result: the operator decides whether to proceed.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    pub conflicts: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub staff_name: Option<String>,
    pub patient_id: Option<Uuid>,
    pub visit_date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// What the completion transition decided, for operator display and
/// patient notification.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionBilling {
    pub was_free: bool,
    pub remaining_free_sessions: Option<u32>,
    pub pending_charge_amount: Option<Decimal>,
    pub billing: Option<BillingRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Staff member not found")]
    StaffNotFound,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Scheduling conflict with {} existing appointment(s)", .conflicts.len())]
    ConflictDetected { conflicts: Vec<Appointment> },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
