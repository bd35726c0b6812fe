use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use patient_cell::models::SessionAllowance;

/// A posted charge attached to an appointment. An appointment carries at
/// most one of these; its presence marks the appointment as billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub amount: Decimal,
    pub billing_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
    Active,
    Closed,
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStatus::Pending => write!(f, "pending"),
            CycleStatus::Active => write!(f, "active"),
            CycleStatus::Closed => write!(f, "closed"),
        }
    }
}

/// A calendar-month accounting window. At most one cycle is `active` at a
/// time; consecutive cycles abut (each start is the day after the previous
/// end).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCycle {
    /// "YYYY-MM"
    pub id: String,
    pub year: i32,
    pub month: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CycleStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl BillingCycle {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Month boundaries computed from a date alone; no storage involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWindow {
    pub year: i32,
    pub month: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl CycleWindow {
    pub fn id(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Outcome of a cycle reset: the cycle that was closed (if one was active)
/// and the cycle that is now active.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReset {
    pub closed: Option<BillingCycle>,
    pub activated: BillingCycle,
}

/// Minimal appointment row fetched for cycle aggregation.
#[derive(Debug, Clone, Deserialize)]
pub struct CycleAppointment {
    pub staff_name: String,
    pub visit_date: NaiveDate,
    pub status: String,
    pub billing: Option<BillingRecord>,
}

impl CycleAppointment {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicianCollection {
    pub doctor: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    /// Completed appointments in the window still waiting for a charge.
    pub pending_count: usize,
    /// Billing records posted inside the window.
    pub completed_count: usize,
    pub collected_amount: Decimal,
    pub by_clinician: Vec<ClinicianCollection>,
}

/// Result of running one completed session through the allowance ledger.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerOutcome {
    pub allowance: SessionAllowance,
    pub was_free: bool,
    pub remaining_free_sessions: u32,
}

/// Whether a completed appointment should be charged, and for how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingDecision {
    pub should_bill: bool,
    pub amount: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Billing cycle not found")]
    CycleNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
