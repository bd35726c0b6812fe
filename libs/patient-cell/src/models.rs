use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub billing_classification: BillingClassification,
    pub payment_terms: PaymentTerms,
    pub assigned_clinician: Option<String>,
    pub session_allowance: Option<SessionAllowance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a patient is charged for completed sessions. Wire values outside the
/// known set deserialize as `Unclassified`, which bills at the standard rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingClassification {
    Vip,
    Paid,
    Dyes,
    Gethhma,
    #[serde(other)]
    Unclassified,
}

impl std::fmt::Display for BillingClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingClassification::Vip => write!(f, "vip"),
            BillingClassification::Paid => write!(f, "paid"),
            BillingClassification::Dyes => write!(f, "dyes"),
            BillingClassification::Gethhma => write!(f, "gethhma"),
            BillingClassification::Unclassified => write!(f, "unclassified"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    WithConcession,
    WithoutConcession,
}

impl Default for PaymentTerms {
    fn default() -> Self {
        PaymentTerms::WithoutConcession
    }
}

impl std::fmt::Display for PaymentTerms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentTerms::WithConcession => write!(f, "with_concession"),
            PaymentTerms::WithoutConcession => write!(f, "without_concession"),
        }
    }
}

/// Free-session grant and pending-charge bookkeeping. Only DYES patients
/// carry one; every other classification keeps this `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAllowance {
    pub free_sessions_total: u32,
    pub free_sessions_used: u32,
    pub pending_paid_sessions: u32,
    pub pending_charge_amount: Decimal,
}

impl SessionAllowance {
    pub fn remaining_free(&self) -> u32 {
        self.free_sessions_total.saturating_sub(self.free_sessions_used)
    }
}

impl Default for SessionAllowance {
    fn default() -> Self {
        Self {
            free_sessions_total: 0,
            free_sessions_used: 0,
            pending_paid_sessions: 0,
            pending_charge_amount: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub full_name: String,
    pub email: String,
    pub billing_classification: BillingClassification,
    #[serde(default)]
    pub payment_terms: PaymentTerms,
    pub assigned_clinician: Option<String>,
    /// Free sessions granted at intake. Only meaningful for DYES patients.
    pub free_sessions_total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub billing_classification: Option<BillingClassification>,
    pub payment_terms: Option<PaymentTerms>,
    pub assigned_clinician: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub classification: Option<BillingClassification>,
    pub assigned_clinician: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
