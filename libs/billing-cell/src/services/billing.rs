use chrono::{Local, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use patient_cell::models::SessionAllowance;

use crate::models::{
    BillingCycle, BillingError, CycleAppointment, CycleReset, CycleStatus, CycleSummary,
};
use crate::services::cycle;

pub struct BillingCycleService {
    supabase: SupabaseClient,
}

impl BillingCycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Returns the active cycle, materializing the current calendar-month
    /// window as a stored active cycle when none exists yet.
    pub async fn current_cycle(&self, auth_token: &str) -> Result<BillingCycle, BillingError> {
        if let Some(active) = self.get_active_cycle(auth_token).await? {
            return Ok(active);
        }

        let today = Local::now().date_naive();
        let window = cycle::current_window(today);
        info!("No active billing cycle stored, opening {}", window.id());

        let cycle = cycle::cycle_from_window(window, CycleStatus::Active, Utc::now());
        self.insert_cycle(&cycle, auth_token).await
    }

    /// Month-end operator action: close the active cycle and activate the
    /// next month's cycle.
    pub async fn reset_cycle(&self, auth_token: &str) -> Result<CycleReset, BillingError> {
        let today = Local::now().date_naive();
        let active = self.get_active_cycle(auth_token).await?;

        let follow_on_id = match &active {
            Some(cycle) => {
                let next_month_day = cycle
                    .end_date
                    .succ_opt()
                    .ok_or_else(|| BillingError::ValidationError("Cycle end overflow".to_string()))?;
                cycle::current_window(next_month_day).id()
            }
            None => cycle::next_window(today).id(),
        };
        let next_existing = self.get_cycle(&follow_on_id, auth_token).await?;

        let outcome = cycle::reset_cycle(active, next_existing.clone(), today, Utc::now());

        if let Some(closed) = &outcome.closed {
            self.patch_cycle(
                &closed.id,
                json!({
                    "status": closed.status,
                    "closed_at": closed.closed_at,
                }),
                auth_token,
            )
            .await?;
        }

        let activated = if next_existing.is_some() {
            self.patch_cycle(
                &outcome.activated.id,
                json!({ "status": outcome.activated.status }),
                auth_token,
            )
            .await?
        } else {
            self.insert_cycle(&outcome.activated, auth_token).await?
        };

        Ok(CycleReset {
            closed: outcome.closed,
            activated,
        })
    }

    /// Scans the full appointment set once and aggregates it over the
    /// stored cycle's window.
    pub async fn cycle_summary(
        &self,
        cycle_id: &str,
        auth_token: &str,
    ) -> Result<(BillingCycle, CycleSummary), BillingError> {
        let stored = self
            .get_cycle(cycle_id, auth_token)
            .await?
            .ok_or(BillingError::CycleNotFound)?;

        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/appointments?select=staff_name,visit_date,status,billing",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        let appointments: Vec<CycleAppointment> = result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| BillingError::DatabaseError(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        debug!(
            "Summarizing {} appointment rows for cycle {}",
            appointments.len(),
            stored.id
        );

        let summary = cycle::cycle_summary(&stored, &appointments);
        Ok((stored, summary))
    }

    /// Fetches a patient's allowance snapshot for operator inspection.
    pub async fn patient_allowance(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Option<SessionAllowance>, BillingError> {
        let path = format!(
            "/rest/v1/patients?id=eq.{}&select=session_allowance",
            patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BillingError::PatientNotFound);
        }

        let allowance = result[0]
            .get("session_allowance")
            .cloned()
            .unwrap_or(Value::Null);
        serde_json::from_value(allowance).map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    async fn get_active_cycle(
        &self,
        auth_token: &str,
    ) -> Result<Option<BillingCycle>, BillingError> {
        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/billing_cycles?status=eq.active",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| BillingError::DatabaseError(e.to_string()))
            })
            .transpose()
    }

    async fn get_cycle(
        &self,
        cycle_id: &str,
        auth_token: &str,
    ) -> Result<Option<BillingCycle>, BillingError> {
        let path = format!("/rest/v1/billing_cycles?id=eq.{}", cycle_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| BillingError::DatabaseError(e.to_string()))
            })
            .transpose()
    }

    async fn insert_cycle(
        &self,
        cycle: &BillingCycle,
        auth_token: &str,
    ) -> Result<BillingCycle, BillingError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/billing_cycles",
                Some(auth_token),
                Some(json!(cycle)),
                Some(headers),
            )
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BillingError::DatabaseError(
                "Failed to create billing cycle".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }

    async fn patch_cycle(
        &self,
        cycle_id: &str,
        update_data: Value,
        auth_token: &str,
    ) -> Result<BillingCycle, BillingError> {
        let path = format!("/rest/v1/billing_cycles?id=eq.{}", cycle_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BillingError::CycleNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BillingError::DatabaseError(e.to_string()))
    }
}
