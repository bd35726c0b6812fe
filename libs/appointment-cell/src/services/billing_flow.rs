use chrono::{Local, Utc};
use reqwest::Method;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use billing_cell::models::BillingRecord;
use billing_cell::services::{BillingRuleEvaluator, SessionLedger};
use patient_cell::models::{BillingClassification, Patient, PatientError};
use patient_cell::services::PatientService;

use crate::models::{Appointment, AppointmentError, CompletionBilling};

/// Runs the billing side effects of one completion transition: session
/// allowance first, then the billing rule decision, then the billing
/// record write. Callers must invoke this at most once per appointment;
/// the lifecycle's terminal-completed rule is the outer guard and the
/// already-billed check here is the inner one.
pub struct BillingFlowService {
    supabase: SupabaseClient,
    patients: PatientService,
    ledger: SessionLedger,
    evaluator: BillingRuleEvaluator,
    standard_rate: Decimal,
}

impl BillingFlowService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            ledger: SessionLedger::new(),
            evaluator: BillingRuleEvaluator::new(),
            standard_rate: config.standard_session_rate,
        }
    }

    pub async fn process_completion(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<CompletionBilling, AppointmentError> {
        if let Some(existing) = &appointment.billing {
            warn!(
                "Appointment {} already carries a billing record, skipping billing flow",
                appointment.id
            );
            return Ok(CompletionBilling {
                was_free: false,
                remaining_free_sessions: None,
                pending_charge_amount: None,
                billing: Some(existing.clone()),
            });
        }

        let patient = self.get_patient(appointment, auth_token).await?;
        let classification = patient.billing_classification;

        let outcome = self.ledger.apply(
            patient.session_allowance.as_ref(),
            classification,
            self.standard_rate,
        );

        // Only DYES patients carry an allowance worth persisting.
        if classification == BillingClassification::Dyes {
            self.patients
                .update_session_allowance(
                    &appointment.patient_id.to_string(),
                    &outcome.allowance,
                    auth_token,
                )
                .await
                .map_err(map_patient_error)?;
            info!(
                "Allowance updated for patient {}: free={} remaining={} pending={}",
                appointment.patient_id,
                outcome.was_free,
                outcome.remaining_free_sessions,
                outcome.allowance.pending_charge_amount
            );
        }

        let prior_billed_count = self
            .count_billed_appointments(appointment, auth_token)
            .await?;

        let decision = self.evaluator.evaluate(
            classification,
            patient.payment_terms,
            prior_billed_count,
            self.standard_rate,
        );

        let billing = if decision.should_bill {
            let record = BillingRecord {
                amount: decision.amount,
                billing_date: Local::now().date_naive(),
            };
            self.attach_billing_record(appointment, &record, auth_token)
                .await?;
            info!(
                "Billed appointment {} at {} on {}",
                appointment.id, record.amount, record.billing_date
            );
            Some(record)
        } else {
            debug!(
                "No billing record for appointment {} ({} patient)",
                appointment.id, classification
            );
            None
        };

        let dyes = classification == BillingClassification::Dyes;
        Ok(CompletionBilling {
            was_free: outcome.was_free,
            remaining_free_sessions: dyes.then_some(outcome.remaining_free_sessions),
            pending_charge_amount: dyes.then_some(outcome.allowance.pending_charge_amount),
            billing,
        })
    }

    async fn get_patient(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Patient, AppointmentError> {
        self.patients
            .get_patient(&appointment.patient_id.to_string(), auth_token)
            .await
            .map_err(map_patient_error)
    }

    /// Lifetime count of this patient's billed appointments, fed to the
    /// DYES threshold rule.
    async fn count_billed_appointments(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<u32, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&billing=not.is.null&select=id",
            appointment.patient_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(result.len() as u32)
    }

    async fn attach_billing_record(
        &self,
        appointment: &Appointment,
        record: &BillingRecord,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let update_data = json!({
            "billing": record,
            "updated_at": Utc::now().to_rfc3339()
        });

        let _: Value = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(update_data))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

fn map_patient_error(error: PatientError) -> AppointmentError {
    match error {
        PatientError::NotFound => AppointmentError::PatientNotFound,
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}
