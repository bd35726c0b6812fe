use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use patient_cell::services::PatientService;
use staff_cell::services::staff::StaffService;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, CompletionBilling,
    ConflictCheck, ConflictCheckRequest, CreateAppointmentRequest, UpdateStatusRequest,
};
use crate::services::billing_flow::BillingFlowService;
use crate::services::conflict::ConflictDetector;
use crate::services::lifecycle::AppointmentLifecycle;

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    patients: PatientService,
    staff: StaffService,
    detector: ConflictDetector,
    lifecycle: AppointmentLifecycle,
    billing_flow: BillingFlowService,
    tolerance_minutes: i64,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            staff: StaffService::new(config),
            detector: ConflictDetector::new(),
            lifecycle: AppointmentLifecycle::new(),
            billing_flow: BillingFlowService::new(config),
            tolerance_minutes: config.conflict_tolerance_minutes,
        }
    }

    /// Books an appointment after a soft conflict screen. A detected
    /// conflict is returned to the operator unless the request carries the
    /// override flag.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking {} with {} on {} at {}",
            request.patient_id, request.staff_name, request.visit_date, request.visit_time
        );

        NaiveTime::parse_from_str(&request.visit_time, "%H:%M").map_err(|_| {
            AppointmentError::ValidationError(format!(
                "Invalid visit time '{}'",
                request.visit_time
            ))
        })?;

        self.patients
            .get_patient(&request.patient_id.to_string(), auth_token)
            .await
            .map_err(|_| AppointmentError::PatientNotFound)?;

        let staff = self
            .staff
            .get_staff_by_name(&request.staff_name, auth_token)
            .await
            .map_err(|_| AppointmentError::StaffNotFound)?;
        if !staff.is_active {
            return Err(AppointmentError::ValidationError(format!(
                "Staff member '{}' is inactive",
                request.staff_name
            )));
        }

        let existing = self
            .get_staff_day_appointments(&request.staff_name, request.visit_date, auth_token)
            .await?;
        let check = self.detector.check(
            &existing,
            &request.staff_name,
            request.visit_date,
            &request.visit_time,
            self.tolerance_minutes,
        )?;

        if check.has_conflict {
            if !request.override_conflicts {
                return Err(AppointmentError::ConflictDetected {
                    conflicts: check.conflicts,
                });
            }
            info!(
                "Operator override: booking despite {} conflict(s)",
                check.conflicts.len()
            );
        }

        let appointment_data = json!({
            "patient_id": request.patient_id,
            "staff_name": request.staff_name,
            "visit_date": request.visit_date,
            "visit_time": request.visit_time,
            "status": AppointmentStatus::Pending,
            "billing": Value::Null,
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError(
                "Failed to create appointment".to_string(),
            ));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        info!("Appointment created with ID: {}", appointment.id);

        Ok(appointment)
    }

    /// Advisory conflict screen for the booking UI, without creating
    /// anything.
    pub async fn check_conflicts(
        &self,
        request: ConflictCheckRequest,
        auth_token: &str,
    ) -> Result<ConflictCheck, AppointmentError> {
        let existing = self
            .get_staff_day_appointments(&request.staff_name, request.visit_date, auth_token)
            .await?;

        self.detector.check(
            &existing,
            &request.staff_name,
            request.visit_date,
            &request.visit_time,
            request.tolerance_minutes.unwrap_or(self.tolerance_minutes),
        )
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![];

        if let Some(staff_name) = query.staff_name {
            query_parts.push(format!(
                "staff_name=eq.{}",
                urlencoding::encode(&staff_name)
            ));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(visit_date) = query.visit_date {
            query_parts.push(format!("visit_date=eq.{}", visit_date));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let filters = if query_parts.is_empty() {
            String::new()
        } else {
            format!("{}&", query_parts.join("&"))
        };
        let path = format!(
            "/rest/v1/appointments?{}order=visit_date.asc,visit_time.asc&limit={}&offset={}",
            filters,
            query.limit.unwrap_or(50),
            query.offset.unwrap_or(0)
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    /// Moves an appointment through the status machine. Completion runs
    /// the billing flow once, before the status write, so an appointment
    /// is never marked completed with its side effects half-applied.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<(Appointment, Option<CompletionBilling>), AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        self.lifecycle
            .validate_status_transition(appointment.status, request.status)?;

        let billing_outcome = if request.status == AppointmentStatus::Completed {
            Some(
                self.billing_flow
                    .process_completion(&appointment, auth_token)
                    .await?,
            )
        } else {
            None
        };

        let update_data = json!({
            "status": request.status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
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
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        let updated: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        info!(
            "Appointment {} moved to {}",
            updated.id, updated.status
        );

        Ok((updated, billing_outcome))
    }

    /// Cancellation does not reverse allowance or billing history.
    pub async fn cancel_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let (appointment, _) = self
            .update_status(
                appointment_id,
                UpdateStatusRequest {
                    status: AppointmentStatus::Cancelled,
                },
                auth_token,
            )
            .await?;
        Ok(appointment)
    }

    async fn get_staff_day_appointments(
        &self,
        staff_name: &str,
        visit_date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?staff_name=eq.{}&visit_date=eq.{}&status=neq.cancelled",
            urlencoding::encode(staff_name),
            visit_date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
            })
            .collect()
    }
}
