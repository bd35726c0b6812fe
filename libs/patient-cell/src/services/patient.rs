use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BillingClassification, CreatePatientRequest, Patient, PatientError, PatientSearchQuery,
    SessionAllowance, UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating new patient record for: {}", request.email);

        if request.full_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "Full name must not be empty".to_string(),
            ));
        }

        let existing_check_path = format!(
            "/rest/v1/patients?email=eq.{}",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PatientError::EmailAlreadyExists {
                email: request.email,
            });
        }

        // Only DYES patients get a session allowance; the granted free-session
        // count is ignored for every other classification.
        let session_allowance = match request.billing_classification {
            BillingClassification::Dyes => Some(SessionAllowance {
                free_sessions_total: request.free_sessions_total.unwrap_or(0),
                ..SessionAllowance::default()
            }),
            _ => None,
        };

        let patient_data = json!({
            "full_name": request.full_name,
            "email": request.email,
            "billing_classification": request.billing_classification,
            "payment_terms": request.payment_terms,
            "assigned_clinician": request.assigned_clinician,
            "session_allowance": session_allowance,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(headers),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::DatabaseError(
                "Failed to create patient record".to_string(),
            ));
        }

        let patient: Patient = serde_json::from_value(result[0].clone())
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        debug!("Patient record created with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient record: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient record: {}", patient_id);

        let current = self.get_patient(patient_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(PatientError::ValidationError(
                    "Full name must not be empty".to_string(),
                ));
            }
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(classification) = request.billing_classification {
            update_data.insert("billing_classification".to_string(), json!(classification));

            // Reclassifying to DYES materializes an empty allowance so the
            // session ledger has a record to work against. Moving away from
            // DYES leaves accrued history in place.
            if classification == BillingClassification::Dyes
                && current.session_allowance.is_none()
            {
                update_data.insert(
                    "session_allowance".to_string(),
                    json!(SessionAllowance::default()),
                );
            }
        }
        if let Some(payment_terms) = request.payment_terms {
            update_data.insert("payment_terms".to_string(), json!(payment_terms));
        }
        if let Some(assigned_clinician) = request.assigned_clinician {
            update_data.insert("assigned_clinician".to_string(), json!(assigned_clinician));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_patient(patient_id, Value::Object(update_data), auth_token)
            .await
    }

    /// Persists a ledger-updated allowance snapshot for a patient.
    pub async fn update_session_allowance(
        &self,
        patient_id: &str,
        allowance: &SessionAllowance,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating session allowance for patient: {}", patient_id);

        let update_data = json!({
            "session_allowance": allowance,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_patient(patient_id, update_data, auth_token).await
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(name) = query.name {
            query_parts.push(format!(
                "full_name=ilike.{}",
                urlencoding::encode(&format!("%{}%", name))
            ));
        }
        if let Some(email) = query.email {
            query_parts.push(format!(
                "email=ilike.{}",
                urlencoding::encode(&format!("%{}%", email))
            ));
        }
        if let Some(classification) = query.classification {
            query_parts.push(format!("billing_classification=eq.{}", classification));
        }
        if let Some(assigned_clinician) = query.assigned_clinician {
            query_parts.push(format!(
                "assigned_clinician=eq.{}",
                urlencoding::encode(&assigned_clinician)
            ));
        }

        let query_string = if query_parts.is_empty() {
            String::new()
        } else {
            format!("?{}", query_parts.join("&"))
        };

        let limit = query.limit.unwrap_or(50);
        let offset = query.offset.unwrap_or(0);
        let separator = if query_string.is_empty() { "?" } else { "&" };
        let path = format!(
            "/rest/v1/patients{}{}limit={}&offset={}",
            query_string, separator, limit, offset
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    async fn patch_patient(
        &self,
        patient_id: &str,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

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
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}
