use std::sync::Arc;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, PatientError, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

fn map_patient_error(error: PatientError) -> AppError {
    match error {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::EmailAlreadyExists { email } => {
            AppError::Conflict(format!("Patient with email {} already exists", email))
        }
        PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        PatientError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn require_desk_role(user: &User) -> Result<(), AppError> {
    match user.role.as_deref() {
        Some("admin") | Some("front_desk") => Ok(()),
        _ => Err(AppError::Auth(
            "Not authorized to manage patient records".to_string(),
        )),
    }
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_desk_role(&user)?;

    let service = PatientService::new(&config);

    let patient = service
        .create_patient(request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service
        .get_patient(&patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_desk_role(&user)?;

    let service = PatientService::new(&config);

    let patient = service
        .update_patient(&patient_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patients = service
        .search_patients(query, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}
