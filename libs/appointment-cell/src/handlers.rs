use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentSearchQuery, ConflictCheckRequest, CreateAppointmentRequest,
    UpdateStatusRequest,
};
use crate::services::AppointmentBookingService;

fn map_appointment_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        AppointmentError::StaffNotFound => AppError::NotFound("Staff member not found".to_string()),
        AppointmentError::InvalidStatusTransition { from, to } => {
            AppError::BadRequest(format!("Invalid status transition: {} -> {}", from, to))
        }
        AppointmentError::ConflictDetected { conflicts } => AppError::Conflict(format!(
            "Scheduling conflict with {} existing appointment(s)",
            conflicts.len()
        )),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn require_desk_role(user: &User) -> Result<(), AppError> {
    match user.role.as_deref() {
        Some("admin") | Some("front_desk") => Ok(()),
        _ => Err(AppError::Auth(
            "Not authorized to manage appointments".to_string(),
        )),
    }
}

/// Booking returns the conflict list as a 409 payload so the operator can
/// review it and re-submit with the override flag.
#[axum::debug_handler]
pub async fn create_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Response, AppError> {
    require_desk_role(&user)?;

    let service = AppointmentBookingService::new(&config);

    match service.create_appointment(request, auth.token()).await {
        Ok(appointment) => Ok((StatusCode::CREATED, Json(json!(appointment))).into_response()),
        Err(AppointmentError::ConflictDetected { conflicts }) => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Scheduling conflict detected",
                "has_conflict": true,
                "conflicts": conflicts
            })),
        )
            .into_response()),
        Err(other) => Err(map_appointment_error(other)),
    }
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&config);

    let check = service
        .check_conflicts(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(check)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&config);

    let appointment = service
        .get_appointment(&appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&config);

    let appointments = service
        .search_appointments(query, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_desk_role(&user)?;

    let service = AppointmentBookingService::new(&config);

    let (appointment, billing) = service
        .update_status(&appointment_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "billing": billing
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_desk_role(&user)?;

    let service = AppointmentBookingService::new(&config);

    let appointment = service
        .cancel_appointment(&appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}
