use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::BillingError;
use crate::services::BillingCycleService;

fn map_billing_error(error: BillingError) -> AppError {
    match error {
        BillingError::CycleNotFound => AppError::NotFound("Billing cycle not found".to_string()),
        BillingError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        BillingError::ValidationError(msg) => AppError::ValidationError(msg),
        BillingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn current_cycle(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BillingCycleService::new(&config);

    let cycle = service
        .current_cycle(auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(cycle)))
}

#[axum::debug_handler]
pub async fn reset_cycle(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if user.role.as_deref() != Some("admin") {
        return Err(AppError::Auth(
            "Only administrators can reset the billing cycle".to_string(),
        ));
    }

    let service = BillingCycleService::new(&config);

    let outcome = service
        .reset_cycle(auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn cycle_summary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(cycle_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = BillingCycleService::new(&config);

    let (cycle, summary) = service
        .cycle_summary(&cycle_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "cycle": cycle,
        "summary": summary
    })))
}

#[axum::debug_handler]
pub async fn patient_allowance(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = BillingCycleService::new(&config);

    let allowance = service
        .patient_allowance(&patient_id, auth.token())
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "session_allowance": allowance
    })))
}
