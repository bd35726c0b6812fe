use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateStaffRequest, StaffError, UpdateStaffRequest, UpsertDayScheduleRequest};
use crate::services::staff::StaffService;

#[derive(Debug, Deserialize)]
pub struct ListStaffQuery {
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

fn map_staff_error(error: StaffError) -> AppError {
    match error {
        StaffError::NotFound => AppError::NotFound("Staff member not found".to_string()),
        StaffError::DuplicateName(name) => {
            AppError::Conflict(format!("Staff member '{}' already exists", name))
        }
        StaffError::ValidationError(msg) => AppError::ValidationError(msg),
        StaffError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_staff(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if user.role.as_deref() != Some("admin") {
        return Err(AppError::Auth(
            "Only administrators can create staff members".to_string(),
        ));
    }

    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .create_staff(request, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ListStaffQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .list_staff(query.include_inactive.unwrap_or(false), token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

#[axum::debug_handler]
pub async fn get_staff(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .get_staff(&staff_id, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn update_staff(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if user.role.as_deref() != Some("admin") {
        return Err(AppError::Auth(
            "Only administrators can update staff members".to_string(),
        ));
    }

    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .update_staff(&staff_id, request, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn deactivate_staff(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if user.role.as_deref() != Some("admin") {
        return Err(AppError::Auth(
            "Only administrators can deactivate staff members".to_string(),
        ));
    }

    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .deactivate_staff(&staff_id, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .get_staff(&staff_id, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "staff_id": staff.id,
        "display_name": staff.display_name,
        "availability": staff.availability
    })))
}

#[axum::debug_handler]
pub async fn upsert_day_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertDayScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let can_edit = matches!(user.role.as_deref(), Some("admin") | Some("front_desk"));
    if !can_edit {
        return Err(AppError::Auth(
            "Not authorized to edit staff availability".to_string(),
        ));
    }

    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .upsert_day_schedule(&staff_id, request, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn get_bookable_slots(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<String>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);

    let slots = staff_service
        .get_bookable_slots(&staff_id, query.date, token)
        .await
        .map_err(map_staff_error)?;

    let slot_strings: Vec<String> = slots
        .iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect();

    Ok(Json(json!({
        "staff_id": staff_id,
        "date": query.date,
        "slots": slot_strings,
        "total": slot_strings.len()
    })))
}
