use chrono::{Local, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BookedAppointment, CreateStaffRequest, DaySchedule, Staff, StaffError,
    UpdateStaffRequest, UpsertDayScheduleRequest,
};
use crate::services::slots::SlotGenerator;

pub struct StaffService {
    supabase: SupabaseClient,
    slot_generator: SlotGenerator,
}

impl StaffService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            slot_generator: SlotGenerator::new(),
        }
    }

    pub async fn create_staff(
        &self,
        request: CreateStaffRequest,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        debug!("Creating staff member: {}", request.display_name);

        if request.display_name.trim().is_empty() {
            return Err(StaffError::ValidationError(
                "Display name must not be empty".to_string(),
            ));
        }

        // Appointments reference staff by display name, so names must be unique.
        let existing_path = format!(
            "/rest/v1/staff?display_name=eq.{}",
            urlencoding::encode(&request.display_name)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(StaffError::DuplicateName(request.display_name));
        }

        let staff_data = json!({
            "display_name": request.display_name,
            "role": request.role,
            "is_active": true,
            "availability": request.availability.unwrap_or_default(),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/staff",
                Some(auth_token),
                Some(staff_data),
                Some(headers),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::DatabaseError(
                "Failed to create staff member".to_string(),
            ));
        }

        let staff: Staff = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;
        debug!("Staff member created with ID: {}", staff.id);

        Ok(staff)
    }

    pub async fn get_staff(&self, staff_id: &str, auth_token: &str) -> Result<Staff, StaffError> {
        let path = format!("/rest/v1/staff?id=eq.{}", staff_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(e.to_string()))
    }

    pub async fn get_staff_by_name(
        &self,
        display_name: &str,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        let path = format!(
            "/rest/v1/staff?display_name=eq.{}",
            urlencoding::encode(display_name)
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(e.to_string()))
    }

    pub async fn list_staff(
        &self,
        include_inactive: bool,
        auth_token: &str,
    ) -> Result<Vec<Staff>, StaffError> {
        let mut path = "/rest/v1/staff?order=display_name.asc".to_string();
        if !include_inactive {
            path.push_str("&is_active=eq.true");
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| StaffError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn update_staff(
        &self,
        staff_id: &str,
        request: UpdateStaffRequest,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        debug!("Updating staff member: {}", staff_id);

        let mut update_data = serde_json::Map::new();

        if let Some(display_name) = request.display_name {
            if display_name.trim().is_empty() {
                return Err(StaffError::ValidationError(
                    "Display name must not be empty".to_string(),
                ));
            }
            update_data.insert("display_name".to_string(), json!(display_name));
        }
        if let Some(role) = request.role {
            update_data.insert("role".to_string(), json!(role));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_staff(staff_id, Value::Object(update_data), auth_token)
            .await
    }

    pub async fn deactivate_staff(
        &self,
        staff_id: &str,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        debug!("Deactivating staff member: {}", staff_id);

        let update_data = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_staff(staff_id, update_data, auth_token).await
    }

    /// Replaces the schedule entry for one date in the staff member's
    /// availability map.
    pub async fn upsert_day_schedule(
        &self,
        staff_id: &str,
        request: UpsertDayScheduleRequest,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        debug!(
            "Upserting schedule for staff {} on {}",
            staff_id, request.date
        );

        let mut staff = self.get_staff(staff_id, auth_token).await?;

        staff.availability.insert(
            request.date,
            DaySchedule {
                enabled: request.enabled,
                time_ranges: request.time_ranges,
            },
        );

        let update_data = json!({
            "availability": staff.availability,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_staff(staff_id, update_data, auth_token).await
    }

    /// Snapshots the schedule and booked appointments, then runs the slot
    /// generator against them.
    pub async fn get_bookable_slots(
        &self,
        staff_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, StaffError> {
        let staff = self.get_staff(staff_id, auth_token).await?;

        if !staff.is_active {
            debug!("Staff member {} is inactive, offering no slots", staff.display_name);
            return Ok(vec![]);
        }

        let booked = self
            .get_booked_times(&staff.display_name, date, auth_token)
            .await?;

        let now = Local::now().naive_local();
        Ok(self
            .slot_generator
            .bookable_slots(&staff.availability, &booked, date, now))
    }

    async fn get_booked_times(
        &self,
        staff_name: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<NaiveTime>, StaffError> {
        let path = format!(
            "/rest/v1/appointments?staff_name=eq.{}&visit_date=eq.{}&status=neq.cancelled&select=visit_time",
            urlencoding::encode(staff_name),
            date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let mut booked = HashSet::new();
        for row in result {
            let appointment: BookedAppointment = serde_json::from_value(row)
                .map_err(|e| StaffError::DatabaseError(e.to_string()))?;
            match NaiveTime::parse_from_str(&appointment.visit_time, "%H:%M") {
                Ok(time) => {
                    booked.insert(time);
                }
                Err(_) => {
                    warn!(
                        "Ignoring malformed booked time '{}' on {}",
                        appointment.visit_time, date
                    );
                }
            }
        }

        Ok(booked)
    }

    async fn patch_staff(
        &self,
        staff_id: &str,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        let path = format!("/rest/v1/staff?id=eq.{}", staff_id);
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
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(e.to_string()))
    }
}
