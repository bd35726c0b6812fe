use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            standard_session_rate: dec!(1200.00),
            conflict_tolerance_minutes: 30,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "front_desk".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn clinician(email: &str) -> Self {
        Self::new(email, "clinician")
    }

    pub fn front_desk(email: &str) -> Self {
        Self::new(email, "front_desk")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn staff_response(staff_id: &str, display_name: &str) -> serde_json::Value {
        json!({
            "id": staff_id,
            "display_name": display_name,
            "role": "clinical",
            "is_active": true,
            "availability": {},
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn staff_with_availability_response(
        staff_id: &str,
        display_name: &str,
        availability: serde_json::Value,
    ) -> serde_json::Value {
        json!({
            "id": staff_id,
            "display_name": display_name,
            "role": "clinical",
            "is_active": true,
            "availability": availability,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(patient_id: &str, classification: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": "Test Patient",
            "email": "patient@example.com",
            "billing_classification": classification,
            "payment_terms": "without_concession",
            "assigned_clinician": null,
            "session_allowance": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn dyes_patient_response(
        patient_id: &str,
        free_total: u32,
        free_used: u32,
    ) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": "Test Patient",
            "email": "patient@example.com",
            "billing_classification": "dyes",
            "payment_terms": "without_concession",
            "assigned_clinician": null,
            "session_allowance": {
                "free_sessions_total": free_total,
                "free_sessions_used": free_used,
                "pending_paid_sessions": 0,
                "pending_charge_amount": "0.00"
            },
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        staff_name: &str,
        visit_date: &str,
        visit_time: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "staff_name": staff_name,
            "visit_date": visit_date,
            "visit_time": visit_time,
            "status": "pending",
            "billing": null,
            "notes": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn billed_appointment_response(
        appointment_id: &str,
        patient_id: &str,
        staff_name: &str,
        visit_date: &str,
        amount: &str,
        billing_date: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "staff_name": staff_name,
            "visit_date": visit_date,
            "visit_time": "10:00",
            "status": "completed",
            "billing": {
                "amount": amount,
                "billing_date": billing_date
            },
            "notes": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn billing_cycle_response(year: i32, month: u32, status: &str) -> serde_json::Value {
        let last_day = match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            _ => if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 { 29 } else { 28 },
        };
        json!({
            "id": format!("{:04}-{:02}", year, month),
            "year": year,
            "month": month,
            "start_date": format!("{:04}-{:02}-01", year, month),
            "end_date": format!("{:04}-{:02}-{:02}", year, month, last_day),
            "status": status,
            "created_at": "2026-01-01T00:00:00Z",
            "closed_at": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
