use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use billing_cell::handlers;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestUser};

fn mock_config(mock_uri: &str) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        supabase_url: mock_uri.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        standard_session_rate: dec!(1200.00),
        conflict_tolerance_minutes: 30,
    })
}

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(
        &user,
        "test-secret-key-for-jwt-validation-must-be-long-enough",
        Some(1),
    );
    TypedHeader(Authorization::bearer(&token).unwrap())
}

#[tokio::test]
async fn test_current_cycle_returns_stored_active_cycle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/billing_cycles"))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::billing_cycle_response(2026, 3, "active")
        ])))
        .mount(&mock_server)
        .await;

    let response = handlers::current_cycle(
        State(mock_config(&mock_server.uri())),
        auth_header(),
    )
    .await
    .unwrap();

    let body = response.0;
    assert_eq!(body["id"], "2026-03");
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_current_cycle_opens_one_when_none_stored() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/billing_cycles"))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/billing_cycles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::billing_cycle_response(2026, 8, "active")
        ])))
        .mount(&mock_server)
        .await;

    let response = handlers::current_cycle(
        State(mock_config(&mock_server.uri())),
        auth_header(),
    )
    .await
    .unwrap();

    assert_eq!(response.0["status"], "active");
}

#[tokio::test]
async fn test_reset_closes_active_cycle_and_activates_next_month() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/billing_cycles"))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::billing_cycle_response(2026, 3, "active")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/billing_cycles"))
        .and(query_param("id", "eq.2026-04"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/billing_cycles"))
        .and(query_param("id", "eq.2026-03"))
        .and(body_string_contains("closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::billing_cycle_response(2026, 3, "closed")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/billing_cycles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::billing_cycle_response(2026, 4, "active")
        ])))
        .mount(&mock_server)
        .await;

    let response = handlers::reset_cycle(
        State(mock_config(&mock_server.uri())),
        auth_header(),
        Extension(TestUser::admin("admin@example.com").to_user()),
    )
    .await
    .unwrap();

    let body = response.0;
    assert_eq!(body["closed"]["id"], "2026-03");
    assert_eq!(body["closed"]["status"], "closed");
    assert_eq!(body["activated"]["id"], "2026-04");
    assert_eq!(body["activated"]["status"], "active");
    // Contiguous windows: April starts the day after March ends.
    assert_eq!(body["closed"]["end_date"], "2026-03-31");
    assert_eq!(body["activated"]["start_date"], "2026-04-01");
}

#[tokio::test]
async fn test_reset_requires_admin_role() {
    let mock_server = MockServer::start().await;

    let result = handlers::reset_cycle(
        State(mock_config(&mock_server.uri())),
        auth_header(),
        Extension(TestUser::front_desk("desk@example.com").to_user()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn test_cycle_summary_aggregates_window_collections() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/billing_cycles"))
        .and(query_param("id", "eq.2026-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::billing_cycle_response(2026, 3, "closed")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            // Collected inside the window.
            {
                "staff_name": "Dr. Vance",
                "visit_date": "2026-03-10",
                "status": "completed",
                "billing": { "amount": "1200.00", "billing_date": "2026-03-10" }
            },
            {
                "staff_name": "Dr. Osei",
                "visit_date": "2026-03-12",
                "status": "completed",
                "billing": { "amount": "960.00", "billing_date": "2026-03-12" }
            },
            // Posted after the window closes: April's collections.
            {
                "staff_name": "Dr. Vance",
                "visit_date": "2026-03-31",
                "status": "completed",
                "billing": { "amount": "1200.00", "billing_date": "2026-04-01" }
            },
            // Completed in-window but never billed: pending.
            {
                "staff_name": "Dr. Vance",
                "visit_date": "2026-03-20",
                "status": "completed",
                "billing": null
            }
        ])))
        .mount(&mock_server)
        .await;

    let response = handlers::cycle_summary(
        State(mock_config(&mock_server.uri())),
        auth_header(),
        Path("2026-03".to_string()),
    )
    .await
    .unwrap();

    let summary = &response.0["summary"];
    assert_eq!(summary["pending_count"], 1);
    assert_eq!(summary["completed_count"], 2);
    assert_eq!(summary["collected_amount"], "2160.00");
}

#[tokio::test]
async fn test_patient_allowance_inspection() {
    let mock_server = MockServer::start().await;
    let patient_id = "22222222-2222-2222-2222-222222222222";

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("select", "session_allowance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "session_allowance": {
                "free_sessions_total": 4,
                "free_sessions_used": 2,
                "pending_paid_sessions": 0,
                "pending_charge_amount": "0.00"
            }
        }])))
        .mount(&mock_server)
        .await;

    let response = handlers::patient_allowance(
        State(mock_config(&mock_server.uri())),
        auth_header(),
        Path(patient_id.to_string()),
    )
    .await
    .unwrap();

    let body = response.0;
    assert_eq!(body["session_allowance"]["free_sessions_used"], 2);
}
