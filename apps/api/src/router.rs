use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use billing_cell::router::billing_routes;
use patient_cell::router::create_patient_router;
use shared_config::AppConfig;
use staff_cell::router::staff_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic operations API is running!" }))
        .nest("/staff", staff_routes(state.clone()))
        .nest("/patients", create_patient_router(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/billing", billing_routes(state.clone()))
}
