use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn billing_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/cycles/current", get(handlers::current_cycle))
        .route("/cycles/reset", post(handlers::reset_cycle))
        .route("/cycles/{cycle_id}/summary", get(handlers::cycle_summary))
        .route(
            "/patients/{patient_id}/allowance",
            get(handlers::patient_allowance),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
