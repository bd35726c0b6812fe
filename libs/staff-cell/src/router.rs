use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn staff_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_staff).post(handlers::create_staff))
        .route("/{staff_id}", get(handlers::get_staff))
        .route("/{staff_id}", patch(handlers::update_staff))
        .route("/{staff_id}/deactivate", post(handlers::deactivate_staff))
        .route("/{staff_id}/availability", get(handlers::get_availability))
        .route("/{staff_id}/availability", put(handlers::upsert_day_schedule))
        .route("/{staff_id}/bookable-slots", get(handlers::get_bookable_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
