pub mod auth;
pub mod catalog;
pub mod check_ins;
pub mod convert;
pub mod error;
pub mod middleware;
pub mod pickups;

use axum::{
    Json, Router,
    routing::{delete, get, post},
};

use crate::auth::AppState;
use crate::middleware::{require_auth, require_staff};

/// Every route of the service, with state attached.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/pharmacies", get(catalog::list_pharmacies))
        .route("/pharmacies/nearby", get(catalog::nearby_pharmacies))
        .route("/pharmacies/{pharmacy_id}", get(catalog::get_pharmacy))
        .route("/pharmacies/{pharmacy_id}/medications", get(catalog::list_medications))
        .route("/pharmacies/{pharmacy_id}/queue", get(catalog::queue_info));

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/me/pickups", get(pickups::list_pickups))
        .route("/pharmacies/{pharmacy_id}/check-ins", post(check_ins::join_queue))
        .route(
            "/pharmacies/{pharmacy_id}/check-ins/{queue_number}",
            delete(check_ins::leave_queue),
        )
        .route("/pharmacies/{pharmacy_id}/queue/status", get(check_ins::queue_status))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let staff_routes = Router::new()
        .route("/pharmacies/{pharmacy_id}/queue/serve-next", post(check_ins::serve_next))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_staff));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(staff_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
