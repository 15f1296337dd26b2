//! HTTP routes

pub mod billing;
pub mod clips;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::auth::require_auth;
use crate::state::AppState;

/// Build the application router.
///
/// The webhook route stays outside the auth layer — Stripe authenticates
/// with a signature, not a session.
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    let authenticated = Router::new()
        .route(
            "/api/clips",
            post(clips::create_clip).get(clips::list_clips),
        )
        .route(
            "/api/clips/{id}",
            get(clips::get_clip).delete(clips::delete_clip),
        )
        .route("/api/billing/usage", get(billing::get_usage))
        .route("/api/billing/subscription", get(billing::get_subscription))
        .route("/api/billing/checkout", post(billing::create_checkout))
        .route("/api/billing/portal", post(billing::create_portal_session))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/api/billing/webhook", post(billing::webhook))
        .merge(authenticated)
        .with_state(state)
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
