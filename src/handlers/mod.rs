pub mod payments;
pub mod rides;
pub mod webhooks;

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::middleware::require_user;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Every route of the service. Ride and payment routes require a session;
/// health and the provider webhook do not.
pub fn router(state: AppState) -> Router<AppState> {
    let user_routes = Router::new()
        .route("/rides", post(rides::create_ride))
        .route("/rides/{ride_id}", get(rides::get_ride).delete(rides::delete_ride))
        .route("/rides/{ride_id}/join", post(rides::join_ride))
        .route("/rides/{ride_id}/join-automatic", post(payments::join_automatic))
        .route("/rides/{ride_id}/leave", post(rides::leave_ride))
        .route("/rides/{ride_id}/participation", get(rides::get_participation))
        .route("/rides/{ride_id}/contacts", get(rides::get_contacts))
        .route("/rides/{ride_id}/payment-intent", post(payments::create_payment_intent))
        .route("/payments/setup-intent", post(payments::create_setup_intent))
        .layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/health", get(health))
        .merge(webhooks::router())
        .merge(user_routes)
}
