use axum::{Extension, extract::State};
use serde::Serialize;

use crate::booking::{self, PaymentIntentCreated, SetupIntentCreated};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::ParticipantStatus;

#[derive(Debug, Serialize)]
pub struct AutomaticJoinResponse {
    pub participation_id: String,
    pub payment_id: String,
    pub status: ParticipantStatus,
    pub amount: i64,
    pub currency: String,
    pub message: &'static str,
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<PaymentIntentCreated>> {
    let created = booking::create_payment_intent(&state, &ride_id, &user.user_id).await?;
    Ok(Json(created))
}

pub async fn join_automatic(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<AutomaticJoinResponse>> {
    let joined = booking::join_and_charge_automatically(&state, &ride_id, &user.user_id).await?;

    Ok(Json(AutomaticJoinResponse {
        participation_id: joined.participant.id,
        payment_id: joined.payment.id,
        status: joined.participant.status,
        amount: joined.payment.amount_cents,
        currency: joined.payment.currency,
        message: "Joined and paid",
    }))
}

pub async fn create_setup_intent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SetupIntentCreated>> {
    let created = booking::create_setup_intent(&state, &user.user_id).await?;
    Ok(Json(created))
}
