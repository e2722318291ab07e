use axum::{Extension, extract::State};
use chrono::Utc;
use serde::Serialize;

use crate::booking::{self, RideRemoval};
use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{CreateRide, ParticipantStatus, RideContact, RideView};

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub participation_id: String,
    pub ride_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub status: ParticipantStatus,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeleteRideResponse {
    #[serde(flatten)]
    pub removal: RideRemoval,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ParticipationResponse {
    pub ride_id: String,
    /// `not_participant` when the caller has no row for this ride.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participation_id: Option<String>,
}

pub async fn create_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateRide>,
) -> Result<Json<RideView>> {
    input.validate(Utc::now().naive_utc())?;

    let conn = state.db.get()?;
    let ride = queries::create_ride(&conn, &user.user_id, &input)?;

    tracing::info!(
        "User {} created ride {} ({} -> {}, {} seats)",
        user.user_id,
        ride.id,
        ride.origin.name,
        ride.destination.name,
        ride.total_seats
    );

    Ok(Json(RideView::new(ride, 0)))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
) -> Result<Json<RideView>> {
    let conn = state.db.get()?;
    let ride = queries::get_ride_by_id(&conn, &ride_id)?.or_not_found(msg::RIDE_NOT_FOUND)?;
    let taken = queries::count_active_participants(&conn, &ride_id)?;
    Ok(Json(RideView::new(ride, taken)))
}

/// Manual-confirm join: reserves the seat as `pending_payment`.
pub async fn join_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<JoinResponse>> {
    let mut conn = state.db.get()?;
    let participant = booking::join_ride(&mut conn, &ride_id, &user.user_id)?;

    Ok(Json(JoinResponse {
        participation_id: participant.id,
        ride_id: participant.ride_id,
        user_id: participant.user_id,
        status: participant.status,
        message: "Seat reserved; complete payment to confirm it",
    }))
}

pub async fn leave_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<LeaveResponse>> {
    let mut conn = state.db.get()?;
    let participant = booking::leave_ride(&mut conn, &ride_id, &user.user_id)?;

    Ok(Json(LeaveResponse {
        status: participant.status,
        message: "You left the ride",
    }))
}

pub async fn delete_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<DeleteRideResponse>> {
    let mut conn = state.db.get()?;
    let removal = booking::delete_or_cancel(&mut conn, &ride_id, &user.user_id)?;

    let message = if removal.was_cancelled {
        "Ride cancelled. Participants have been notified; payments are not refunded"
    } else {
        "Ride deleted"
    };

    Ok(Json(DeleteRideResponse { removal, message }))
}

pub async fn get_participation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<ParticipationResponse>> {
    let conn = state.db.get()?;
    let participant = booking::participation_status(&conn, &ride_id, &user.user_id)?;

    Ok(Json(ParticipationResponse {
        ride_id,
        status: participant
            .as_ref()
            .map(|p| p.status.as_ref().to_string())
            .unwrap_or_else(|| "not_participant".to_string()),
        participation_id: participant.map(|p| p.id),
    }))
}

pub async fn get_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<Vec<RideContact>>> {
    let conn = state.db.get()?;
    let contacts = booking::ride_contacts(&conn, &ride_id, &user.user_id)?;
    Ok(Json(contacts))
}
