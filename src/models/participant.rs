use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Lifecycle of a user's membership in a ride.
///
/// Transitions are decided by [`crate::booking::step`]; nothing else should
/// write this column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantStatus {
    /// Seat claimed, waiting for the payment webhook.
    PendingPayment,
    /// Holds a seat.
    Active,
    Left,
    /// The ride was cancelled by its creator.
    CancelledRide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub ride_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    pub created_at: i64,
    pub updated_at: i64,
}
