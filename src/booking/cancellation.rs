use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::RideStatus;

use super::participation::{self, ParticipationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RideRemoval {
    /// `true` when the ride was kept and cancelled because people had joined;
    /// their payments stay as they are (no refunds).
    pub was_cancelled: bool,
    pub participants_cancelled: usize,
}

/// Delete a ride nobody has joined, or cancel it and everyone on it.
///
/// Any participation row, even `left`, keeps the ride from being deleted so
/// payment rows are never removed with it.
pub fn delete_or_cancel(conn: &mut Connection, ride_id: &str, requester_id: &str) -> Result<RideRemoval> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let ride = queries::get_ride_by_id(&tx, ride_id)?.or_not_found(msg::RIDE_NOT_FOUND)?;
    if ride.creator_id != requester_id {
        return Err(AppError::Forbidden(msg::NOT_RIDE_CREATOR.into()));
    }

    let participants = queries::count_participants(&tx, ride_id)?;

    let removal = if participants == 0 {
        queries::delete_ride(&tx, ride_id)?;
        RideRemoval {
            was_cancelled: false,
            participants_cancelled: 0,
        }
    } else {
        queries::set_ride_status(&tx, ride_id, RideStatus::Cancelled)?;

        let mut cancelled = 0;
        for (from, to) in participation::moves_for(ParticipationEvent::RideCancelled) {
            cancelled += queries::transition_ride_participants(&tx, ride_id, &[from], to)?;
        }

        RideRemoval {
            was_cancelled: true,
            participants_cancelled: cancelled,
        }
    };

    tx.commit()?;

    if removal.was_cancelled {
        tracing::info!(
            "Ride {} cancelled by creator; {} participant(s) moved to cancelled_ride, no refunds issued",
            ride_id,
            removal.participants_cancelled
        );
    } else {
        tracing::info!("Ride {} deleted by creator (no participants)", ride_id);
    }

    Ok(removal)
}
