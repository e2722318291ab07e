//! Ride capacity gate.
//!
//! Seats taken are always counted from `active` participant rows inside the
//! caller's IMMEDIATE transaction; no counter is stored anywhere.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{JoinRejection, Result};
use crate::models::{Ride, RideStatus};

/// Decide whether `user_id` may take a seat on `ride_id`.
///
/// Run it inside an IMMEDIATE transaction and perform the participant write
/// in the same transaction, otherwise two joiners can both see a free seat.
/// Rejections are checked in a fixed order: not found, not active, full,
/// self-join.
pub fn attempt_reservation(conn: &Connection, ride_id: &str, user_id: &str) -> Result<Ride> {
    let ride = queries::get_ride_by_id(conn, ride_id)?.ok_or(JoinRejection::RideNotFound)?;

    match ride.status {
        RideStatus::Active => {}
        RideStatus::Archived | RideStatus::Cancelled => return Err(JoinRejection::RideNotActive.into()),
    }

    let taken = queries::count_active_participants(conn, ride_id)?;
    if taken >= ride.total_seats {
        return Err(JoinRejection::RideFull.into());
    }

    if ride.creator_id == user_id {
        return Err(JoinRejection::SelfJoin.into());
    }

    Ok(ride)
}

/// Whether a paid participant can still be seated on `ride`. Departure
/// passing does not matter here; a cancelled ride never seats anyone.
pub fn has_free_seat(conn: &Connection, ride: &Ride) -> Result<bool> {
    let open = match ride.status {
        RideStatus::Active | RideStatus::Archived => true,
        RideStatus::Cancelled => false,
    };
    if !open {
        return Ok(false);
    }
    Ok(queries::count_active_participants(conn, &ride.id)? < ride.total_seats)
}
