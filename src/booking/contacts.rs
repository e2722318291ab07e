use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{ParticipantStatus, RideContact};

/// Contact handles of a ride's creator and active participants.
///
/// Only the creator and active participants may read them. Leaving or being
/// cancelled revokes access for future reads.
pub fn ride_contacts(conn: &Connection, ride_id: &str, requester_id: &str) -> Result<Vec<RideContact>> {
    let ride = queries::get_ride_by_id(conn, ride_id)?.or_not_found(msg::RIDE_NOT_FOUND)?;

    if ride.creator_id != requester_id {
        let status = queries::get_participant(conn, ride_id, requester_id)?.map(|p| p.status);
        match status {
            Some(ParticipantStatus::Active) => {}
            Some(ParticipantStatus::PendingPayment)
            | Some(ParticipantStatus::Left)
            | Some(ParticipantStatus::CancelledRide)
            | None => return Err(AppError::Forbidden(msg::CONTACTS_FORBIDDEN.into())),
        }
    }

    queries::list_ride_contacts(conn, ride_id)
}
