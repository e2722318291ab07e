//! Participation state machine and the reserve-then-settle primitive shared
//! by the manual and automatic join flows.

use rusqlite::{Connection, TransactionBehavior};
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::db::queries;
use crate::error::{AppError, JoinRejection, OptionExt, Result, msg};
use crate::models::{Participant, ParticipantStatus, Ride};

use super::capacity;

/// How a reserved seat gets paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Manual flow: the client confirms a payment intent, the webhook activates.
    DeferToWebhook,
    /// Automatic flow: charged off-session inside the reserving transaction.
    SettleNow,
}

impl Settlement {
    pub fn target(self) -> ParticipantStatus {
        match self {
            Settlement::DeferToWebhook => ParticipantStatus::PendingPayment,
            Settlement::SettleNow => ParticipantStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipationEvent {
    Join(Settlement),
    ChargeSucceeded,
    ChargeFailed,
    Leave,
    RideCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Move(ParticipantStatus),
    /// Nothing to write. Replays and irrelevant events land here.
    Stay,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTransition {
    #[error("already participating in this ride")]
    AlreadyParticipating,

    #[error("not an active participant of this ride")]
    NotParticipating,

    #[error("participation was cancelled with the ride")]
    RideCancelled,
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        match err {
            InvalidTransition::AlreadyParticipating => AppError::Join(JoinRejection::AlreadyJoined),
            InvalidTransition::NotParticipating => {
                AppError::Conflict(msg::NOT_ACTIVE_PARTICIPANT.into())
            }
            InvalidTransition::RideCancelled => AppError::Join(JoinRejection::RideNotActive),
        }
    }
}

/// The transition table. `from = None` means the user has no row for the ride.
///
/// Capacity is not checked here; seat-taking moves must additionally pass the
/// capacity gate.
pub fn step(
    from: Option<ParticipantStatus>,
    event: ParticipationEvent,
) -> std::result::Result<Step, InvalidTransition> {
    use ParticipantStatus::*;

    match event {
        ParticipationEvent::Join(settlement) => match from {
            None | Some(Left) => Ok(Step::Move(settlement.target())),
            Some(PendingPayment) | Some(Active) => Err(InvalidTransition::AlreadyParticipating),
            Some(CancelledRide) => Err(InvalidTransition::RideCancelled),
        },
        ParticipationEvent::ChargeSucceeded => match from {
            Some(PendingPayment) => Ok(Step::Move(Active)),
            None | Some(Active) | Some(Left) | Some(CancelledRide) => Ok(Step::Stay),
        },
        // A failed charge keeps the user's place; only the payment row changes.
        ParticipationEvent::ChargeFailed => match from {
            None | Some(PendingPayment) | Some(Active) | Some(Left) | Some(CancelledRide) => {
                Ok(Step::Stay)
            }
        },
        ParticipationEvent::Leave => match from {
            Some(PendingPayment) | Some(Active) => Ok(Step::Move(Left)),
            None | Some(Left) | Some(CancelledRide) => Err(InvalidTransition::NotParticipating),
        },
        ParticipationEvent::RideCancelled => match from {
            Some(PendingPayment) | Some(Active) => Ok(Step::Move(CancelledRide)),
            None | Some(Left) | Some(CancelledRide) => Ok(Step::Stay),
        },
    }
}

/// Every status that `event` moves somewhere, with its target.
pub fn moves_for(event: ParticipationEvent) -> Vec<(ParticipantStatus, ParticipantStatus)> {
    ParticipantStatus::iter()
        .filter_map(|from| match step(Some(from), event) {
            Ok(Step::Move(to)) => Some((from, to)),
            Ok(Step::Stay) | Err(_) => None,
        })
        .collect()
}

/// A seat claim written inside the caller's transaction.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub ride: Ride,
    pub participant: Participant,
    /// The user had left this ride before and their row was revived.
    pub rejoined: bool,
}

/// Reserve-then-settle: run the capacity gate and create or revive the
/// participation row in the state `settlement` calls for.
///
/// Must be called inside an IMMEDIATE transaction; the caller commits once
/// settlement is done.
pub fn reserve(
    conn: &Connection,
    ride_id: &str,
    user_id: &str,
    settlement: Settlement,
) -> Result<Reservation> {
    let ride = capacity::attempt_reservation(conn, ride_id, user_id)?;
    let existing = queries::get_participant(conn, ride_id, user_id)?;

    let target = match step(existing.as_ref().map(|p| p.status), ParticipationEvent::Join(settlement))? {
        Step::Move(status) => status,
        Step::Stay => {
            return Err(AppError::Internal(format!(
                "join produced no transition for user {} on ride {}",
                user_id, ride_id
            )));
        }
    };

    let (participant, rejoined) = match existing {
        Some(row) => {
            if !queries::transition_participant(conn, &row.id, row.status, target)? {
                return Err(AppError::Conflict(format!(
                    "participation {} changed while joining",
                    row.id
                )));
            }
            let participant = Participant {
                status: target,
                updated_at: queries::now(),
                ..row
            };
            (participant, true)
        }
        None => (queries::create_participant(conn, ride_id, user_id, target)?, false),
    };

    Ok(Reservation {
        ride,
        participant,
        rejoined,
    })
}

/// Manual-confirm join: claim a seat in `pending_payment`. The client pays
/// afterwards and the webhook activates.
pub fn join_ride(conn: &mut Connection, ride_id: &str, user_id: &str) -> Result<Participant> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let reservation = reserve(&tx, ride_id, user_id, Settlement::DeferToWebhook)?;
    tx.commit()?;

    tracing::info!(
        "User {} joined ride {} (participation {}, {}{})",
        user_id,
        ride_id,
        reservation.participant.id,
        reservation.participant.status.as_ref(),
        if reservation.rejoined { ", rejoined" } else { "" }
    );

    Ok(reservation.participant)
}

/// Leave a ride from `pending_payment` or `active`.
pub fn leave_ride(conn: &mut Connection, ride_id: &str, user_id: &str) -> Result<Participant> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    queries::get_ride_by_id(&tx, ride_id)?.or_not_found(msg::RIDE_NOT_FOUND)?;

    let Some(row) = queries::get_participant(&tx, ride_id, user_id)? else {
        return Err(InvalidTransition::NotParticipating.into());
    };
    let target = match step(Some(row.status), ParticipationEvent::Leave)? {
        Step::Move(status) => status,
        Step::Stay => return Err(InvalidTransition::NotParticipating.into()),
    };

    queries::transition_participant(&tx, &row.id, row.status, target)?;
    tx.commit()?;

    tracing::info!(
        "User {} left ride {} (was {})",
        user_id,
        ride_id,
        row.status.as_ref()
    );

    Ok(Participant {
        status: target,
        updated_at: queries::now(),
        ..row
    })
}

/// The caller's status on a ride, `None` if they never joined.
pub fn participation_status(
    conn: &Connection,
    ride_id: &str,
    user_id: &str,
) -> Result<Option<Participant>> {
    queries::get_ride_by_id(conn, ride_id)?.or_not_found(msg::RIDE_NOT_FOUND)?;
    queries::get_participant(conn, ride_id, user_id)
}
