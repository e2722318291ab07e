//! Seat reservation, participation lifecycle, and the payment flows that
//! settle a reservation.
//!
//! Every seat-taking write goes through [`reserve`] inside an IMMEDIATE
//! transaction; seats are counted from `active` rows, never stored.

mod cancellation;
mod capacity;
mod checkout;
mod contacts;
mod participation;

pub use cancellation::{RideRemoval, delete_or_cancel};
pub use capacity::{attempt_reservation, has_free_seat};
pub use checkout::{
    AutomaticJoin, PaymentIntentCreated, SetupIntentCreated, create_payment_intent,
    create_setup_intent, join_and_charge_automatically,
};
pub use contacts::ride_contacts;
pub use participation::{
    InvalidTransition, ParticipationEvent, Reservation, Settlement, Step, join_ride, leave_ride,
    moves_for, participation_status, reserve, step,
};
