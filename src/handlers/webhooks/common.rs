//! Webhook reconciler: applies payment outcome events to local state.
//!
//! Every write is guarded on the current status, so redelivered events find
//! nothing left to update and are acknowledged as no-ops.

use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};

use crate::booking::{self, ParticipationEvent, Step};
use crate::db::queries;
use crate::error::Result;
use crate::models::PaymentStatus;

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// A charge outcome, keyed by the provider's intent id.
#[derive(Debug, Clone)]
pub struct ChargeData {
    pub intent_id: String,
    pub failure_reason: Option<String>,
}

/// A card saved for off-session use.
#[derive(Debug, Clone)]
pub struct PaymentMethodData {
    pub setup_intent_id: String,
    pub user_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_method_id: Option<String>,
}

/// Parsed webhook event with provider-agnostic data.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    ChargeSucceeded(ChargeData),
    ChargeFailed(ChargeData),
    PaymentMethodSaved(PaymentMethodData),
    /// Event type we don't act on.
    Ignored,
}

/// What a reconciliation actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub payment_updated: bool,
    pub participant_activated: bool,
    /// Paid, but the ride filled up (or was cancelled) before the charge landed.
    pub seat_unavailable: bool,
}

/// `payment_intent.succeeded`: mark the payment succeeded and seat the
/// participant, in one IMMEDIATE transaction.
pub fn process_charge_succeeded(conn: &mut Connection, data: &ChargeData) -> Result<Reconciliation> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let payment_updated = queries::transition_payment(
        &tx,
        &data.intent_id,
        PaymentStatus::Pending,
        PaymentStatus::Succeeded,
    )?;

    let Some(payment) = queries::get_payment_by_intent(&tx, &data.intent_id)? else {
        tracing::warn!("No payment found for succeeded intent {}", data.intent_id);
        return Ok(Reconciliation::default());
    };

    if !payment_updated {
        tracing::warn!(
            "Succeeded event for intent {} with payment {} already {}",
            data.intent_id,
            payment.id,
            payment.status.as_ref()
        );
    }

    let mut outcome = Reconciliation {
        payment_updated,
        ..Default::default()
    };

    // Only the delivery that moved the payment out of `pending` seats anyone.
    // A replay must not seat a row revived by an unpaid rejoin.
    if let Some(participant_id) = payment.participant_id.as_deref()
        && payment_updated
        && let Some(participant) = queries::get_participant_by_id(&tx, participant_id)?
    {
        match booking::step(Some(participant.status), ParticipationEvent::ChargeSucceeded)? {
            Step::Move(next) => {
                let ride = queries::get_ride_by_id(&tx, &participant.ride_id)?;
                let seat_free = match &ride {
                    Some(ride) => booking::has_free_seat(&tx, ride)?,
                    None => false,
                };

                if seat_free {
                    outcome.participant_activated = queries::transition_participant(
                        &tx,
                        &participant.id,
                        participant.status,
                        next,
                    )?;
                } else {
                    tracing::error!(
                        "Payment {} (intent {}) succeeded but ride {} has no free seat; participation {} left {}",
                        payment.id,
                        data.intent_id,
                        participant.ride_id,
                        participant.id,
                        participant.status.as_ref()
                    );
                    outcome.seat_unavailable = true;
                }
            }
            Step::Stay => {
                tracing::debug!(
                    "Participation {} already {}; nothing to activate",
                    participant.id,
                    participant.status.as_ref()
                );
            }
        }
    }

    tx.commit()?;

    if outcome.participant_activated {
        tracing::info!(
            "Payment {} succeeded (intent {}); participation activated",
            payment.id,
            data.intent_id
        );
    }

    Ok(outcome)
}

/// `payment_intent.payment_failed`: mark the payment failed. The participant
/// stays `pending_payment` so they can retry with another intent.
pub fn process_charge_failed(conn: &Connection, data: &ChargeData) -> Result<Reconciliation> {
    let payment_updated = queries::transition_payment(
        conn,
        &data.intent_id,
        PaymentStatus::Pending,
        PaymentStatus::Failed,
    )?;

    if payment_updated {
        tracing::info!(
            "Payment for intent {} failed: {}",
            data.intent_id,
            data.failure_reason.as_deref().unwrap_or("no reason given")
        );
    } else {
        match queries::get_payment_by_intent(conn, &data.intent_id)? {
            Some(payment) => tracing::warn!(
                "Failed event for intent {} with payment {} already {}",
                data.intent_id,
                payment.id,
                payment.status.as_ref()
            ),
            None => tracing::warn!("No payment found for failed intent {}", data.intent_id),
        }
    }

    Ok(Reconciliation {
        payment_updated,
        ..Default::default()
    })
}

/// `setup_intent.succeeded`: remember the saved card for automatic joins.
/// Returns whether a user row was updated.
pub fn process_payment_method_saved(conn: &Connection, data: &PaymentMethodData) -> Result<bool> {
    let (Some(user_id), Some(payment_method_id)) =
        (data.user_id.as_deref(), data.payment_method_id.as_deref())
    else {
        tracing::warn!(
            "Setup intent {} has no app_user_id metadata or payment method; ignoring",
            data.setup_intent_id
        );
        return Ok(false);
    };

    let updated =
        queries::save_payment_method(conn, user_id, payment_method_id, data.customer_id.as_deref())?;

    if updated {
        tracing::info!(
            "Saved payment method from setup intent {} for user {}",
            data.setup_intent_id,
            user_id
        );
    } else {
        tracing::warn!(
            "Setup intent {} names unknown user {}",
            data.setup_intent_id,
            user_id
        );
    }

    Ok(updated)
}

/// Apply a verified event. Database errors map to 500 so the provider
/// redelivers; everything else is acknowledged.
pub fn process_event(conn: &mut Connection, event: &WebhookEvent) -> WebhookResult {
    let result = match event {
        WebhookEvent::ChargeSucceeded(data) => process_charge_succeeded(conn, data).map(|outcome| {
            if outcome.payment_updated || outcome.participant_activated {
                "Payment succeeded"
            } else {
                "Already processed"
            }
        }),
        WebhookEvent::ChargeFailed(data) => process_charge_failed(conn, data).map(|outcome| {
            if outcome.payment_updated {
                "Payment failed"
            } else {
                "Already processed"
            }
        }),
        WebhookEvent::PaymentMethodSaved(data) => {
            process_payment_method_saved(conn, data).map(|_| "Payment method saved")
        }
        WebhookEvent::Ignored => Ok("Event ignored"),
    };

    match result {
        Ok(message) => (StatusCode::OK, message),
        Err(e) => {
            let intent_id = match event {
                WebhookEvent::ChargeSucceeded(data) | WebhookEvent::ChargeFailed(data) => {
                    data.intent_id.as_str()
                }
                WebhookEvent::PaymentMethodSaved(data) => data.setup_intent_id.as_str(),
                WebhookEvent::Ignored => "-",
            };
            tracing::error!("Failed to reconcile webhook for intent {}: {}", intent_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Processing failed")
        }
    }
}
