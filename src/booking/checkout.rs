//! Payment intent issuer: the manual-confirm and automatic (off-session)
//! payment flows, plus saving a card for later.

use rusqlite::TransactionBehavior;
use serde::Serialize;

use crate::db::{AppState, ImmediateTx, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{CreatePayment, Participant, ParticipantStatus, Payment, PaymentStatus};
use crate::payments::{ChargeMetadata, ChargeOutcome, IntentRequest, OffSessionCharge};

use super::capacity;
use super::participation::{self, Settlement};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentCreated {
    pub client_secret: String,
    pub payment_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomaticJoin {
    pub participant: Participant,
    pub payment: Payment,
    pub rejoined: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupIntentCreated {
    pub client_secret: String,
    pub customer_id: String,
}

/// Manual-confirm flow. The participant must be `pending_payment`; the
/// returned client secret is confirmed on the device and the outcome arrives
/// by webhook. This never marks anything succeeded.
///
/// Each call creates a fresh provider intent, so a user whose card failed can
/// simply try again.
pub async fn create_payment_intent(
    state: &AppState,
    ride_id: &str,
    user_id: &str,
) -> Result<PaymentIntentCreated> {
    state.join_fee.validate()?;

    let (participant, customer_id) = {
        let conn = state.db.get()?;
        let participant = queries::get_participant(&conn, ride_id, user_id)?
            .ok_or_else(|| AppError::Conflict(msg::NOT_JOINED.into()))?;

        match participant.status {
            ParticipantStatus::PendingPayment => {}
            ParticipantStatus::Active | ParticipantStatus::Left | ParticipantStatus::CancelledRide => {
                return Err(AppError::Conflict(format!(
                    "cannot create a payment for participation with status {}",
                    participant.status.as_ref()
                )));
            }
        }

        // Don't ask anyone to pay for a seat that no longer exists.
        capacity::attempt_reservation(&conn, ride_id, user_id)?;

        let user = queries::get_user_by_id(&conn, user_id)?.or_not_found(msg::USER_NOT_FOUND)?;
        (participant, user.stripe_customer_id)
    };

    let fee = &state.join_fee;
    let intent = state
        .payments
        .create_payment_intent(&IntentRequest {
            amount_cents: fee.amount_cents,
            currency: fee.currency.clone(),
            customer_id,
            metadata: ChargeMetadata {
                user_id: user_id.to_string(),
                ride_id: ride_id.to_string(),
                participant_id: Some(participant.id.clone()),
            },
        })
        .await?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // The participant may have left or been cancelled while we talked to the provider.
    let still_pending = queries::get_participant_by_id(&tx, &participant.id)?
        .is_some_and(|p| p.status == ParticipantStatus::PendingPayment);
    if !still_pending {
        tracing::warn!(
            "Participation {} changed while creating intent {}; not recording it",
            participant.id,
            intent.id
        );
        return Err(AppError::Conflict(msg::NOT_ACTIVE_PARTICIPANT.into()));
    }

    let payment = queries::create_payment(
        &tx,
        &CreatePayment {
            user_id: user_id.to_string(),
            ride_id: ride_id.to_string(),
            participant_id: Some(participant.id.clone()),
            provider_intent_id: intent.id.clone(),
            status: PaymentStatus::Pending,
            amount_cents: fee.amount_cents,
            currency: fee.currency.clone(),
        },
    )?;
    tx.commit()?;

    tracing::info!(
        "Created {} intent {} for participation {} (payment {})",
        state.payments.provider_name(),
        intent.id,
        participant.id,
        payment.id
    );

    Ok(PaymentIntentCreated {
        client_secret: intent.client_secret,
        payment_id: payment.id,
        amount: payment.amount_cents,
        currency: payment.currency,
    })
}

/// Automatic flow: reserve a seat as `active` and charge the saved card
/// off-session, all inside one IMMEDIATE transaction. Anything short of a
/// synchronous success rolls the reservation back.
pub async fn join_and_charge_automatically(
    state: &AppState,
    ride_id: &str,
    user_id: &str,
) -> Result<AutomaticJoin> {
    // Never take a charge that the payments table would refuse to record.
    state.join_fee.validate()?;

    let tx = ImmediateTx::begin(&state.db)?;

    let user = queries::get_user_by_id(&tx, user_id)?.or_not_found(msg::USER_NOT_FOUND)?;
    let reservation = participation::reserve(&tx, ride_id, user_id, Settlement::SettleNow)?;

    let Some((customer_id, payment_method_id)) = user.saved_payment_method() else {
        return Err(AppError::BadRequest(msg::NO_PAYMENT_METHOD.into()));
    };

    let fee = &state.join_fee;
    let charge = OffSessionCharge {
        amount_cents: fee.amount_cents,
        currency: fee.currency.clone(),
        customer_id: customer_id.to_string(),
        payment_method_id: payment_method_id.to_string(),
        metadata: ChargeMetadata {
            user_id: user_id.to_string(),
            ride_id: ride_id.to_string(),
            participant_id: Some(reservation.participant.id.clone()),
        },
    };

    // The write lock is held across this call.
    let outcome = match state.payments.charge_off_session(&charge).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // We can't tell whether the card was charged; the reservation is
            // rolled back and the caller must check before retrying.
            tracing::error!(
                "Off-session charge for user {} on ride {} failed at the provider: {}",
                user_id,
                ride_id,
                e
            );
            return Err(e);
        }
    };

    let intent_id = match outcome {
        ChargeOutcome::Succeeded { intent_id } => intent_id,
        ChargeOutcome::RequiresAction { intent_id } => {
            tracing::info!(
                "Off-session charge for user {} on ride {} needs authentication (intent {:?})",
                user_id,
                ride_id,
                intent_id
            );
            return Err(AppError::PaymentFailed(msg::AUTOMATIC_PAYMENT_FAILED.into()));
        }
        ChargeOutcome::Declined { intent_id, reason } => {
            tracing::info!(
                "Off-session charge for user {} on ride {} declined (intent {:?}): {}",
                user_id,
                ride_id,
                intent_id,
                reason
            );
            return Err(AppError::PaymentFailed(msg::AUTOMATIC_PAYMENT_FAILED.into()));
        }
    };

    let payment = queries::create_payment(
        &tx,
        &CreatePayment {
            user_id: user_id.to_string(),
            ride_id: ride_id.to_string(),
            participant_id: Some(reservation.participant.id.clone()),
            provider_intent_id: intent_id.clone(),
            status: PaymentStatus::Succeeded,
            amount_cents: fee.amount_cents,
            currency: fee.currency.clone(),
        },
    )
    .inspect_err(|e| {
        tracing::error!(
            "Charge {} succeeded but recording payment for user {} on ride {} failed: {}",
            intent_id,
            user_id,
            ride_id,
            e
        );
    })?;

    tx.commit().inspect_err(|e| {
        tracing::error!(
            "Charge {} succeeded but commit failed for user {} on ride {}: {}",
            intent_id,
            user_id,
            ride_id,
            e
        );
    })?;

    tracing::info!(
        "User {} joined ride {} with automatic payment {} (intent {}{})",
        user_id,
        ride_id,
        payment.id,
        intent_id,
        if reservation.rejoined { ", rejoined" } else { "" }
    );

    Ok(AutomaticJoin {
        participant: reservation.participant,
        payment,
        rejoined: reservation.rejoined,
    })
}

/// Find or create the provider customer for `user_id` and start a setup
/// intent so the card can later be charged off-session. The card itself is
/// stored when the `setup_intent.succeeded` webhook arrives.
pub async fn create_setup_intent(state: &AppState, user_id: &str) -> Result<SetupIntentCreated> {
    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_id(&conn, user_id)?.or_not_found(msg::USER_NOT_FOUND)?
    };

    let customer_id = match user.stripe_customer_id.clone() {
        Some(id) => id,
        None => {
            let id = state.payments.create_customer(&user).await?;
            let conn = state.db.get()?;
            queries::set_stripe_customer_id(&conn, user_id, &id)?;
            tracing::info!("Created {} customer {} for user {}", state.payments.provider_name(), id, user_id);
            id
        }
    };

    let intent = state.payments.create_setup_intent(&customer_id, user_id).await?;

    Ok(SetupIntentCreated {
        client_secret: intent.client_secret,
        customer_id,
    })
}
