//! Webhook reconciliation against local state

#[path = "../common/mod.rs"]
mod common;
use common::*;

use rideshare::handlers::webhooks::common::{
    ChargeData, PaymentMethodData, Reconciliation, WebhookEvent, process_charge_failed,
    process_charge_succeeded, process_event, process_payment_method_saved,
};

fn charge(intent_id: &str) -> ChargeData {
    ChargeData {
        intent_id: intent_id.to_string(),
        failure_reason: None,
    }
}

/// A pending participant with a pending payment under `intent_id`.
fn pending_rider(env: &TestEnv, seats: i64, intent_id: &str) -> (Ride, Participant) {
    let conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let rider = create_test_user(&conn, "Rider");
    let ride = create_test_ride(&conn, &driver.id, seats);
    let participant = insert_participant(&conn, &ride.id, &rider.id, ParticipantStatus::PendingPayment);
    insert_pending_payment(&conn, &participant, intent_id);
    (ride, participant)
}

#[test]
fn test_charge_succeeded_activates_participant() {
    let env = TestEnv::new();
    let (ride, participant) = pending_rider(&env, 2, "pi_ok");
    let mut conn = env.conn();

    let outcome = process_charge_succeeded(&mut conn, &charge("pi_ok")).unwrap();

    assert_eq!(
        outcome,
        Reconciliation {
            payment_updated: true,
            participant_activated: true,
            seat_unavailable: false,
        }
    );
    assert_eq!(payment_status(&conn, "pi_ok"), Some(PaymentStatus::Succeeded));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::Active)
    );
}

#[test]
fn test_charge_succeeded_replay_is_noop() {
    let env = TestEnv::new();
    let (ride, _) = pending_rider(&env, 2, "pi_replay");
    let mut conn = env.conn();

    process_charge_succeeded(&mut conn, &charge("pi_replay")).unwrap();
    let replay = process_charge_succeeded(&mut conn, &charge("pi_replay")).unwrap();

    assert_eq!(replay, Reconciliation::default());
    assert_eq!(queries::count_active_participants(&conn, &ride.id).unwrap(), 1);
    assert_eq!(table_count(&conn, "payments"), 1);
}

#[test]
fn test_charge_failed_keeps_participant_pending() {
    let env = TestEnv::new();
    let (ride, participant) = pending_rider(&env, 2, "pi_fail");
    let conn = env.conn();

    let outcome = process_charge_failed(
        &conn,
        &ChargeData {
            intent_id: "pi_fail".to_string(),
            failure_reason: Some("card_declined".to_string()),
        },
    )
    .unwrap();

    assert!(outcome.payment_updated);
    assert_eq!(payment_status(&conn, "pi_fail"), Some(PaymentStatus::Failed));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::PendingPayment)
    );

    let replay = process_charge_failed(&conn, &charge("pi_fail")).unwrap();
    assert!(!replay.payment_updated);
}

#[test]
fn test_late_success_does_not_resurrect_failed_payment() {
    let env = TestEnv::new();
    let (ride, participant) = pending_rider(&env, 2, "pi_late");
    let mut conn = env.conn();

    process_charge_failed(&conn, &charge("pi_late")).unwrap();
    let outcome = process_charge_succeeded(&mut conn, &charge("pi_late")).unwrap();

    assert_eq!(outcome, Reconciliation::default());
    assert_eq!(payment_status(&conn, "pi_late"), Some(PaymentStatus::Failed));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::PendingPayment)
    );
}

#[test]
fn test_unknown_intent_is_acknowledged() {
    let env = TestEnv::new();
    let mut conn = env.conn();

    let outcome = process_charge_succeeded(&mut conn, &charge("pi_unknown")).unwrap();
    assert_eq!(outcome, Reconciliation::default());

    let (status, _) = process_event(&mut conn, &WebhookEvent::ChargeSucceeded(charge("pi_unknown")));
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(table_count(&conn, "payments"), 0);
}

#[test]
fn test_success_on_full_ride_leaves_participant_pending() {
    let env = TestEnv::new();
    let (ride, participant) = pending_rider(&env, 1, "pi_full");
    let mut conn = env.conn();
    let seated = create_test_user(&conn, "Seated");
    insert_participant(&conn, &ride.id, &seated.id, ParticipantStatus::Active);

    let outcome = process_charge_succeeded(&mut conn, &charge("pi_full")).unwrap();

    assert!(outcome.payment_updated);
    assert!(outcome.seat_unavailable);
    assert!(!outcome.participant_activated);
    assert_eq!(payment_status(&conn, "pi_full"), Some(PaymentStatus::Succeeded));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::PendingPayment)
    );
    assert_eq!(queries::count_active_participants(&conn, &ride.id).unwrap(), 1);
}

#[test]
fn test_success_after_leaving_does_not_reseat() {
    let env = TestEnv::new();
    let (ride, participant) = pending_rider(&env, 2, "pi_left");
    let mut conn = env.conn();
    booking::leave_ride(&mut conn, &ride.id, &participant.user_id).unwrap();

    let outcome = process_charge_succeeded(&mut conn, &charge("pi_left")).unwrap();

    assert!(outcome.payment_updated);
    assert!(!outcome.participant_activated);
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::Left)
    );
}

#[test]
fn test_setup_intent_saves_payment_method() {
    let env = TestEnv::new();
    let conn = env.conn();
    let rider = create_test_user(&conn, "Rider");

    let saved = process_payment_method_saved(
        &conn,
        &PaymentMethodData {
            setup_intent_id: "seti_1".to_string(),
            user_id: Some(rider.id.clone()),
            customer_id: Some("cus_1".to_string()),
            payment_method_id: Some("pm_1".to_string()),
        },
    )
    .unwrap();

    assert!(saved);
    let user = queries::get_user_by_id(&conn, &rider.id).unwrap().unwrap();
    assert_eq!(user.saved_payment_method(), Some(("cus_1", "pm_1")));
}

#[test]
fn test_setup_intent_without_user_is_ignored() {
    let env = TestEnv::new();
    let conn = env.conn();

    let saved = process_payment_method_saved(
        &conn,
        &PaymentMethodData {
            setup_intent_id: "seti_2".to_string(),
            user_id: None,
            customer_id: Some("cus_2".to_string()),
            payment_method_id: Some("pm_2".to_string()),
        },
    )
    .unwrap();

    assert!(!saved);
}

#[test]
fn test_replay_after_leave_and_rejoin_does_not_reseat() {
    let env = TestEnv::new();
    let (ride, participant) = pending_rider(&env, 2, "pi_first");
    let mut conn = env.conn();

    let first = process_charge_succeeded(&mut conn, &charge("pi_first")).unwrap();
    assert!(first.participant_activated);

    booking::leave_ride(&mut conn, &ride.id, &participant.user_id).unwrap();
    let rejoined = booking::join_ride(&mut conn, &ride.id, &participant.user_id).unwrap();
    assert_eq!(rejoined.id, participant.id);
    assert_eq!(rejoined.status, ParticipantStatus::PendingPayment);

    // The old intent paid for the first stay, not for the rejoin.
    let replay = process_charge_succeeded(&mut conn, &charge("pi_first")).unwrap();

    assert_eq!(replay, Reconciliation::default());
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::PendingPayment)
    );
    assert_eq!(queries::count_active_participants(&conn, &ride.id).unwrap(), 0);
}

#[tokio::test]
async fn test_automatic_flow_webhook_is_noop() {
    let env = TestEnv::new();
    let (ride, rider) = {
        let conn = env.conn();
        let driver = create_test_user(&conn, "Driver");
        let rider = create_test_user_with_card(&conn, "Rider");
        (create_test_ride(&conn, &driver.id, 2), rider)
    };
    let joined = booking::join_and_charge_automatically(&env.state, &ride.id, &rider.id)
        .await
        .unwrap();
    let intent_id = joined.payment.provider_intent_id.clone();

    let mut conn = env.conn();
    let outcome = process_charge_succeeded(&mut conn, &charge(&intent_id)).unwrap();
    assert_eq!(outcome, Reconciliation::default());
    assert_eq!(payment_status(&conn, &intent_id), Some(PaymentStatus::Succeeded));

    // Still a no-op once the row is back in pending_payment after a rejoin.
    booking::leave_ride(&mut conn, &ride.id, &rider.id).unwrap();
    booking::join_ride(&mut conn, &ride.id, &rider.id).unwrap();
    let outcome = process_charge_succeeded(&mut conn, &charge(&intent_id)).unwrap();

    assert_eq!(outcome, Reconciliation::default());
    assert_eq!(
        participant_status(&conn, &ride.id, &rider.id),
        Some(ParticipantStatus::PendingPayment)
    );
    assert_eq!(table_count(&conn, "payments"), 1);
}
