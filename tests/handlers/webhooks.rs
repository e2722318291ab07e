//! Stripe webhook endpoint: signatures, event routing and redelivery

#[path = "../common/mod.rs"]
mod common;
use common::*;

use axum::http::StatusCode;
use rideshare::payments::verify_webhook_signature;

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// 10 minutes ago, outside the 5 minute tolerance.
fn old_timestamp() -> i64 {
    current_timestamp() - 600
}

fn signature_at(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_stripe_signature(payload, secret, timestamp)
    )
}

// ============ Signature verification ============

#[test]
fn test_stripe_valid_signature() {
    let payload = br#"{"type":"payment_intent.succeeded"}"#;
    let header = signature_at(payload, WEBHOOK_SECRET, current_timestamp());
    assert!(verify_webhook_signature(WEBHOOK_SECRET, payload, &header).unwrap());
}

#[test]
fn test_stripe_wrong_secret() {
    let payload = br#"{"type":"payment_intent.succeeded"}"#;
    let header = signature_at(payload, "whsec_other", current_timestamp());
    assert!(!verify_webhook_signature(WEBHOOK_SECRET, payload, &header).unwrap());
}

#[test]
fn test_stripe_tampered_payload() {
    let payload = br#"{"type":"payment_intent.succeeded"}"#;
    let header = signature_at(payload, WEBHOOK_SECRET, current_timestamp());
    let tampered = br#"{"type":"payment_intent.payment_failed"}"#;
    assert!(!verify_webhook_signature(WEBHOOK_SECRET, tampered, &header).unwrap());
}

#[test]
fn test_stripe_old_timestamp() {
    let payload = br#"{}"#;
    let header = signature_at(payload, WEBHOOK_SECRET, old_timestamp());
    assert!(!verify_webhook_signature(WEBHOOK_SECRET, payload, &header).unwrap());
}

#[test]
fn test_stripe_future_timestamp() {
    let payload = br#"{}"#;
    let header = signature_at(payload, WEBHOOK_SECRET, current_timestamp() + 600);
    assert!(!verify_webhook_signature(WEBHOOK_SECRET, payload, &header).unwrap());
}

#[test]
fn test_stripe_any_matching_v1_is_accepted() {
    let payload = br#"{}"#;
    let timestamp = current_timestamp();
    let header = format!(
        "t={},v1={},v1={}",
        timestamp,
        "0".repeat(64),
        compute_stripe_signature(payload, WEBHOOK_SECRET, timestamp)
    );
    assert!(verify_webhook_signature(WEBHOOK_SECRET, payload, &header).unwrap());
}

#[test]
fn test_stripe_malformed_header() {
    let payload = br#"{}"#;
    assert!(verify_webhook_signature(WEBHOOK_SECRET, payload, "garbage").is_err());
    assert!(verify_webhook_signature(WEBHOOK_SECRET, payload, "t=abc,v1=00").is_err());
    assert!(verify_webhook_signature(WEBHOOK_SECRET, payload, "t=123").is_err());
}

// ============ Endpoint ============

#[tokio::test]
async fn test_webhook_missing_signature_is_400() {
    let env = TestEnv::new();
    let payload = serde_json::to_vec(&payment_intent_event("payment_intent.succeeded", "pi_x")).unwrap();
    let (status, _) = post_webhook(env.app(), &payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_bad_signature_is_400_and_changes_nothing() {
    let env = TestEnv::new();
    let (ride, participant) = {
        let conn = env.conn();
        let driver = create_test_user(&conn, "Driver");
        let rider = create_test_user(&conn, "Rider");
        let ride = create_test_ride(&conn, &driver.id, 2);
        let participant = insert_participant(&conn, &ride.id, &rider.id, ParticipantStatus::PendingPayment);
        insert_pending_payment(&conn, &participant, "pi_forged");
        (ride, participant)
    };
    let payload = serde_json::to_vec(&payment_intent_event("payment_intent.succeeded", "pi_forged")).unwrap();
    let header = signature_at(&payload, "whsec_attacker", current_timestamp());

    let (status, _) = post_webhook(env.app(), &payload, Some(header.as_str())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let conn = env.conn();
    assert_eq!(payment_status(&conn, "pi_forged"), Some(PaymentStatus::Pending));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::PendingPayment)
    );
}

#[tokio::test]
async fn test_webhook_invalid_json_is_400() {
    let env = TestEnv::new();
    let payload = b"not json";
    let (status, _) = post_webhook(env.app(), payload, Some(stripe_signature_header(payload).as_str())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_succeeded_then_replayed() {
    let env = TestEnv::new();
    let (ride, participant) = {
        let conn = env.conn();
        let driver = create_test_user(&conn, "Driver");
        let rider = create_test_user(&conn, "Rider");
        let ride = create_test_ride(&conn, &driver.id, 2);
        let participant = insert_participant(&conn, &ride.id, &rider.id, ParticipantStatus::PendingPayment);
        insert_pending_payment(&conn, &participant, "pi_paid");
        (ride, participant)
    };
    let payload = serde_json::to_vec(&payment_intent_event("payment_intent.succeeded", "pi_paid")).unwrap();

    let (status, body) = post_webhook(env.app(), &payload, Some(stripe_signature_header(&payload).as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Payment succeeded");

    let (status, body) = post_webhook(env.app(), &payload, Some(stripe_signature_header(&payload).as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Already processed");

    let conn = env.conn();
    assert_eq!(payment_status(&conn, "pi_paid"), Some(PaymentStatus::Succeeded));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::Active)
    );
    assert_eq!(queries::count_active_participants(&conn, &ride.id).unwrap(), 1);
}

#[tokio::test]
async fn test_webhook_payment_failed() {
    let env = TestEnv::new();
    let (ride, participant) = {
        let conn = env.conn();
        let driver = create_test_user(&conn, "Driver");
        let rider = create_test_user(&conn, "Rider");
        let ride = create_test_ride(&conn, &driver.id, 2);
        let participant = insert_participant(&conn, &ride.id, &rider.id, ParticipantStatus::PendingPayment);
        insert_pending_payment(&conn, &participant, "pi_declined");
        (ride, participant)
    };
    let payload =
        serde_json::to_vec(&payment_intent_event("payment_intent.payment_failed", "pi_declined")).unwrap();

    let (status, body) = post_webhook(env.app(), &payload, Some(stripe_signature_header(&payload).as_str())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Payment failed");
    let conn = env.conn();
    assert_eq!(payment_status(&conn, "pi_declined"), Some(PaymentStatus::Failed));
    assert_eq!(
        participant_status(&conn, &ride.id, &participant.user_id),
        Some(ParticipantStatus::PendingPayment)
    );
}

#[tokio::test]
async fn test_webhook_unknown_intent_is_acknowledged() {
    let env = TestEnv::new();
    let payload = serde_json::to_vec(&payment_intent_event("payment_intent.succeeded", "pi_nobody")).unwrap();
    let (status, _) = post_webhook(env.app(), &payload, Some(stripe_signature_header(&payload).as_str())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_setup_intent_saves_card() {
    let env = TestEnv::new();
    let rider = create_test_user(&env.conn(), "Rider");
    let payload = serde_json::to_vec(&setup_intent_event("seti_1", &rider.id, "cus_9", "pm_9")).unwrap();

    let (status, body) = post_webhook(env.app(), &payload, Some(stripe_signature_header(&payload).as_str())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Payment method saved");
    let user = queries::get_user_by_id(&env.conn(), &rider.id).unwrap().unwrap();
    assert_eq!(user.saved_payment_method(), Some(("cus_9", "pm_9")));
}

#[tokio::test]
async fn test_webhook_other_events_are_ignored() {
    let env = TestEnv::new();
    let payload = serde_json::to_vec(&serde_json::json!({
        "id": "evt_1",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    }))
    .unwrap();

    let (status, body) = post_webhook(env.app(), &payload, Some(stripe_signature_header(&payload).as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Event ignored");
}
