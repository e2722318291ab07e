//! Delete-or-cancel of rides

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_ride_without_participants_is_deleted() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let ride = create_test_ride(&conn, &driver.id, 3);

    let removal = booking::delete_or_cancel(&mut conn, &ride.id, &driver.id).unwrap();

    assert!(!removal.was_cancelled);
    assert_eq!(removal.participants_cancelled, 0);
    assert!(queries::get_ride_by_id(&conn, &ride.id).unwrap().is_none());
}

#[test]
fn test_ride_with_participants_is_cancelled() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let ride = create_test_ride(&conn, &driver.id, 3);
    let active = create_test_user(&conn, "Active");
    let pending = create_test_user(&conn, "Pending");
    let gone = create_test_user(&conn, "Gone");
    let seat = insert_participant(&conn, &ride.id, &active.id, ParticipantStatus::Active);
    insert_participant(&conn, &ride.id, &pending.id, ParticipantStatus::PendingPayment);
    insert_participant(&conn, &ride.id, &gone.id, ParticipantStatus::Left);
    insert_pending_payment(&conn, &seat, "pi_paid");
    queries::transition_payment(&conn, "pi_paid", PaymentStatus::Pending, PaymentStatus::Succeeded)
        .unwrap();

    let removal = booking::delete_or_cancel(&mut conn, &ride.id, &driver.id).unwrap();

    assert!(removal.was_cancelled);
    assert_eq!(removal.participants_cancelled, 2);

    let ride = queries::get_ride_by_id(&conn, &ride.id).unwrap().unwrap();
    assert_eq!(ride.status, RideStatus::Cancelled);
    assert_eq!(
        participant_status(&conn, &ride.id, &active.id),
        Some(ParticipantStatus::CancelledRide)
    );
    assert_eq!(
        participant_status(&conn, &ride.id, &pending.id),
        Some(ParticipantStatus::CancelledRide)
    );
    assert_eq!(participant_status(&conn, &ride.id, &gone.id), Some(ParticipantStatus::Left));
    // No refunds.
    assert_eq!(payment_status(&conn, "pi_paid"), Some(PaymentStatus::Succeeded));
}

#[test]
fn test_only_left_rows_still_block_deletion() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let gone = create_test_user(&conn, "Gone");
    let ride = create_test_ride(&conn, &driver.id, 3);
    insert_participant(&conn, &ride.id, &gone.id, ParticipantStatus::Left);

    let removal = booking::delete_or_cancel(&mut conn, &ride.id, &driver.id).unwrap();

    assert!(removal.was_cancelled);
    assert_eq!(removal.participants_cancelled, 0);
    assert!(queries::get_ride_by_id(&conn, &ride.id).unwrap().is_some());
}

#[test]
fn test_only_creator_can_remove() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let rider = create_test_user(&conn, "Rider");
    let ride = create_test_ride(&conn, &driver.id, 3);

    let err = booking::delete_or_cancel(&mut conn, &ride.id, &rider.id).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(queries::get_ride_by_id(&conn, &ride.id).unwrap().is_some());

    let err = booking::delete_or_cancel(&mut conn, "missing", &driver.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_cancelled_participants_cannot_rejoin() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let rider = create_test_user(&conn, "Rider");
    let ride = create_test_ride(&conn, &driver.id, 3);
    booking::join_ride(&mut conn, &ride.id, &rider.id).unwrap();

    booking::delete_or_cancel(&mut conn, &ride.id, &driver.id).unwrap();

    let err = booking::join_ride(&mut conn, &ride.id, &rider.id).unwrap_err();
    assert!(matches!(err, AppError::Join(JoinRejection::RideNotActive)));
}
