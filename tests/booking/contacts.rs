//! Contact visibility

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_creator_and_active_participants_see_contacts() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let zoe = create_test_user(&conn, "Zoe");
    let ana = create_test_user(&conn, "Ana");
    let pending = create_test_user(&conn, "Pending");
    let ride = create_test_ride(&conn, &driver.id, 4);
    insert_participant(&conn, &ride.id, &zoe.id, ParticipantStatus::Active);
    insert_participant(&conn, &ride.id, &ana.id, ParticipantStatus::Active);
    booking::join_ride(&mut conn, &ride.id, &pending.id).unwrap();

    for viewer in [&driver, &zoe] {
        let contacts = booking::ride_contacts(&conn, &ride.id, &viewer.id).unwrap();
        let names: Vec<&str> = contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Driver", "Ana", "Zoe"]);
        assert!(contacts[0].is_creator);
        assert!(contacts[1..].iter().all(|c| !c.is_creator));
    }
}

#[test]
fn test_others_cannot_see_contacts() {
    let env = TestEnv::new();
    let mut conn = env.conn();
    let driver = create_test_user(&conn, "Driver");
    let pending = create_test_user(&conn, "Pending");
    let stranger = create_test_user(&conn, "Stranger");
    let leaver = create_test_user(&conn, "Leaver");
    let ride = create_test_ride(&conn, &driver.id, 4);
    booking::join_ride(&mut conn, &ride.id, &pending.id).unwrap();
    insert_participant(&conn, &ride.id, &leaver.id, ParticipantStatus::Active);
    booking::leave_ride(&mut conn, &ride.id, &leaver.id).unwrap();

    for viewer in [&pending, &stranger, &leaver] {
        let err = booking::ride_contacts(&conn, &ride.id, &viewer.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)), "{}", viewer.name);
    }
}
