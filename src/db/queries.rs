use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, ErrorCode, ToSql, params};
use uuid::Uuid;

use crate::error::{AppError, JoinRejection, Result};
use crate::models::*;

use super::from_row::{
    PARTICIPANT_COLS, PAYMENT_COLS, RIDE_COLS, USER_COLS, query_all, query_one,
};

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// `?N, ?N+1, ...` for an IN list starting at parameter `first`.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO users (id, email, name, phone, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, input.email.trim(), input.name.trim(), input.phone.trim(), now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("email {} is already registered", input.email))
        } else {
            e.into()
        }
    })?;

    Ok(User {
        id,
        email: input.email.trim().to_string(),
        name: input.name.trim().to_string(),
        phone: input.phone.trim().to_string(),
        stripe_customer_id: None,
        stripe_payment_method_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn set_stripe_customer_id(conn: &Connection, user_id: &str, customer_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET stripe_customer_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![customer_id, now(), user_id],
    )?;
    Ok(affected > 0)
}

/// Store the default payment method saved through a setup intent. The customer
/// reference is only filled in if the user does not have one yet.
pub fn save_payment_method(
    conn: &Connection,
    user_id: &str,
    payment_method_id: &str,
    customer_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users
         SET stripe_payment_method_id = ?1,
             stripe_customer_id = COALESCE(stripe_customer_id, ?2),
             updated_at = ?3
         WHERE id = ?4",
        params![payment_method_id, customer_id, now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Rides ============

/// Departure is stored zero-padded (`YYYY-MM-DD`, `HH:MM`) so that the
/// archive sweep can compare it as text.
pub fn create_ride(conn: &Connection, creator_id: &str, input: &CreateRide) -> Result<Ride> {
    let departs_at = input.departs_at()?;
    let departure_date = departs_at.format(DATE_FORMAT).to_string();
    let departure_time = departs_at.format(TIME_FORMAT).to_string();
    let id = gen_id();
    let now = now();
    conn.execute(
        &format!(
            "INSERT INTO rides ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            RIDE_COLS
        ),
        params![
            &id,
            creator_id,
            input.origin.name.trim(),
            input.origin.latitude,
            input.origin.longitude,
            input.destination.name.trim(),
            input.destination.latitude,
            input.destination.longitude,
            &departure_date,
            &departure_time,
            input.total_seats,
            RideStatus::Active.as_ref(),
            now,
        ],
    )?;

    Ok(Ride {
        id,
        creator_id: creator_id.to_string(),
        origin: Place {
            name: input.origin.name.trim().to_string(),
            ..input.origin.clone()
        },
        destination: Place {
            name: input.destination.name.trim().to_string(),
            ..input.destination.clone()
        },
        departure_date,
        departure_time,
        total_seats: input.total_seats,
        status: RideStatus::Active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_ride_by_id(conn: &Connection, id: &str) -> Result<Option<Ride>> {
    query_one(
        conn,
        &format!("SELECT {} FROM rides WHERE id = ?1", RIDE_COLS),
        &[&id],
    )
}

pub fn set_ride_status(conn: &Connection, id: &str, status: RideStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE rides SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_ref(), now(), id],
    )?;
    Ok(affected > 0)
}

/// Hard delete. Participant and payment rows cascade.
pub fn delete_ride(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM rides WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// Seats currently held on a ride.
pub fn count_active_participants(conn: &Connection, ride_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM participants WHERE ride_id = ?1 AND status = ?2",
        params![ride_id, ParticipantStatus::Active.as_ref()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Every participation row of a ride, whatever its status.
pub fn count_participants(conn: &Connection, ride_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM participants WHERE ride_id = ?1",
        params![ride_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Move active rides whose departure is at or before `cutoff` to archived.
pub fn archive_departed_rides(conn: &Connection, cutoff: NaiveDateTime) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE rides SET status = ?1, updated_at = ?2
         WHERE status = ?3 AND (departure_date || ' ' || departure_time) <= ?4",
        params![
            RideStatus::Archived.as_ref(),
            now(),
            RideStatus::Active.as_ref(),
            format!("{} {}", cutoff.format(DATE_FORMAT), cutoff.format(TIME_FORMAT)),
        ],
    )?;
    Ok(affected)
}

// ============ Participants ============

/// Insert a participation row. A concurrent duplicate surfaces as
/// `AlreadyJoined` rather than a raw constraint error.
pub fn create_participant(
    conn: &Connection,
    ride_id: &str,
    user_id: &str,
    status: ParticipantStatus,
) -> Result<Participant> {
    let id = gen_id();
    let now = now();
    conn.execute(
        &format!(
            "INSERT INTO participants ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            PARTICIPANT_COLS
        ),
        params![&id, ride_id, user_id, status.as_ref(), now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Join(JoinRejection::AlreadyJoined)
        } else {
            e.into()
        }
    })?;

    Ok(Participant {
        id,
        ride_id: ride_id.to_string(),
        user_id: user_id.to_string(),
        status,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_participant(conn: &Connection, ride_id: &str, user_id: &str) -> Result<Option<Participant>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM participants WHERE ride_id = ?1 AND user_id = ?2",
            PARTICIPANT_COLS
        ),
        &[&ride_id, &user_id],
    )
}

pub fn get_participant_by_id(conn: &Connection, id: &str) -> Result<Option<Participant>> {
    query_one(
        conn,
        &format!("SELECT {} FROM participants WHERE id = ?1", PARTICIPANT_COLS),
        &[&id],
    )
}

pub fn list_ride_participants(conn: &Connection, ride_id: &str) -> Result<Vec<Participant>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM participants WHERE ride_id = ?1 ORDER BY created_at, id",
            PARTICIPANT_COLS
        ),
        &[&ride_id],
    )
}

/// Guarded status change: only applies while the row is in `from`.
/// Returns whether a row was updated.
pub fn transition_participant(
    conn: &Connection,
    id: &str,
    from: ParticipantStatus,
    to: ParticipantStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE participants SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_ref(), now(), id, from.as_ref()],
    )?;
    Ok(affected > 0)
}

/// Move every participant of a ride currently in one of `from` to `to`.
pub fn transition_ride_participants(
    conn: &Connection,
    ride_id: &str,
    from: &[ParticipantStatus],
    to: ParticipantStatus,
) -> Result<usize> {
    if from.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "UPDATE participants SET status = ?1, updated_at = ?2 WHERE ride_id = ?3 AND status IN ({})",
        placeholders(4, from.len())
    );
    let from: Vec<&str> = from.iter().map(|s| s.as_ref()).collect();
    let to = to.as_ref();
    let now = now();
    let mut values: Vec<&dyn ToSql> = vec![&to, &now, &ride_id];
    for status in &from {
        values.push(status);
    }

    Ok(conn.execute(&sql, values.as_slice())?)
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let id = gen_id();
    let now = now();
    conn.execute(
        &format!(
            "INSERT INTO payments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            PAYMENT_COLS
        ),
        params![
            &id,
            &input.user_id,
            &input.ride_id,
            &input.participant_id,
            &input.provider_intent_id,
            input.status.as_ref(),
            input.amount_cents,
            &input.currency,
            now,
        ],
    )?;

    Ok(Payment {
        id,
        user_id: input.user_id.clone(),
        ride_id: input.ride_id.clone(),
        participant_id: input.participant_id.clone(),
        provider_intent_id: input.provider_intent_id.clone(),
        status: input.status,
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_payment_by_intent(conn: &Connection, provider_intent_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE provider_intent_id = ?1",
            PAYMENT_COLS
        ),
        &[&provider_intent_id],
    )
}

pub fn list_ride_payments(conn: &Connection, ride_id: &str) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE ride_id = ?1 ORDER BY created_at, id",
            PAYMENT_COLS
        ),
        &[&ride_id],
    )
}

/// Guarded status change keyed by provider intent id. Returns whether a row
/// was updated; `false` means the intent is unknown or already left `from`.
pub fn transition_payment(
    conn: &Connection,
    provider_intent_id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET status = ?1, updated_at = ?2
         WHERE provider_intent_id = ?3 AND status = ?4",
        params![to.as_ref(), now(), provider_intent_id, from.as_ref()],
    )?;
    Ok(affected > 0)
}

// ============ Contacts ============

/// Creator first, then active participants by name.
pub fn list_ride_contacts(conn: &Connection, ride_id: &str) -> Result<Vec<RideContact>> {
    query_all(
        conn,
        "SELECT u.id, u.name, u.phone, 1 AS is_creator
         FROM rides r JOIN users u ON u.id = r.creator_id
         WHERE r.id = ?1
         UNION ALL
         SELECT u.id, u.name, u.phone, 0 AS is_creator
         FROM participants p JOIN users u ON u.id = p.user_id
         WHERE p.ride_id = ?1 AND p.status = ?2
         ORDER BY 4 DESC, 2",
        &[&ride_id, &ParticipantStatus::Active.as_ref()],
    )
}
