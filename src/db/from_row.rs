//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors
/// instead of panicking on unexpected values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, phone, stripe_customer_id, stripe_payment_method_id, created_at, updated_at";

pub const RIDE_COLS: &str = "id, creator_id, origin_name, origin_lat, origin_lon, destination_name, destination_lat, destination_lon, departure_date, departure_time, total_seats, status, created_at, updated_at";

pub const PARTICIPANT_COLS: &str = "id, ride_id, user_id, status, created_at, updated_at";

pub const PAYMENT_COLS: &str = "id, user_id, ride_id, participant_id, provider_intent_id, status, amount_cents, currency, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            stripe_customer_id: row.get(4)?,
            stripe_payment_method_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Ride {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Ride {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            origin: Place {
                name: row.get(2)?,
                latitude: row.get(3)?,
                longitude: row.get(4)?,
            },
            destination: Place {
                name: row.get(5)?,
                latitude: row.get(6)?,
                longitude: row.get(7)?,
            },
            departure_date: row.get(8)?,
            departure_time: row.get(9)?,
            total_seats: row.get(10)?,
            status: parse_enum(row, 11, "status")?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl FromRow for Participant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Participant {
            id: row.get(0)?,
            ride_id: row.get(1)?,
            user_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            ride_id: row.get(2)?,
            participant_id: row.get(3)?,
            provider_intent_id: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            amount_cents: row.get(6)?,
            currency: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for RideContact {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(RideContact {
            user_id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            is_creator: row.get(3)?,
        })
    }
}
