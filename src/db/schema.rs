use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every start.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (identity comes from the session token; these rows carry
        -- the contact handle and stored payment references)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            stripe_customer_id TEXT UNIQUE,
            stripe_payment_method_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Rides. total_seats never changes after insert.
        CREATE TABLE IF NOT EXISTS rides (
            id TEXT PRIMARY KEY,
            creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            origin_name TEXT NOT NULL,
            origin_lat REAL,
            origin_lon REAL,
            destination_name TEXT NOT NULL,
            destination_lat REAL,
            destination_lon REAL,
            departure_date TEXT NOT NULL,   -- YYYY-MM-DD
            departure_time TEXT NOT NULL,   -- HH:MM
            total_seats INTEGER NOT NULL CHECK (total_seats BETWEEN 1 AND 5),
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'archived', 'cancelled')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rides_creator ON rides(creator_id);
        CREATE INDEX IF NOT EXISTS idx_rides_status_departure
            ON rides(status, departure_date, departure_time);

        -- Participants: at most one row per (user, ride) for the life of the ride.
        CREATE TABLE IF NOT EXISTS participants (
            id TEXT PRIMARY KEY,
            ride_id TEXT NOT NULL REFERENCES rides(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL
                CHECK (status IN ('pending_payment', 'active', 'left', 'cancelled_ride')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            UNIQUE(user_id, ride_id)
        );
        CREATE INDEX IF NOT EXISTS idx_participants_ride_status ON participants(ride_id, status);

        -- Payments: one row per provider intent, never deleted.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            ride_id TEXT NOT NULL REFERENCES rides(id) ON DELETE CASCADE,
            participant_id TEXT REFERENCES participants(id) ON DELETE SET NULL,
            provider_intent_id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK (status IN ('pending', 'succeeded', 'failed')),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            currency TEXT NOT NULL CHECK (length(currency) = 3),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_participant ON payments(participant_id);
        CREATE INDEX IF NOT EXISTS idx_payments_ride ON payments(ride_id);
        "#,
    )
}
