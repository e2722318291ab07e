use std::ops::Deref;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use super::DbPool;
use crate::error::Result;

/// An IMMEDIATE transaction that owns its pooled connection.
///
/// `rusqlite::Transaction` borrows the connection and is not `Send`, so it
/// cannot be held across an `.await`. This one can: the write lock is taken
/// at `begin` and held until `commit` or drop, which rolls back.
///
/// SQLite has no row locks; holding the database write lock is what
/// serializes seat reservations. On PostgreSQL this would be
/// `SELECT ... FOR UPDATE` on the ride row.
pub struct ImmediateTx {
    conn: PooledConnection<SqliteConnectionManager>,
    finished: bool,
}

impl ImmediateTx {
    pub fn begin(pool: &DbPool) -> Result<Self> {
        let conn = pool.get()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // A failed COMMIT can leave the transaction open; don't hand a
            // connection mid-transaction back to the pool.
            if !self.conn.is_autocommit() {
                let _ = self.conn.execute_batch("ROLLBACK");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

impl Deref for ImmediateTx {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for ImmediateTx {
    fn drop(&mut self) {
        if !self.finished
            && let Err(e) = self.conn.execute_batch("ROLLBACK")
        {
            tracing::error!("Failed to roll back transaction: {}", e);
        }
    }
}
