mod from_row;
mod immediate;
mod schema;
pub mod queries;

pub use immediate::ImmediateTx;
pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::jwt::SessionKeys;
use crate::models::JoinFee;
use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment provider port (Stripe in production, a fake in tests).
    pub payments: Arc<dyn PaymentGateway>,
    /// Signing secret for incoming provider webhooks.
    pub webhook_secret: String,
    pub sessions: SessionKeys,
    pub join_fee: JoinFee,
}

/// Open a pool on a database file. Every connection enforces foreign keys
/// and waits up to `busy_timeout` for the write lock before failing.
pub fn create_pool(
    database_path: &str,
    max_size: u32,
    busy_timeout: Duration,
) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(max_size).build(manager)
}
