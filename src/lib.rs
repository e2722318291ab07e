//! Rideshare - seat reservation and payment reconciliation for shared rides.
//!
//! Riders join rides with limited seats, pay a fixed fee through the payment
//! processor, and are seated once the payment is confirmed either inline
//! (off-session charge) or by webhook.

pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod payments;
