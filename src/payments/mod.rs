//! Payment processor port.
//!
//! Booking code talks to [`PaymentGateway`]; [`StripeClient`] is the
//! production adapter. Amounts are always minor units with a lowercase
//! ISO 4217 currency.

mod stripe;

pub use stripe::*;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::User;

/// Ids echoed back to us as intent metadata on webhook events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChargeMetadata {
    pub user_id: String,
    pub ride_id: String,
    pub participant_id: Option<String>,
}

/// A client-confirmed charge (manual flow).
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub customer_id: Option<String>,
    pub metadata: ChargeMetadata,
}

/// A server-confirmed charge against a saved payment method (automatic flow).
#[derive(Debug, Clone)]
pub struct OffSessionCharge {
    pub amount_cents: i64,
    pub currency: String,
    pub customer_id: String,
    pub payment_method_id: String,
    pub metadata: ChargeMetadata,
}

/// An intent the client has to confirm with `client_secret`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

/// Synchronous result of an off-session charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded { intent_id: String },
    /// The card needs the customer present (3DS and similar).
    RequiresAction { intent_id: Option<String> },
    Declined {
        intent_id: Option<String>,
        reason: String,
    },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;

    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<CreatedIntent>;

    /// Attempt a charge without the customer present. Transport and API
    /// failures are errors; a refused card is `Ok` with a non-success outcome.
    async fn charge_off_session(&self, charge: &OffSessionCharge) -> Result<ChargeOutcome>;

    /// Create a processor customer for `user` and return its id.
    async fn create_customer(&self, user: &User) -> Result<String>;

    /// Start saving a card for off-session use.
    async fn create_setup_intent(&self, customer_id: &str, user_id: &str) -> Result<CreatedIntent>;
}
