use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Local record of one provider payment intent. Rows are never deleted;
/// `participant_id` goes null if the participation row disappears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub ride_id: String,
    pub participant_id: Option<String>,
    pub provider_intent_id: String,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: String,
    pub ride_id: String,
    pub participant_id: Option<String>,
    pub provider_intent_id: String,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub currency: String,
}

/// Flat fee charged for joining any ride.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinFee {
    pub amount_cents: i64,
    /// ISO 4217, lowercase.
    pub currency: String,
}

impl JoinFee {
    /// Build a fee from raw settings; the currency is lowercased.
    pub fn new(amount_cents: i64, currency: &str) -> Result<Self> {
        let fee = Self {
            amount_cents,
            currency: currency.trim().to_lowercase(),
        };
        fee.validate()?;
        Ok(fee)
    }

    /// Mirrors the payments table constraints on amount and currency.
    pub fn validate(&self) -> Result<()> {
        if self.amount_cents <= 0 {
            return Err(AppError::Internal(msg::INVALID_FEE_AMOUNT.into()));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(AppError::Internal(msg::INVALID_FEE_CURRENCY.into()));
        }
        Ok(())
    }
}

impl Default for JoinFee {
    fn default() -> Self {
        Self {
            amount_cents: 200,
            currency: "eur".to_string(),
        }
    }
}
