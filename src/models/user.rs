use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

/// Basic email format validation.
///
/// Permissive on purpose: one `@`, a non-empty local part, and a dotted domain.
fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let Some((local_part, domain_part)) = email.split_once('@') else {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    };

    if local_part.is_empty() || local_part.contains(' ') || domain_part.contains('@') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if !domain_part.contains('.') || domain_part.starts_with('.') || domain_part.ends_with('.') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

/// A rider or driver. Identity itself comes from the session token; this row
/// holds what the booking flows need: a contact handle and stored payment references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Contact handle shared with co-riders (phone / messaging number).
    pub phone: String,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_payment_method_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Customer and payment method pair usable for off-session charges.
    pub fn saved_payment_method(&self) -> Option<(&str, &str)> {
        match (&self.stripe_customer_id, &self.stripe_payment_method_id) {
            (Some(customer), Some(method)) => Some((customer, method)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub phone: String,
}

impl CreateUser {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)?;
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        if self.phone.trim().is_empty() {
            return Err(AppError::BadRequest(msg::PHONE_EMPTY.into()));
        }
        Ok(())
    }
}

/// One entry of a ride's contact list.
#[derive(Debug, Clone, Serialize)]
pub struct RideContact {
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub is_creator: bool,
}
