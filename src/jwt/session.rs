use std::collections::HashSet;
use std::sync::Arc;

use jwt_simple::prelude::*;

use crate::error::{AppError, Result};

const ISSUER: &str = "rideshare";

/// HS256 keys for the bearer tokens that identify a user to the API.
///
/// Account management lives elsewhere; this only issues and checks
/// `sub = user_id` tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: Arc<HS256Key>,
}

impl SessionKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: Arc::new(HS256Key::from_bytes(secret.as_bytes())),
        }
    }

    pub fn issue(&self, user_id: &str, valid_for_secs: u64) -> Result<String> {
        let claims = Claims::create(Duration::from_secs(valid_for_secs))
            .with_issuer(ISSUER)
            .with_subject(user_id);

        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Returns the user id carried by a valid token.
    pub fn verify(&self, token: &str) -> Result<String> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from_strings(&[ISSUER])),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|e| {
                tracing::debug!("Rejected session token: {}", e);
                AppError::Unauthorized
            })?;

        claims.subject.ok_or(AppError::Unauthorized)
    }
}
