use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result, msg};
use crate::models::User;

use super::{ChargeMetadata, ChargeOutcome, CreatedIntent, IntentRequest, OffSessionCharge, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;
/// Clock skew allowed for timestamps from the future.
const WEBHOOK_FUTURE_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    client_secret: Option<String>,
    last_payment_error: Option<StripeApiError>,
}

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
    payment_intent: Option<ErrorIntent>,
}

#[derive(Debug, Deserialize)]
struct ErrorIntent {
    id: String,
}

impl StripeApiError {
    fn reason(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.decline_code.clone())
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "card declined".to_string())
    }
}

fn metadata_fields(metadata: &ChargeMetadata) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("metadata[user_id]", metadata.user_id.clone()),
        ("metadata[ride_id]", metadata.ride_id.clone()),
    ];
    if let Some(participant_id) = &metadata.participant_id {
        fields.push(("metadata[participant_id]", participant_id.clone()));
    }
    fields
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (stripe-mock, a proxy).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.api_base, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Stripe API error: {}", e)))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentProvider(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn provider_name(&self) -> &'static str {
        "stripe"
    }

    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<CreatedIntent> {
        let mut form = vec![
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.clone()),
            ("payment_method_types[]", "card".to_string()),
        ];
        if let Some(customer_id) = &request.customer_id {
            form.push(("customer", customer_id.clone()));
        }
        form.extend(metadata_fields(&request.metadata));

        let response = self.post_form("/v1/payment_intents", &form).await?;
        let intent: IntentResponse = Self::parse(response).await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::PaymentProvider(format!("Stripe intent {} has no client secret", intent.id))
        })?;

        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
        })
    }

    async fn charge_off_session(&self, charge: &OffSessionCharge) -> Result<ChargeOutcome> {
        let mut form = vec![
            ("amount", charge.amount_cents.to_string()),
            ("currency", charge.currency.clone()),
            ("customer", charge.customer_id.clone()),
            ("payment_method", charge.payment_method_id.clone()),
            ("confirm", "true".to_string()),
            ("off_session", "true".to_string()),
        ];
        form.extend(metadata_fields(&charge.metadata));

        let response = self.post_form("/v1/payment_intents", &form).await?;

        // Card errors on confirm come back as 402 with the intent attached.
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            let envelope: ErrorEnvelope = response.json().await.map_err(|e| {
                AppError::PaymentProvider(format!("Failed to parse Stripe error: {}", e))
            })?;
            let error = envelope.error;
            let intent_id = error.payment_intent.as_ref().map(|pi| pi.id.clone());

            if error.code.as_deref() == Some("authentication_required") {
                return Ok(ChargeOutcome::RequiresAction { intent_id });
            }
            if error.error_type.as_deref() == Some("card_error") {
                return Ok(ChargeOutcome::Declined {
                    intent_id,
                    reason: error.reason(),
                });
            }
            return Err(AppError::PaymentProvider(format!(
                "Stripe charge error: {}",
                error.reason()
            )));
        }

        let intent: IntentResponse = Self::parse(response).await?;
        let outcome = match intent.status.as_str() {
            "succeeded" => ChargeOutcome::Succeeded { intent_id: intent.id },
            "requires_action" | "requires_confirmation" => ChargeOutcome::RequiresAction {
                intent_id: Some(intent.id),
            },
            other => ChargeOutcome::Declined {
                reason: intent
                    .last_payment_error
                    .as_ref()
                    .map(StripeApiError::reason)
                    .unwrap_or_else(|| format!("payment intent status: {}", other)),
                intent_id: Some(intent.id),
            },
        };

        Ok(outcome)
    }

    async fn create_customer(&self, user: &User) -> Result<String> {
        let form = vec![
            ("email", user.email.clone()),
            ("name", user.name.clone()),
            ("metadata[app_user_id]", user.id.clone()),
        ];

        let response = self.post_form("/v1/customers", &form).await?;
        let customer: CustomerResponse = Self::parse(response).await?;
        Ok(customer.id)
    }

    async fn create_setup_intent(&self, customer_id: &str, user_id: &str) -> Result<CreatedIntent> {
        let form = vec![
            ("customer", customer_id.to_string()),
            ("payment_method_types[]", "card".to_string()),
            ("usage", "off_session".to_string()),
            ("metadata[app_user_id]", user_id.to_string()),
        ];

        let response = self.post_form("/v1/setup_intents", &form).await?;
        let intent: IntentResponse = Self::parse(response).await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::PaymentProvider(format!("Stripe setup intent {} has no client secret", intent.id))
        })?;

        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
        })
    }
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`) against the raw body.
///
/// `Ok(false)` means well-formed but not authentic (wrong secret, tampered body,
/// stale or future timestamp). A header that can't be parsed is a `BadRequest`.
pub fn verify_webhook_signature(webhook_secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in signature.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.trim().strip_prefix("v1=") {
            signatures.push(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    if signatures.is_empty() {
        return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
    }

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let age = chrono::Utc::now().timestamp() - timestamp;

    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }

    if age < -WEBHOOK_FUTURE_TOLERANCE_SECS {
        tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    let expected_bytes = expected.as_bytes();

    // Stripe may send several v1 entries while a secret is being rolled.
    // Length is not secret (always 64 hex chars), so the early skip is fine.
    Ok(signatures.iter().any(|provided| {
        let provided_bytes = provided.as_bytes();
        expected_bytes.len() == provided_bytes.len() && bool::from(expected_bytes.ct_eq(provided_bytes))
    }))
}

/// Generic Stripe webhook event; `object` is parsed based on `event_type`.
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ payment_intent.succeeded / payment_intent.payment_failed ============

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

// ============ setup_intent.succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripeSetupIntent {
    pub id: String,
    pub customer: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
