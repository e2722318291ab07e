use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::AppState;
use crate::payments::{
    StripePaymentIntent, StripeSetupIntent, StripeWebhookEvent, verify_webhook_signature,
};

use super::common::{ChargeData, PaymentMethodData, WebhookEvent, WebhookResult, process_event};

fn extract_signature(headers: &HeaderMap) -> Result<&str, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

fn verify(secret: &str, body: &Bytes, signature: &str) -> Result<(), WebhookResult> {
    match verify_webhook_signature(secret, body, signature) {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!("Stripe webhook rejected: signature mismatch");
            Err((StatusCode::BAD_REQUEST, "Invalid signature"))
        }
        Err(e) => {
            tracing::warn!("Stripe webhook rejected: {}", e);
            Err((StatusCode::BAD_REQUEST, "Invalid signature"))
        }
    }
}

/// Map a Stripe event onto the reconciler's vocabulary.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, WebhookResult> {
    let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    tracing::debug!(
        "Stripe webhook {} ({})",
        event.id.as_deref().unwrap_or("-"),
        event.event_type
    );

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let intent = parse_payment_intent(&event)?;
            Ok(WebhookEvent::ChargeSucceeded(ChargeData {
                intent_id: intent.id,
                failure_reason: None,
            }))
        }
        "payment_intent.payment_failed" => {
            let intent = parse_payment_intent(&event)?;
            let failure_reason = intent
                .last_payment_error
                .and_then(|e| e.message.or(e.code));
            Ok(WebhookEvent::ChargeFailed(ChargeData {
                intent_id: intent.id,
                failure_reason,
            }))
        }
        "setup_intent.succeeded" => {
            let mut intent: StripeSetupIntent = serde_json::from_value(event.data.object)
                .map_err(|e| {
                    tracing::error!("Failed to parse setup intent: {}", e);
                    (StatusCode::BAD_REQUEST, "Invalid setup intent")
                })?;
            Ok(WebhookEvent::PaymentMethodSaved(PaymentMethodData {
                user_id: intent.metadata.remove("app_user_id"),
                setup_intent_id: intent.id,
                customer_id: intent.customer,
                payment_method_id: intent.payment_method,
            }))
        }
        _ => Ok(WebhookEvent::Ignored),
    }
}

fn parse_payment_intent(event: &StripeWebhookEvent) -> Result<StripePaymentIntent, WebhookResult> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse payment intent: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid payment intent")
    })
}

fn handle(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WebhookResult {
    let signature = match extract_signature(headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    if let Err(e) = verify(&state.webhook_secret, body, signature) {
        return e;
    }

    let event = match parse_event(body) {
        Ok(e) => e,
        Err(e) => return e,
    };

    if matches!(event, WebhookEvent::Ignored) {
        return (StatusCode::OK, "Event ignored");
    }

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    process_event(&mut conn, &event)
}

/// Axum handler for Stripe webhooks.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle(&state, &headers, &body)
}
