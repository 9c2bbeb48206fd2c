//! Payment provider webhook handler.
//!
//! The provider signs the raw body with HMAC-SHA256; a bad or missing
//! signature is rejected before anything is parsed. Verified
//! `checkout.completed` events credit the buyer exactly once per
//! purchase id. Events the service cannot act on (unknown price tier,
//! unknown user, unhandled type) are logged and acknowledged with 200
//! so the provider does not retry forever.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use adforge_core::UserId;
use adforge_store::{Store, StoreError};

use crate::crypto::verify_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Payment webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    /// Event ID.
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: PaymentEventData,
}

/// Checkout data carried by `checkout.completed` events.
#[derive(Debug, Deserialize)]
pub struct PaymentEventData {
    /// The provider's purchase (checkout session) id. Idempotency key.
    pub purchase_id: String,
    /// The buying user, passed through checkout metadata.
    pub user_id: String,
    /// The provider's price identifier for the purchased tier.
    pub price_id: String,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was received.
    pub received: bool,
}

/// Handle payment provider webhooks.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Verify the signature over the raw body before parsing anything.
    if let Some(secret) = &state.config.payment_webhook_secret {
        let signature = headers
            .get("x-webhook-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidSignature)?;

        verify_signature(&body, signature, secret).map_err(|e| {
            tracing::warn!(error = %e, "Invalid payment webhook signature");
            ApiError::InvalidSignature
        })?;
    } else {
        // No secret configured - skip verification (development mode)
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not configured - skipping signature verification");
    }

    // Past signature verification, a failure status only provokes
    // redelivery of the same body; malformed payloads are logged for
    // manual review and acknowledged.
    let event: PaymentEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "Unparseable payment webhook - acknowledged without processing");
            return Ok(Json(WebhookResponse { received: true }));
        }
    };

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Received payment webhook"
    );

    match event.event_type.as_str() {
        "checkout.completed" => handle_checkout_completed(&state, &event.data)?,
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled payment event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Credit the buyer for a completed checkout.
///
/// Every early return here is an acknowledgement: once the signature
/// has verified, refusing the event would only make the provider
/// redeliver it.
fn handle_checkout_completed(state: &AppState, data: &PaymentEventData) -> Result<(), ApiError> {
    let Some(credits) = state.config.pricing.credits_for_tier(&data.price_id) else {
        tracing::warn!(
            price_id = %data.price_id,
            purchase_id = %data.purchase_id,
            "Unknown price tier in completed checkout - acknowledged without crediting"
        );
        return Ok(());
    };

    let Ok(user_id) = data.user_id.parse::<UserId>() else {
        tracing::warn!(
            user_id = %data.user_id,
            purchase_id = %data.purchase_id,
            "Malformed user id in completed checkout - acknowledged without crediting"
        );
        return Ok(());
    };

    match state
        .store
        .credit_purchase(&user_id, credits, &data.purchase_id)
    {
        Ok(outcome) if outcome.replayed => {
            tracing::info!(
                purchase_id = %data.purchase_id,
                "Duplicate purchase delivery - already credited"
            );
            Ok(())
        }
        Ok(outcome) => {
            tracing::info!(
                user_id = %user_id,
                purchase_id = %data.purchase_id,
                credits,
                balance = outcome.balance,
                "Purchase credited"
            );
            Ok(())
        }
        Err(StoreError::NotFound { .. }) => {
            tracing::warn!(
                user_id = %user_id,
                purchase_id = %data.purchase_id,
                "Completed checkout for unknown user - acknowledged without crediting"
            );
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
