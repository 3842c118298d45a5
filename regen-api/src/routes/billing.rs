/// Billing provider webhook
///
/// ```text
/// POST /v1/billing/webhook
/// Regen-Signature: t=1712345678,v1=<hex hmac>
///
/// { "id": "evt_1", "type": "subscription.updated", "data": { ... } }
/// ```
///
/// The signature is checked against the raw body before anything is
/// parsed. The subscription upsert, the cancellation of superseded live
/// subscriptions and the `visitor` → `member` promotion commit together.

use crate::{app::AppState, error::ApiResult};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use regen_shared::{
    access::roles::UserRole,
    billing::{verify_signature, BillingEvent, WebhookError, SIGNATURE_HEADER},
    models::{subscription::Subscription, user::User},
};
use serde::Serialize;

/// Acknowledgement returned to the provider
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub event_id: String,
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    verify_signature(
        &state.config.billing.webhook_secret,
        signature,
        &body,
        Utc::now().timestamp(),
    )?;

    let event = BillingEvent::parse(&body)?;
    let update = event.to_update();

    let mut tx = state.db.begin().await?;

    let subscription = Subscription::apply_update(&mut *tx, update).await?;

    // Paying customers are at least members; never demotes
    let promoted = if subscription.status.is_live() {
        User::promote_to(&mut *tx, subscription.user_id, UserRole::Member).await?
    } else {
        false
    };

    tx.commit().await?;

    tracing::info!(
        event_id = %event.id,
        user_id = %subscription.user_id,
        plan = subscription.plan.as_str(),
        status = subscription.status.as_str(),
        promoted,
        "Processed billing webhook"
    );

    Ok(Json(WebhookAck {
        received: true,
        event_id: event.id,
    }))
}
