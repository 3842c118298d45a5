/// Billing webhook verification and event payloads
///
/// The billing provider posts subscription lifecycle events to
/// `POST /v1/billing/webhook`. Each request carries a signature header:
///
/// ```text
/// Regen-Signature: t=1712345678,v1=5f2b...e9
/// ```
///
/// `v1` is the hex HMAC-SHA256, keyed with the shared webhook secret, of
/// `"{t}.{raw body}"`. Requests whose timestamp is more than
/// [`SIGNATURE_TOLERANCE_SECS`] away from the server clock are rejected to
/// limit replays.
///
/// # Example
///
/// ```
/// use regen_shared::billing::{sign_payload, verify_signature};
///
/// let secret = "whsec_test";
/// let body = br#"{"id":"evt_1"}"#;
/// let header = sign_payload(secret, 1_700_000_000, body);
///
/// assert!(verify_signature(secret, &header, body, 1_700_000_030).is_ok());
/// assert!(verify_signature(secret, &header, b"tampered", 1_700_000_030).is_err());
/// ```

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::access::plan::{BillingPeriod, PlanTier, SubscriptionState};
use crate::models::subscription::SubscriptionUpdate;

/// Name of the signature header
pub const SIGNATURE_HEADER: &str = "Regen-Signature";

/// Maximum clock skew accepted between signer and server
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Error type for webhook verification and decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing Regen-Signature header")]
    MissingSignature,

    #[error("Malformed signature header")]
    MalformedSignature,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Builds the signature header value for `payload`
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signature = mac_for(secret, timestamp, payload).finalize().into_bytes();
    format!("t={},v1={}", timestamp, hex::encode(signature))
}

fn parse_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(WebhookError::MalformedSignature)?;

        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::MalformedSignature)?,
                )
            }
            "v1" => signatures.push(hex::decode(value).map_err(|_| WebhookError::MalformedSignature)?),
            // Unknown schemes are ignored so the provider can add new ones
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(WebhookError::MalformedSignature),
    }
}

/// Verifies a signature header against the raw request body
///
/// `now` is the server's Unix time. Comparison is constant-time.
///
/// # Errors
///
/// - `MalformedSignature` if the header can't be parsed
/// - `TimestampOutOfTolerance` if `t` is too far from `now`
/// - `SignatureMismatch` if no `v1` signature matches
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), WebhookError> {
    let (timestamp, signatures) = parse_header(header)?;

    let skew = now
        .checked_sub(timestamp)
        .map_or(u64::MAX, |d| d.unsigned_abs());
    if skew > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let mac = mac_for(secret, timestamp, payload);
    if signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok())
    {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Subscription lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingEventKind {
    #[serde(rename = "subscription.created")]
    SubscriptionCreated,

    #[serde(rename = "subscription.updated")]
    SubscriptionUpdated,

    #[serde(rename = "subscription.deleted")]
    SubscriptionDeleted,
}

/// Subscription object carried by an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionObject {
    /// Our user id, set as metadata at checkout
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub status: SubscriptionState,
    #[serde(default = "default_period")]
    pub billing_period: BillingPeriod,
    pub customer_id: Option<String>,
    pub subscription_id: String,

    /// Unix seconds
    pub current_period_start: Option<i64>,

    /// Unix seconds
    pub current_period_end: Option<i64>,
}

fn default_period() -> BillingPeriod {
    BillingPeriod::Monthly
}

/// A billing webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Provider event id
    pub id: String,

    #[serde(rename = "type")]
    pub kind: BillingEventKind,

    pub data: SubscriptionObject,
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
}

impl BillingEvent {
    /// Decodes an event from the raw (already verified) body
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// The subscription state to persist
    ///
    /// A deletion event always results in `canceled`, whatever status the
    /// provider reports.
    pub fn to_update(&self) -> SubscriptionUpdate {
        let status = match self.kind {
            BillingEventKind::SubscriptionDeleted => SubscriptionState::Canceled,
            _ => self.data.status,
        };

        SubscriptionUpdate {
            user_id: self.data.user_id,
            plan: self.data.plan,
            status,
            billing_period: self.data.billing_period,
            provider_customer_id: self.data.customer_id.clone(),
            provider_subscription_id: self.data.subscription_id.clone(),
            current_period_start: from_unix(self.data.current_period_start),
            current_period_end: from_unix(self.data.current_period_end),
        }
    }
}
