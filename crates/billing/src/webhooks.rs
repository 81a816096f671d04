//! Stripe webhook handling.
//!
//! Signature verification, typed event decoding, and projection of
//! subscription lifecycle events back onto professional records.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{SyncError, SyncResult};
use crate::policy::{self, SubscriptionAction};
use crate::store::RecordStore;

type HmacSha256 = Hmac<Sha256>;

/// How far a delivery's signature timestamp may drift from our clock.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header against the raw payload.
///
/// Header format: `t=<timestamp>,v1=<hex hmac>`. The signed payload is
/// `<timestamp>.<body>` keyed with the webhook secret.
pub fn verify_signature(payload: &str, signature: &str, webhook_secret: &str) -> SyncResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<&str> = None;

    for part in signature.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => timestamp = v.parse().ok(),
            (Some("v1"), Some(v)) => v1_signature = Some(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SyncError::SignatureInvalid)?;
    let v1_signature = v1_signature.ok_or(SyncError::SignatureInvalid)?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| SyncError::SignatureInvalid)?
        .as_secs() as i64;
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(timestamp, now, "webhook timestamp outside tolerance");
        return Err(SyncError::SignatureInvalid);
    }

    let secret = webhook_secret
        .strip_prefix("whsec_")
        .unwrap_or(webhook_secret);
    let signed_payload = format!("{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SyncError::SignatureInvalid)?;
    mac.update(signed_payload.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed.as_bytes().ct_eq(v1_signature.as_bytes()).into() {
        Ok(())
    } else {
        Err(SyncError::SignatureInvalid)
    }
}

/// Event kinds this service recognizes. Everything else falls through to the
/// explicit default arm in the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    CustomerCreated,
    CustomerUpdated,
    CustomerDeleted,
    Other,
}

impl BillingEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.created" => Self::CustomerCreated,
            "customer.updated" => Self::CustomerUpdated,
            "customer.deleted" => Self::CustomerDeleted,
            _ => Self::Other,
        }
    }
}

/// A Stripe event as delivered on the webhook: a type discriminator plus a
/// payload object whose shape depends on the type.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: BillingEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingEventData {
    pub object: serde_json::Value,
}

/// Subscription fields this service reads from `data.object`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPayload {
    pub id: String,
    pub customer: String,
    pub status: String,
}

impl BillingEvent {
    pub fn kind(&self) -> BillingEventKind {
        BillingEventKind::from_type(&self.event_type)
    }

    fn subscription(&self) -> SyncResult<SubscriptionPayload> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| SyncError::MalformedPayload(format!("subscription object: {e}")))
    }
}

/// Projects Stripe-side lifecycle events onto professional records.
///
/// Always acknowledges: the provider retries on non-2xx, so business-logic
/// failures are logged and swallowed. Only a malformed payload surfaces, and
/// the HTTP layer turns that into a client error.
pub struct BillingEventHandler {
    store: Arc<dyn RecordStore>,
}

impl BillingEventHandler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, event: BillingEvent) -> SyncResult<()> {
        let kind = event.kind();
        match kind {
            BillingEventKind::SubscriptionCreated
            | BillingEventKind::SubscriptionUpdated
            | BillingEventKind::SubscriptionDeleted => {
                let subscription = event.subscription()?;
                if let Err(e) = self.project_subscription(kind, &subscription).await {
                    // A provider retry would not make the store healthier.
                    tracing::error!(
                        event_type = %event.event_type,
                        event_id = ?event.id,
                        stripe_customer_id = %subscription.customer,
                        error = %e,
                        "subscription projection failed, acknowledging anyway"
                    );
                }
                Ok(())
            }
            BillingEventKind::InvoicePaymentSucceeded => {
                tracing::info!(event_id = ?event.id, "invoice payment succeeded");
                Ok(())
            }
            BillingEventKind::InvoicePaymentFailed => {
                tracing::warn!(event_id = ?event.id, "invoice payment failed");
                Ok(())
            }
            BillingEventKind::CustomerCreated
            | BillingEventKind::CustomerUpdated
            | BillingEventKind::CustomerDeleted => {
                tracing::info!(
                    event_type = %event.event_type,
                    event_id = ?event.id,
                    "customer lifecycle event observed"
                );
                Ok(())
            }
            BillingEventKind::Other => {
                // Tracked so new event types that may need handlers show up
                // in the logs.
                tracing::info!(
                    event_type = %event.event_type,
                    event_id = ?event.id,
                    "unhandled Stripe event type - no handler configured"
                );
                Ok(())
            }
        }
    }

    async fn project_subscription(
        &self,
        kind: BillingEventKind,
        subscription: &SubscriptionPayload,
    ) -> SyncResult<()> {
        let professional = match self.store.find_by_customer_id(&subscription.customer).await? {
            Some(p) => p,
            None => {
                // Either the professional's creation race has not completed
                // yet, or the customer belongs to a different entity kind.
                tracing::info!(
                    stripe_customer_id = %subscription.customer,
                    stripe_subscription_id = %subscription.id,
                    "no professional for customer, dangling event"
                );
                return Ok(());
            }
        };

        match policy::subscription_action(kind, &subscription.status) {
            SubscriptionAction::Link => {
                self.store
                    .set_subscription(&professional.id, Some(&subscription.id))
                    .await?;
                tracing::info!(
                    professional_id = %professional.id,
                    stripe_subscription_id = %subscription.id,
                    "subscription linked"
                );
            }
            SubscriptionAction::Clear => {
                self.store.set_subscription(&professional.id, None).await?;
                tracing::info!(
                    professional_id = %professional.id,
                    stripe_subscription_id = %subscription.id,
                    "subscription cleared"
                );
            }
            SubscriptionAction::Observe => {
                tracing::debug!(
                    professional_id = %professional.id,
                    status = %subscription.status,
                    "subscription status observed, no projection"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign(payload: &str, timestamp: i64, secret: &str) -> String {
        let signed_payload = format!("{timestamp}.{payload}");
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn now_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[test]
    fn verify_signature_accepts_valid_header() {
        let payload = r#"{"type":"customer.created"}"#;
        let header = sign(payload, now_secs(), "test_secret");
        assert!(verify_signature(payload, &header, "test_secret").is_ok());
    }

    #[test]
    fn verify_signature_strips_whsec_prefix() {
        let payload = r#"{"type":"customer.created"}"#;
        let header = sign(payload, now_secs(), "test_secret");
        assert!(verify_signature(payload, &header, "whsec_test_secret").is_ok());
    }

    #[test]
    fn verify_signature_rejects_wrong_secret() {
        let payload = r#"{"type":"customer.created"}"#;
        let header = sign(payload, now_secs(), "test_secret");
        assert!(matches!(
            verify_signature(payload, &header, "other_secret"),
            Err(SyncError::SignatureInvalid)
        ));
    }

    #[test]
    fn verify_signature_rejects_stale_timestamp() {
        let payload = r#"{"type":"customer.created"}"#;
        let header = sign(payload, now_secs() - 600, "test_secret");
        assert!(verify_signature(payload, &header, "test_secret").is_err());
    }

    #[test]
    fn verify_signature_rejects_missing_parts() {
        assert!(verify_signature("{}", "v1=abc", "s").is_err());
        assert!(verify_signature("{}", "t=123", "s").is_err());
        assert!(verify_signature("{}", "", "s").is_err());
    }

    #[test]
    fn event_kind_maps_known_types_and_defaults() {
        assert_eq!(
            BillingEventKind::from_type("customer.subscription.created"),
            BillingEventKind::SubscriptionCreated
        );
        assert_eq!(
            BillingEventKind::from_type("invoice.payment_failed"),
            BillingEventKind::InvoicePaymentFailed
        );
        assert_eq!(
            BillingEventKind::from_type("payment_intent.created"),
            BillingEventKind::Other
        );
    }

    #[test]
    fn subscription_payload_extraction() {
        let event: BillingEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "customer.subscription.created",
            "data": {"object": {"id": "sub_1", "customer": "cus_1", "status": "active"}}
        }))
        .unwrap();
        let sub = event.subscription().unwrap();
        assert_eq!(sub.id, "sub_1");
        assert_eq!(sub.customer, "cus_1");
        assert_eq!(sub.status, "active");

        let event: BillingEvent = serde_json::from_value(json!({
            "type": "customer.subscription.created",
            "data": {"object": {"id": "sub_1"}}
        }))
        .unwrap();
        assert!(matches!(
            event.subscription(),
            Err(SyncError::MalformedPayload(_))
        ));
    }
}
