//! Shared reconciliation rules.
//!
//! Pure decision logic used by both event handlers. Every mutation decided
//! here must be safe to apply twice: name sync diffs old against new before
//! writing, and subscription clearing writes null unconditionally (null to
//! null is a no-op at the store level). Customer creation is the one
//! non-idempotent action; a duplicate INSERT delivery creates a second
//! Stripe customer, and deduplication is left to the upstream notifier.
//!
//! Field scope: only `full_name` and the two foreign ids are reconciled.
//! Drift in any other field between the two systems is out of scope.

use crate::changes::ProfessionalRow;
use crate::webhooks::BillingEventKind;

/// Subscription status that ends the link to a professional.
pub const STATUS_CANCELED: &str = "canceled";

/// Returns the new display name when it differs from the old one, `None`
/// when a repeated delivery of the same update should be a no-op.
pub fn name_change<'a>(old: &ProfessionalRow, new: &'a ProfessionalRow) -> Option<&'a str> {
    (old.full_name != new.full_name).then_some(new.full_name.as_str())
}

/// What a subscription lifecycle event does to the professional's
/// `stripe_subscription_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    /// Record the subscription id.
    Link,
    /// Clear the subscription id.
    Clear,
    /// Watch only; no state transition in the current policy.
    Observe,
}

pub fn subscription_action(kind: BillingEventKind, status: &str) -> SubscriptionAction {
    match kind {
        BillingEventKind::SubscriptionCreated => SubscriptionAction::Link,
        // Non-canceled status transitions are the extension point for
        // future dunning/lifecycle logic.
        BillingEventKind::SubscriptionUpdated if status == STATUS_CANCELED => {
            SubscriptionAction::Clear
        }
        BillingEventKind::SubscriptionUpdated => SubscriptionAction::Observe,
        BillingEventKind::SubscriptionDeleted => SubscriptionAction::Clear,
        _ => SubscriptionAction::Observe,
    }
}
