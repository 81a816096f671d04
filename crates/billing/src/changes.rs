//! Database change notifications.
//!
//! Interprets INSERT/UPDATE/DELETE webhooks for the professionals table and
//! drives provisioning and teardown of the linked Stripe customer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::client::BillingProvider;
use crate::policy;
use crate::store::RecordStore;

/// Table this service acts on. Changes to any other table are acknowledged
/// without side effects.
pub const PROFESSIONALS_TABLE: &str = "professionals";

/// Metadata key on created customers holding the professional's row id.
/// This is the join key for resolving Stripe events back to a row.
pub const METADATA_SUPABASE_ID: &str = "supabase_id";
/// Metadata key tagging the entity kind a customer was created for.
pub const METADATA_ROLE: &str = "role";
pub const ROLE_PROFESSIONAL: &str = "PROFESSIONAL";

/// Operation discriminator on a database change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChangeOp {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    /// Operations this service does not act on (TRUNCATE and friends).
    #[serde(other)]
    Other,
}

/// A change notification as delivered by the database webhook.
///
/// Row payloads stay raw JSON until the table filter has passed; other
/// tables carry arbitrary shapes.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseChange {
    #[serde(rename = "type")]
    pub op: ChangeOp,
    pub table: String,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
}

/// A professionals row as delivered in a change notification.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfessionalRow {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
}

/// Outcome of processing one database change notification.
///
/// The handler never lets an internal failure escape its boundary; every
/// path maps to one of these variants and the HTTP layer picks status and
/// body from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseAck {
    /// Nothing to do: foreign table, missing payload, unchanged field, or an
    /// operation we do not act on.
    Ignored,
    /// Stripe customer created and linked back onto the professional.
    Provisioned { stripe_customer_id: String },
    /// Display name pushed to the Stripe customer.
    Synced,
    /// Stripe customer deleted after the professional row was removed.
    Deleted { stripe_customer_id: String },
    /// The professional row is gone but the Stripe cleanup call failed; the
    /// notification itself is still acknowledged.
    CleanupFailed {
        stripe_customer_id: String,
        warning: String,
    },
    /// A downstream write failed after a decision was made.
    Failed { error: String },
}

/// Consumes database change notifications and issues compensating Stripe
/// and store writes.
pub struct DatabaseEventHandler {
    billing: Arc<dyn BillingProvider>,
    store: Arc<dyn RecordStore>,
}

impl DatabaseEventHandler {
    pub fn new(billing: Arc<dyn BillingProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self { billing, store }
    }

    pub async fn handle(&self, change: DatabaseChange) -> DatabaseAck {
        if change.table != PROFESSIONALS_TABLE {
            tracing::debug!(table = %change.table, "change for foreign table ignored");
            return DatabaseAck::Ignored;
        }

        match change.op {
            ChangeOp::Insert => self.handle_insert(change.record).await,
            ChangeOp::Update => self.handle_update(change.old_record, change.record).await,
            ChangeOp::Delete => self.handle_delete(change.old_record).await,
            ChangeOp::Other => {
                tracing::info!("unrecognized change operation acknowledged as no-op");
                DatabaseAck::Ignored
            }
        }
    }

    async fn handle_insert(&self, record: Option<serde_json::Value>) -> DatabaseAck {
        // Upstream notifiers may legitimately omit the row payload; treat
        // that as a no-op rather than a malformed event.
        let Some(row) = parse_row(record, "record") else {
            return DatabaseAck::Ignored;
        };

        let mut metadata = HashMap::new();
        metadata.insert(METADATA_SUPABASE_ID.to_string(), row.id.clone());
        metadata.insert(METADATA_ROLE.to_string(), ROLE_PROFESSIONAL.to_string());

        // Not idempotent: a duplicate INSERT delivery creates a second
        // customer. Dedupe is delegated to the upstream notifier.
        let customer_id = match self.billing.create_customer(&row.full_name, metadata).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    professional_id = %row.id,
                    error = %e,
                    "failed to create Stripe customer"
                );
                return DatabaseAck::Failed {
                    error: e.to_string(),
                };
            }
        };

        if let Err(e) = self.store.link_customer(&row.id, &customer_id).await {
            // The customer now exists but is unlinked. No rollback; the
            // inconsistency is reported for the operator to reconcile.
            tracing::error!(
                professional_id = %row.id,
                stripe_customer_id = %customer_id,
                error = %e,
                "Stripe customer created but write-back failed"
            );
            return DatabaseAck::Failed {
                error: e.to_string(),
            };
        }

        tracing::info!(
            professional_id = %row.id,
            stripe_customer_id = %customer_id,
            "Stripe customer provisioned"
        );
        DatabaseAck::Provisioned {
            stripe_customer_id: customer_id,
        }
    }

    async fn handle_update(
        &self,
        old_record: Option<serde_json::Value>,
        record: Option<serde_json::Value>,
    ) -> DatabaseAck {
        let (Some(old_row), Some(row)) = (
            parse_row(old_record, "old_record"),
            parse_row(record, "record"),
        ) else {
            return DatabaseAck::Ignored;
        };

        let Some(customer_id) = row.stripe_customer_id.as_deref() else {
            tracing::debug!(professional_id = %row.id, "no linked Stripe customer yet, nothing to sync");
            return DatabaseAck::Ignored;
        };

        let Some(new_name) = policy::name_change(&old_row, &row) else {
            tracing::debug!(professional_id = %row.id, "name unchanged, idempotent no-op");
            return DatabaseAck::Ignored;
        };

        match self.billing.update_customer_name(customer_id, new_name).await {
            Ok(()) => {
                tracing::info!(
                    professional_id = %row.id,
                    stripe_customer_id = %customer_id,
                    "display name synced to Stripe"
                );
                DatabaseAck::Synced
            }
            Err(e) => {
                tracing::error!(
                    professional_id = %row.id,
                    stripe_customer_id = %customer_id,
                    error = %e,
                    "failed to push display name to Stripe"
                );
                DatabaseAck::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn handle_delete(&self, old_record: Option<serde_json::Value>) -> DatabaseAck {
        let Some(row) = parse_row(old_record, "old_record") else {
            return DatabaseAck::Ignored;
        };

        let Some(customer_id) = row.stripe_customer_id else {
            tracing::debug!(professional_id = %row.id, "deleted row had no Stripe customer");
            return DatabaseAck::Ignored;
        };

        match self.billing.delete_customer(&customer_id).await {
            Ok(()) => {
                tracing::info!(
                    professional_id = %row.id,
                    stripe_customer_id = %customer_id,
                    "Stripe customer deleted"
                );
                DatabaseAck::Deleted {
                    stripe_customer_id: customer_id,
                }
            }
            Err(e) => {
                // The application row is already gone and irreversible;
                // failing the request would conflate billing cleanup failure
                // with notification-processing failure.
                tracing::warn!(
                    professional_id = %row.id,
                    stripe_customer_id = %customer_id,
                    error = %e,
                    "professional deleted but Stripe customer cleanup failed"
                );
                DatabaseAck::CleanupFailed {
                    stripe_customer_id: customer_id,
                    warning: format!("failed to delete Stripe customer: {e}"),
                }
            }
        }
    }
}

fn parse_row(value: Option<serde_json::Value>, field: &str) -> Option<ProfessionalRow> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(row) => Some(row),
        Err(e) => {
            tracing::warn!(field, error = %e, "row payload did not parse, skipping");
            None
        }
    }
}
