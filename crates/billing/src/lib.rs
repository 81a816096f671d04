// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! prosync reconciliation core
//!
//! Keeps professional records in the application database and their Stripe
//! customer/subscription records consistent, driven by change notifications
//! from both sides.
//!
//! ## Components
//!
//! - **Database changes**: INSERT/UPDATE/DELETE webhooks drive customer
//!   provisioning, name sync, and teardown ([`changes`])
//! - **Stripe webhooks**: subscription lifecycle events are projected back
//!   onto professional rows ([`webhooks`])
//! - **Policy**: shared idempotency and field-diff rules ([`policy`])
//! - **Ports**: injectable Stripe and record-store clients ([`client`],
//!   [`store`])
//!
//! Delivery from either side is at-least-once and unordered; handlers make
//! idempotent, current-state-based writes rather than assuming an event
//! sequence.

pub mod changes;
pub mod client;
pub mod error;
pub mod policy;
pub mod store;
pub mod webhooks;


// Database changes
pub use changes::{
    ChangeOp, DatabaseAck, DatabaseChange, DatabaseEventHandler, ProfessionalRow,
    PROFESSIONALS_TABLE,
};

// Client
pub use client::{BillingProvider, StripeClient, StripeConfig};

// Error
pub use error::{SyncError, SyncResult};

// Store
pub use store::{create_pool, run_migrations, PgRecordStore, Professional, RecordStore};

// Webhooks
pub use webhooks::{
    verify_signature, BillingEvent, BillingEventData, BillingEventHandler, BillingEventKind,
};
