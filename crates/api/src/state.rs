//! Application state.

use std::sync::Arc;

use prosync_billing::{BillingEventHandler, BillingProvider, DatabaseEventHandler, RecordStore};

/// Shared application state.
///
/// Both clients are injected behind their port traits so tests can swap in
/// fakes; all durable state lives in the two external systems.
#[derive(Clone)]
pub struct AppState {
    pub db_events: Arc<DatabaseEventHandler>,
    pub billing_events: Arc<BillingEventHandler>,
    /// Secret used to verify `Stripe-Signature` headers.
    pub stripe_webhook_secret: String,
}

impl AppState {
    pub fn new(
        billing: Arc<dyn BillingProvider>,
        store: Arc<dyn RecordStore>,
        stripe_webhook_secret: String,
    ) -> Self {
        Self {
            db_events: Arc::new(DatabaseEventHandler::new(billing, store.clone())),
            billing_events: Arc::new(BillingEventHandler::new(store)),
            stripe_webhook_secret,
        }
    }
}
