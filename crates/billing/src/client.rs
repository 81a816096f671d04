//! Stripe client wrapper and the outbound billing port.

use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{Client, CreateCustomer, Customer, CustomerId, UpdateCustomer};

use crate::error::{SyncError, SyncResult};

/// Stripe configuration
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

impl StripeConfig {
    pub fn from_env() -> SyncResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| SyncError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| SyncError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;
        Ok(Self {
            secret_key,
            webhook_secret,
        })
    }
}

/// Outbound port to the billing provider.
///
/// Handlers depend on this trait rather than on a concrete client so tests
/// can substitute recording fakes.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer and return its provider-assigned id.
    async fn create_customer(
        &self,
        name: &str,
        metadata: HashMap<String, String>,
    ) -> SyncResult<String>;

    async fn update_customer_name(&self, customer_id: &str, name: &str) -> SyncResult<()>;

    async fn delete_customer(&self, customer_id: &str) -> SyncResult<()>;
}

/// Production adapter over the Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::new(config.secret_key.clone());
        Self { client, config }
    }

    pub fn from_env() -> SyncResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn parse_customer_id(customer_id: &str) -> SyncResult<CustomerId> {
        customer_id
            .parse::<CustomerId>()
            .map_err(|e| SyncError::Provider(format!("invalid customer id {customer_id}: {e}")))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(
        &self,
        name: &str,
        metadata: HashMap<String, String>,
    ) -> SyncResult<String> {
        let mut params = CreateCustomer::new();
        params.name = Some(name);
        params.metadata = Some(metadata);

        let customer = Customer::create(&self.client, params).await?;
        Ok(customer.id.to_string())
    }

    async fn update_customer_name(&self, customer_id: &str, name: &str) -> SyncResult<()> {
        let id = Self::parse_customer_id(customer_id)?;

        let mut params = UpdateCustomer::new();
        params.name = Some(name);

        Customer::update(&self.client, &id, params).await?;
        Ok(())
    }

    async fn delete_customer(&self, customer_id: &str) -> SyncResult<()> {
        let id = Self::parse_customer_id(customer_id)?;
        Customer::delete(&self.client, &id).await?;
        Ok(())
    }
}
