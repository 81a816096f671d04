//! Application-side record store for the professionals table.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::SyncResult;

/// The application-owned entity kept in sync with Stripe.
///
/// `stripe_customer_id`, when set, always refers to a customer this service
/// created for this exact row; the customer's metadata carries the row id
/// back, which is the join used to resolve Stripe events.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Professional {
    pub id: String,
    pub full_name: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

/// Port to the application database.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Record the Stripe customer provisioned for a professional.
    async fn link_customer(&self, id: &str, customer_id: &str) -> SyncResult<()>;

    /// Set or clear the professional's subscription reference. Clearing an
    /// already-null column is a no-op at the store level, which keeps
    /// duplicate cancel/delete deliveries safe.
    async fn set_subscription(&self, id: &str, subscription_id: Option<&str>) -> SyncResult<()>;

    /// Resolve a professional by its Stripe customer id. A single row is
    /// expected; absence is `None`, never an error.
    async fn find_by_customer_id(&self, customer_id: &str) -> SyncResult<Option<Professional>>;
}

/// Create the Postgres connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Run embedded migrations (creates the professionals table).
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Production store backed by sqlx/Postgres.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn link_customer(&self, id: &str, customer_id: &str) -> SyncResult<()> {
        sqlx::query("UPDATE professionals SET stripe_customer_id = $1 WHERE id = $2")
            .bind(customer_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_subscription(&self, id: &str, subscription_id: Option<&str>) -> SyncResult<()> {
        sqlx::query("UPDATE professionals SET stripe_subscription_id = $1 WHERE id = $2")
            .bind(subscription_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> SyncResult<Option<Professional>> {
        let row = sqlx::query_as::<_, Professional>(
            r#"
            SELECT id, full_name, stripe_customer_id, stripe_subscription_id
            FROM professionals
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
