//! Error types for the reconciliation core.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure taxonomy for reconciliation flows.
///
/// How a variant surfaces depends on which side originated the notification:
/// downstream failures in database-originated flows become server errors,
/// while billing-originated flows log and acknowledge so the provider does
/// not retry events we cannot act on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A Stripe API call failed.
    #[error("billing provider error: {0}")]
    Provider(String),

    /// A record store call failed.
    #[error("record store error: {0}")]
    Store(String),

    /// Required environment configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The Stripe-Signature header did not verify against the payload.
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    /// The event body parsed, but its payload object is not usable.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

impl From<stripe::StripeError> for SyncError {
    fn from(e: stripe::StripeError) -> Self {
        SyncError::Provider(e.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Store(e.to_string())
    }
}
