//! Billing error types

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Stripe API error: {0}")]
    Stripe(#[from] stripe::StripeError),

    #[error("webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("webhook event not supported: {0}")]
    WebhookEventNotSupported(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("billing is not configured: {0}")]
    NotConfigured(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal billing error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}
