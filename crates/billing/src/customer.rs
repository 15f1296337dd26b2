//! Stripe customer management

use sqlx::PgPool;
use stripe::{CreateCustomer, Customer};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Creates and links Stripe customers to user rows
#[derive(Clone)]
pub struct CustomerService {
    stripe: StripeClient,
    pool: PgPool,
}

impl CustomerService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Return the user's Stripe customer id, creating the customer on first
    /// use. The id is written back to the user row so webhook handlers can
    /// correlate by customer from then on.
    pub async fn get_or_create(&self, user_id: Uuid, email: &str) -> BillingResult<String> {
        let existing: Option<(Option<String>,)> =
            sqlx::query_as("SELECT stripe_customer_id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let existing = match existing {
            Some((customer_id,)) => customer_id,
            None => return Err(BillingError::UserNotFound(user_id.to_string())),
        };

        if let Some(customer_id) = existing {
            return Ok(customer_id);
        }

        let mut params = CreateCustomer::new();
        params.email = Some(email);
        params.metadata = Some(std::collections::HashMap::from([(
            "user_id".to_string(),
            user_id.to_string(),
        )]));

        let customer = Customer::create(self.stripe.inner(), params).await?;
        let customer_id = customer.id.to_string();

        sqlx::query("UPDATE users SET stripe_customer_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(&customer_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer_id,
            "Created Stripe customer"
        );

        Ok(customer_id)
    }
}
