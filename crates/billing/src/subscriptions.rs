//! Subscription state synchronization
//!
//! Mirrors Stripe subscription objects into the `users` table. Tier is
//! always derived from the mapped status in the same statement that writes
//! the status — the two fields never move independently.

use sqlx::PgPool;
use stripe::Subscription;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::plans::{SubscriptionStatus, SubscriptionTier};

/// Subscription fields of a user row, as returned to the web app
#[derive(Debug, Clone)]
pub struct UserSubscription {
    pub tier: SubscriptionTier,
    pub status: String,
    pub stripe_subscription_id: Option<String>,
    pub period_start: Option<OffsetDateTime>,
    pub period_end: Option<OffsetDateTime>,
    pub cancel_at_period_end: bool,
}

/// Service for reading and syncing subscription state
#[derive(Clone)]
pub struct SubscriptionService {
    pool: PgPool,
}

impl SubscriptionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write a subscription object's derived state into the user row keyed
    /// by Stripe customer id. One absolute UPDATE; re-delivering the same
    /// event produces the same row. A customer with no matching user is
    /// logged and skipped — stale webhook deliveries are not an error.
    pub async fn sync_subscription_to_user(
        &self,
        customer_id: &str,
        subscription: &Subscription,
    ) -> BillingResult<bool> {
        let status = SubscriptionStatus::from_stripe(subscription.status);
        let tier = status.derived_tier();

        let period_start = OffsetDateTime::from_unix_timestamp(subscription.current_period_start)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        let period_end = OffsetDateTime::from_unix_timestamp(subscription.current_period_end)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());

        let rows = sqlx::query(
            r#"
            UPDATE users SET
                stripe_subscription_id = $1,
                subscription_tier = $2,
                subscription_status = $3,
                subscription_period_start = $4,
                subscription_period_end = $5,
                subscription_cancel_at_period_end = $6,
                updated_at = NOW()
            WHERE stripe_customer_id = $7
            "#,
        )
        .bind(subscription.id.as_str())
        .bind(tier.as_str())
        .bind(status.as_str())
        .bind(period_start)
        .bind(period_end)
        .bind(subscription.cancel_at_period_end)
        .bind(customer_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::warn!(
                customer_id = %customer_id,
                subscription_id = %subscription.id,
                "No user for Stripe customer, skipping subscription sync"
            );
            return Ok(false);
        }

        tracing::info!(
            customer_id = %customer_id,
            subscription_id = %subscription.id,
            status = status.as_str(),
            tier = tier.as_str(),
            "Synced subscription to user"
        );

        Ok(true)
    }

    /// Read the subscription fields of a user row.
    pub async fn get_user_subscription(
        &self,
        user_id: Uuid,
    ) -> BillingResult<Option<UserSubscription>> {
        let row: Option<(
            String,
            String,
            Option<String>,
            Option<OffsetDateTime>,
            Option<OffsetDateTime>,
            bool,
        )> = sqlx::query_as(
            r#"
            SELECT subscription_tier, subscription_status, stripe_subscription_id,
                   subscription_period_start, subscription_period_end,
                   subscription_cancel_at_period_end
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(tier, status, sub_id, period_start, period_end, cancel_at_period_end)| {
                UserSubscription {
                    tier: SubscriptionTier::from_db(&tier),
                    status,
                    stripe_subscription_id: sub_id,
                    period_start,
                    period_end,
                    cancel_at_period_end,
                }
            },
        ))
    }
}
