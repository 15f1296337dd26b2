//! Billing invariant checks
//!
//! Runnable consistency checks over the billing columns of the `users`
//! table and the usage counters. Checks only read, never write; the worker
//! runs them daily and logs any violations with enough context to debug.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// A single detected inconsistency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Affected user rows
    pub user_ids: Vec<Uuid>,
    /// Human-readable description of the violation
    pub description: String,
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Paid quota is being granted or denied incorrectly
    Critical,
    /// Data inconsistency that needs attention
    High,
    /// Minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Result of one full sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub ran_at: OffsetDateTime,
    pub checks_run: u32,
    pub violations: Vec<InvariantViolation>,
}

impl InvariantCheckSummary {
    pub fn healthy(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Runs the billing consistency checks
#[derive(Clone)]
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run every check and collect violations.
    pub async fn run_all(&self) -> BillingResult<InvariantCheckSummary> {
        let mut violations = Vec::new();

        if let Some(v) = self.check_pro_without_active_subscription().await? {
            violations.push(v);
        }
        if let Some(v) = self.check_free_with_active_status().await? {
            violations.push(v);
        }
        if let Some(v) = self.check_pro_without_customer().await? {
            violations.push(v);
        }
        if let Some(v) = self.check_negative_usage_counters().await? {
            violations.push(v);
        }

        Ok(InvariantCheckSummary {
            ran_at: OffsetDateTime::now_utc(),
            checks_run: 4,
            violations,
        })
    }

    /// Tier pro requires the last processed event to have indicated an
    /// active paid subscription. Past-due keeps pro (grace period), so the
    /// violating states are canceled and inactive.
    async fn check_pro_without_active_subscription(
        &self,
    ) -> BillingResult<Option<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE subscription_tier = 'pro'
              AND subscription_status IN ('canceled', 'inactive')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(InvariantViolation {
            invariant: "pro_requires_active_subscription".to_string(),
            user_ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "Users hold the pro tier while their subscription status is canceled \
                          or inactive"
                .to_string(),
            severity: ViolationSeverity::Critical,
        }))
    }

    /// An active subscription always derives the pro tier; free + active
    /// means a handler wrote one field without the other.
    async fn check_free_with_active_status(&self) -> BillingResult<Option<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE subscription_tier = 'free'
              AND subscription_status = 'active'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(InvariantViolation {
            invariant: "active_status_derives_pro".to_string(),
            user_ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "Users have an active subscription status but the free tier".to_string(),
            severity: ViolationSeverity::Critical,
        }))
    }

    /// Pro is only reachable via checkout or subscription sync, both of
    /// which record the Stripe customer id.
    async fn check_pro_without_customer(&self) -> BillingResult<Option<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE subscription_tier = 'pro'
              AND stripe_customer_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(InvariantViolation {
            invariant: "pro_has_stripe_customer".to_string(),
            user_ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "Pro users without a linked Stripe customer id".to_string(),
            severity: ViolationSeverity::High,
        }))
    }

    /// Usage counters never go below zero (releases clamp with GREATEST).
    async fn check_negative_usage_counters(&self) -> BillingResult<Option<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id FROM usage_records
            WHERE clips_this_month < 0 OR storage_used_mb < 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(InvariantViolation {
            invariant: "usage_counters_non_negative".to_string(),
            user_ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "Usage records with negative counters".to_string(),
            severity: ViolationSeverity::High,
        }))
    }
}
