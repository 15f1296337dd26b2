// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! PageStash Billing Module
//!
//! Handles Stripe integration for the subscription lifecycle and per-user
//! usage quotas.
//!
//! ## Features
//!
//! - **Webhooks**: Mirror Stripe subscription lifecycle events into user rows
//! - **Plans**: Static tier quota table (clips/month, storage MB)
//! - **Usage Tracking**: Monthly clip counter + storage totals with calendar-month reset
//! - **Checkout / Portal**: Hosted Stripe pages for upgrading and managing billing
//! - **Invariants**: Read-only consistency sweeps over billing state

pub mod checkout;
pub mod client;
pub mod customer;
pub mod error;
pub mod invariants;
pub mod plans;
pub mod portal;
pub mod subscriptions;
pub mod usage;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Checkout
pub use checkout::{CheckoutResponse, CheckoutService};

// Client
pub use client::{StripeClient, StripeConfig};

// Customer
pub use customer::CustomerService;

// Error
pub use error::{BillingError, BillingResult};

// Plans
pub use plans::{remaining, Plan, SubscriptionStatus, SubscriptionTier, WarningLevel};

// Portal
pub use portal::{PortalResponse, PortalService};

// Subscriptions
pub use subscriptions::{SubscriptionService, UserSubscription};

// Usage
pub use usage::{
    days_until_reset, next_month_start, summarize, CurrentUsage, UsageMeter, UsageSummary,
};

// Webhooks
pub use webhooks::{verify_signature, WebhookHandler};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub checkout: CheckoutService,
    pub customer: CustomerService,
    pub portal: PortalService,
    pub subscriptions: SubscriptionService,
    pub usage: UsageMeter,
    pub webhooks: WebhookHandler,
    pub invariants: InvariantChecker,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let stripe = StripeClient::from_env()?;
        Ok(Self::new_with_client(stripe, pool))
    }

    /// Create a new billing service with explicit config
    pub fn new(config: StripeConfig, pool: PgPool) -> Self {
        Self::new_with_client(StripeClient::new(config), pool)
    }

    fn new_with_client(stripe: StripeClient, pool: PgPool) -> Self {
        Self {
            checkout: CheckoutService::new(stripe.clone()),
            customer: CustomerService::new(stripe.clone(), pool.clone()),
            portal: PortalService::new(stripe.clone()),
            subscriptions: SubscriptionService::new(pool.clone()),
            usage: UsageMeter::new(pool.clone()),
            webhooks: WebhookHandler::new(stripe, pool.clone()),
            invariants: InvariantChecker::new(pool),
        }
    }
}
