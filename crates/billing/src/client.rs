//! Stripe client and configuration
//!
//! All billing services receive a constructed [`StripeClient`] rather than
//! reading environment variables themselves, so tests can inject a config.

use crate::error::{BillingError, BillingResult};

/// Stripe configuration consumed from the environment (or injected in tests)
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_…` / `sk_test_…`)
    pub secret_key: String,
    /// Webhook signing secret (`whsec_…`)
    pub webhook_secret: String,
    /// Price id for the pro subscription
    pub pro_price_id: String,
    /// Public base URL of the web app, used for checkout/portal return URLs
    pub app_url: String,
}

impl StripeConfig {
    /// Load from environment variables.
    ///
    /// `STRIPE_SECRET_KEY` and `STRIPE_WEBHOOK_SECRET` are required;
    /// missing values surface as [`BillingError::NotConfigured`] so callers
    /// can run with billing disabled.
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = require_env("STRIPE_SECRET_KEY")?;
        let webhook_secret = require_env("STRIPE_WEBHOOK_SECRET")?;
        let pro_price_id = require_env("STRIPE_PRO_PRICE_ID")?;
        let app_url = std::env::var("PUBLIC_APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            secret_key,
            webhook_secret,
            pro_price_id,
            app_url,
        })
    }
}

fn require_env(name: &str) -> BillingResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(BillingError::NotConfigured(format!("{} not set", name))),
    }
}

/// Thin wrapper tying a `stripe::Client` to its configuration
#[derive(Clone)]
pub struct StripeClient {
    client: stripe::Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let client = stripe::Client::new(config.secret_key.clone());
        Self { client, config }
    }

    pub fn from_env() -> BillingResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    /// The underlying Stripe API client
    pub fn inner(&self) -> &stripe::Client {
        &self.client
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
