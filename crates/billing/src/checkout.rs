//! Checkout session creation

use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionLineItems,
};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Response from creating a checkout session
#[derive(Debug, Clone)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Creates hosted checkout sessions for the pro subscription
#[derive(Clone)]
pub struct CheckoutService {
    stripe: StripeClient,
}

impl CheckoutService {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    /// Create a subscription-mode checkout session for the pro plan.
    ///
    /// `user_id` rides along in the session metadata; the webhook handler
    /// keys `checkout.session.completed` on it because the customer link
    /// may not exist yet when the event arrives.
    pub async fn create_subscription_checkout(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> BillingResult<CheckoutResponse> {
        let config = self.stripe.config();
        let success_url = format!("{}/settings/billing?checkout=success", config.app_url);
        let cancel_url = format!("{}/settings/billing?checkout=canceled", config.app_url);

        let customer = customer_id
            .parse()
            .map_err(|_| BillingError::Internal(format!("Invalid customer id: {}", customer_id)))?;

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.customer = Some(customer);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(config.pro_price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.metadata = Some(std::collections::HashMap::from([(
            "user_id".to_string(),
            user_id.to_string(),
        )]));

        let session = CheckoutSession::create(self.stripe.inner(), params).await?;

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer_id,
            session_id = %session.id,
            "Created checkout session"
        );

        Ok(CheckoutResponse {
            session_id: session.id.to_string(),
            url: session.url,
        })
    }
}
