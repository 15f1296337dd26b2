//! Billing portal sessions

use stripe::{BillingPortalSession, CreateBillingPortalSession};

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Response from creating a portal session
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub portal_url: String,
}

/// Creates hosted billing portal sessions
#[derive(Clone)]
pub struct PortalService {
    stripe: StripeClient,
}

impl PortalService {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    /// Create a portal session for managing the subscription; returns the
    /// hosted page URL the app redirects to.
    pub async fn create_portal_session(&self, customer_id: &str) -> BillingResult<PortalResponse> {
        let config = self.stripe.config();
        let return_url = format!("{}/settings/billing", config.app_url);

        let customer = customer_id
            .parse()
            .map_err(|_| BillingError::Internal(format!("Invalid customer id: {}", customer_id)))?;

        let mut params = CreateBillingPortalSession::new(customer);
        params.return_url = Some(&return_url);

        let session = BillingPortalSession::create(self.stripe.inner(), params).await?;

        Ok(PortalResponse {
            portal_url: session.url,
        })
    }
}
