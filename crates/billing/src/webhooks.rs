//! Stripe webhook handling
//!
//! Verifies inbound events and mirrors subscription lifecycle changes into
//! the `users` table. Events are not persisted: every handler issues a
//! single absolute UPDATE, so re-delivering an event is idempotent and
//! Stripe's own retry-on-non-2xx loop is the only retry mechanism.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use stripe::{CheckoutSession, Event, EventObject, EventType, Invoice, Subscription, Webhook};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};
use crate::subscriptions::SubscriptionService;

type HmacSha256 = Hmac<Sha256>;

/// Tolerance for the signature timestamp, matching Stripe's recommendation.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `stripe-signature` header (`t=…,v1=…`) against the raw payload.
///
/// Kept separate from event parsing so the check is testable with a pinned
/// clock and a forged-but-valid signature.
pub fn verify_signature(
    payload: &str,
    signature: &str,
    webhook_secret: &str,
    now_unix: i64,
) -> BillingResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<String> = None;

    for part in signature.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() == 2 {
            match kv[0] {
                "t" => timestamp = kv[1].parse().ok(),
                "v1" => v1_signature = Some(kv[1].to_string()),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or(BillingError::WebhookSignatureInvalid)?;
    let v1_signature = v1_signature.ok_or(BillingError::WebhookSignatureInvalid)?;

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(
            timestamp = timestamp,
            now = now_unix,
            "Webhook timestamp outside tolerance"
        );
        return Err(BillingError::WebhookSignatureInvalid);
    }

    let secret_key = webhook_secret
        .strip_prefix("whsec_")
        .unwrap_or(webhook_secret);
    let signed_payload = format!("{}.{}", timestamp, payload);

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| BillingError::WebhookSignatureInvalid)?;
    mac.update(signed_payload.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed != v1_signature {
        return Err(BillingError::WebhookSignatureInvalid);
    }

    Ok(())
}

/// Webhook handler for Stripe events
pub struct WebhookHandler {
    stripe: StripeClient,
    pool: PgPool,
}

impl WebhookHandler {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Verify and parse a Stripe webhook event.
    ///
    /// Tries the library verification first and falls back to manual
    /// signature verification, which tolerates event payloads from Stripe
    /// API versions newer than the library's pinned one. No database access
    /// happens before this returns.
    pub fn verify_event(&self, payload: &str, signature: &str) -> BillingResult<Event> {
        let webhook_secret = &self.stripe.config().webhook_secret;

        match Webhook::construct_event(payload, signature, webhook_secret) {
            Ok(event) => return Ok(event),
            Err(e) => {
                tracing::debug!(
                    stripe_error = %e,
                    "Library webhook verification failed, trying manual verification"
                );
            }
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|_| BillingError::WebhookSignatureInvalid)?
            .as_secs() as i64;

        verify_signature(payload, signature, webhook_secret, now)?;

        let event: Event = serde_json::from_str(payload).map_err(|e| {
            tracing::warn!(parse_error = %e, "Verified webhook payload failed to parse");
            BillingError::WebhookSignatureInvalid
        })?;

        Ok(event)
    }

    /// Dispatch a verified event to its handler.
    ///
    /// Unhandled event types are accepted as no-ops; a handler error
    /// propagates so the HTTP layer returns 500 and Stripe redelivers.
    pub async fn handle_event(&self, event: Event) -> BillingResult<()> {
        tracing::info!(
            event_type = %event.type_,
            event_id = %event.id,
            "Processing Stripe webhook event"
        );

        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                self.handle_checkout_completed(event).await?;
            }
            EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated => {
                self.handle_subscription_changed(event).await?;
            }
            EventType::CustomerSubscriptionDeleted => {
                self.handle_subscription_deleted(event).await?;
            }
            EventType::InvoicePaymentSucceeded | EventType::InvoicePaid => {
                self.handle_invoice_payment_succeeded(event).await?;
            }
            EventType::InvoicePaymentFailed => {
                self.handle_invoice_payment_failed(event).await?;
            }
            _ => {
                // Track which events arrive without a handler; new event
                // kinds show up here before anyone writes code for them.
                tracing::info!(
                    event_type = %event.type_,
                    event_id = %event.id,
                    "Unhandled Stripe event type, accepting as no-op"
                );
            }
        }

        Ok(())
    }

    /// `checkout.session.completed`: link the Stripe customer to the user
    /// and activate pro. Keyed by the `user_id` the checkout service put in
    /// the session metadata — the customer id may not be linked yet.
    async fn handle_checkout_completed(&self, event: Event) -> BillingResult<()> {
        let session = extract_checkout_session(event)?;

        let user_id = session
            .metadata
            .as_ref()
            .and_then(|m| m.get("user_id"))
            .and_then(|id| Uuid::parse_str(id).ok());

        let user_id = match user_id {
            Some(id) => id,
            None => {
                tracing::warn!(
                    session_id = %session.id,
                    "Checkout session has no user_id metadata, skipping"
                );
                return Ok(());
            }
        };

        let customer_id = match &session.customer {
            Some(customer) => expandable_customer_id(customer),
            None => {
                tracing::warn!(
                    session_id = %session.id,
                    user_id = %user_id,
                    "Checkout session has no customer, skipping"
                );
                return Ok(());
            }
        };

        let rows = sqlx::query(
            r#"
            UPDATE users SET
                stripe_customer_id = $1,
                subscription_tier = 'pro',
                subscription_status = 'active',
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(&customer_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::warn!(
                user_id = %user_id,
                customer_id = %customer_id,
                "Checkout completed for unknown user, skipping"
            );
            return Ok(());
        }

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer_id,
            "Checkout completed, user upgraded to pro"
        );

        Ok(())
    }

    /// `customer.subscription.created` / `updated`: sync the full
    /// subscription state; tier is derived from the mapped status.
    async fn handle_subscription_changed(&self, event: Event) -> BillingResult<()> {
        let subscription = extract_subscription(event)?;
        let customer_id = expandable_customer_id(&subscription.customer);

        let sub_service = SubscriptionService::new(self.pool.clone());
        sub_service
            .sync_subscription_to_user(&customer_id, &subscription)
            .await?;

        Ok(())
    }

    /// `customer.subscription.deleted`: downgrade to free. There is no
    /// soft-cancel state — the subscription id is cleared outright.
    async fn handle_subscription_deleted(&self, event: Event) -> BillingResult<()> {
        let subscription = extract_subscription(event)?;
        let customer_id = expandable_customer_id(&subscription.customer);

        let rows = sqlx::query(
            r#"
            UPDATE users SET
                subscription_tier = 'free',
                subscription_status = 'canceled',
                stripe_subscription_id = NULL,
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(&customer_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::warn!(
                customer_id = %customer_id,
                subscription_id = %subscription.id,
                "Subscription deleted for unknown customer, skipping"
            );
            return Ok(());
        }

        tracing::info!(
            customer_id = %customer_id,
            subscription_id = %subscription.id,
            "Subscription deleted, user downgraded to free"
        );

        Ok(())
    }

    /// `invoice.payment_succeeded`: reassert active/pro. Corrects the
    /// status after a prior past-due once a retried payment clears.
    async fn handle_invoice_payment_succeeded(&self, event: Event) -> BillingResult<()> {
        let invoice = extract_invoice(event)?;
        let customer_id = match invoice_customer_id(&invoice) {
            Some(id) => id,
            None => {
                tracing::warn!(invoice_id = %invoice.id, "Invoice has no customer, skipping");
                return Ok(());
            }
        };

        let rows = sqlx::query(
            r#"
            UPDATE users SET
                subscription_status = 'active',
                subscription_tier = 'pro',
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(&customer_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::warn!(
                customer_id = %customer_id,
                invoice_id = %invoice.id,
                "Invoice paid for unknown customer, skipping"
            );
            return Ok(());
        }

        tracing::info!(
            customer_id = %customer_id,
            invoice_id = %invoice.id,
            amount = ?invoice.amount_paid,
            "Invoice payment succeeded"
        );

        Ok(())
    }

    /// `invoice.payment_failed`: mark past-due. Tier is left untouched —
    /// the user keeps pro while Stripe retries the payment.
    async fn handle_invoice_payment_failed(&self, event: Event) -> BillingResult<()> {
        let invoice = extract_invoice(event)?;
        let customer_id = match invoice_customer_id(&invoice) {
            Some(id) => id,
            None => {
                tracing::warn!(invoice_id = %invoice.id, "Invoice has no customer, skipping");
                return Ok(());
            }
        };

        let rows = sqlx::query(
            r#"
            UPDATE users SET
                subscription_status = 'past_due',
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(&customer_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::warn!(
                customer_id = %customer_id,
                invoice_id = %invoice.id,
                "Payment failed for unknown customer, skipping"
            );
            return Ok(());
        }

        tracing::warn!(
            customer_id = %customer_id,
            invoice_id = %invoice.id,
            amount = ?invoice.amount_due,
            "Invoice payment failed, user marked past_due"
        );

        Ok(())
    }
}

fn extract_checkout_session(event: Event) -> BillingResult<CheckoutSession> {
    match event.data.object {
        EventObject::CheckoutSession(session) => Ok(session),
        _ => Err(BillingError::WebhookEventNotSupported(
            "Expected CheckoutSession".to_string(),
        )),
    }
}

fn extract_subscription(event: Event) -> BillingResult<Subscription> {
    match event.data.object {
        EventObject::Subscription(subscription) => Ok(subscription),
        _ => Err(BillingError::WebhookEventNotSupported(
            "Expected Subscription".to_string(),
        )),
    }
}

fn extract_invoice(event: Event) -> BillingResult<Invoice> {
    match event.data.object {
        EventObject::Invoice(invoice) => Ok(invoice),
        _ => Err(BillingError::WebhookEventNotSupported(
            "Expected Invoice".to_string(),
        )),
    }
}

fn expandable_customer_id(customer: &stripe::Expandable<stripe::Customer>) -> String {
    match customer {
        stripe::Expandable::Id(id) => id.to_string(),
        stripe::Expandable::Object(c) => c.id.to_string(),
    }
}

fn invoice_customer_id(invoice: &Invoice) -> Option<String> {
    invoice.customer.as_ref().map(expandable_customer_id)
}
