//! Billing routes for Stripe integration

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{
    auth::{AuthMethod, AuthUser},
    error::ApiError,
    state::AppState,
};

/// Response from creating a checkout session
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Response from creating a portal session
#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub portal_url: String,
}

/// Subscription info response
#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub tier: String,
    pub status: String,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
}

/// Stripe webhook receiver.
///
/// The body arrives as the raw string — it must not be parsed before the
/// signature is checked. Verification failure is a 400 with no database
/// writes; a handler error is a 500 so Stripe redelivers.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Stripe webhook missing signature header");
            ApiError::BadRequest("Missing Stripe signature".to_string())
        })?;

    let event = billing.webhooks.verify_event(&body, signature).map_err(|e| {
        tracing::warn!(error = ?e, "Stripe webhook signature verification failed");
        ApiError::BadRequest("Invalid webhook signature".to_string())
    })?;

    tracing::info!(
        event_type = %event.type_,
        event_id = %event.id,
        "Stripe webhook event verified"
    );

    billing.webhooks.handle_event(event).await.map_err(|e| {
        tracing::error!(error = %e, "Webhook handling error");
        ApiError::Database(format!("Webhook handling error: {}", e))
    })?;

    Ok(Json(json!({ "received": true })))
}

/// Current usage and quota for the authenticated user.
pub async fn get_usage(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<pagestash_billing::UsageSummary>, ApiError> {
    let tier: Option<(String,)> =
        sqlx::query_as("SELECT subscription_tier FROM users WHERE id = $1")
            .bind(auth_user.user_id)
            .fetch_optional(&state.pool)
            .await?;

    let tier = tier
        .map(|(t,)| pagestash_billing::SubscriptionTier::from_db(&t))
        .ok_or(ApiError::NotFound)?;

    let summary = state
        .usage
        .usage_summary(auth_user.user_id, tier, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(summary))
}

/// Current subscription state for the authenticated user.
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<SubscriptionInfo>, ApiError> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;

    let subscription = billing
        .subscriptions
        .get_user_subscription(auth_user.user_id)
        .await
        .map_err(|e| ApiError::Database(format!("Failed to get subscription: {}", e)))?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(SubscriptionInfo {
        tier: subscription.tier.as_str().to_string(),
        status: subscription.status,
        current_period_start: subscription
            .period_start
            .and_then(|t| t.format(&Rfc3339).ok()),
        current_period_end: subscription
            .period_end
            .and_then(|t| t.format(&Rfc3339).ok()),
        cancel_at_period_end: subscription.cancel_at_period_end,
    }))
}

/// Create a checkout session for upgrading to pro.
///
/// Cookie sessions only: the hosted-page redirect flow belongs to the web
/// app, and extension bearer tokens must not be able to start one.
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    if auth_user.auth_method != AuthMethod::Cookie {
        tracing::warn!(user_id = %auth_user.user_id, "Checkout attempted with bearer token");
        return Err(ApiError::Unauthorized);
    }

    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    let email = resolve_email(&state, &auth_user).await?;

    let customer_id = billing
        .customer
        .get_or_create(auth_user.user_id, &email)
        .await
        .map_err(|e| match e {
            pagestash_billing::BillingError::UserNotFound(_) => ApiError::NotFound,
            other => ApiError::Database(format!("Failed to resolve customer: {}", other)),
        })?;

    let session = billing
        .checkout
        .create_subscription_checkout(auth_user.user_id, &customer_id)
        .await
        .map_err(|e| ApiError::Database(format!("Failed to create checkout: {}", e)))?;

    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}

/// Create a billing portal session. Cookie sessions only, as with checkout.
pub async fn create_portal_session(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<PortalResponse>, ApiError> {
    if auth_user.auth_method != AuthMethod::Cookie {
        tracing::warn!(user_id = %auth_user.user_id, "Portal attempted with bearer token");
        return Err(ApiError::Unauthorized);
    }

    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    let email = resolve_email(&state, &auth_user).await?;

    let customer_id = billing
        .customer
        .get_or_create(auth_user.user_id, &email)
        .await
        .map_err(|e| match e {
            pagestash_billing::BillingError::UserNotFound(_) => ApiError::NotFound,
            other => ApiError::Database(format!("Failed to resolve customer: {}", other)),
        })?;

    let session = billing
        .portal
        .create_portal_session(&customer_id)
        .await
        .map_err(|e| ApiError::Database(format!("Failed to create portal session: {}", e)))?;

    Ok(Json(PortalResponse {
        portal_url: session.portal_url,
    }))
}

/// Email from the token when present, otherwise from the user row.
async fn resolve_email(state: &AppState, auth_user: &AuthUser) -> Result<String, ApiError> {
    if let Some(email) = &auth_user.email {
        return Ok(email.clone());
    }

    let row: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = $1")
        .bind(auth_user.user_id)
        .fetch_optional(&state.pool)
        .await?;

    row.map(|(email,)| email).ok_or(ApiError::NotFound)
}
