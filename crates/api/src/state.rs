//! Application state

use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;

use pagestash_billing::{BillingService, UsageMeter};

use crate::{
    auth::{AuthState, JwtManager},
    config::Config,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Billing service; None when Stripe is not configured, in which case
    /// the Stripe-backed endpoints answer 503 and everything else keeps
    /// working
    pub billing: Option<Arc<BillingService>>,
    /// Usage metering is independent of Stripe - quota enforcement and the
    /// usage endpoint work on self-hosted deployments without billing
    pub usage: UsageMeter,
    auth_state: AuthState,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = if config.supabase_jwt_secret.is_empty() {
            tracing::warn!(
                "SUPABASE_JWT_SECRET not set - token validation will fall back to the \
                 Supabase auth endpoint"
            );
            None
        } else {
            tracing::info!("Local Supabase token validation enabled");
            Some(JwtManager::new(&config.supabase_jwt_secret))
        };

        // HTTP client for the token verification fallback
        let http_client = Client::new();

        if jwt_manager.is_none() && config.supabase_url.is_empty() {
            tracing::error!(
                "Neither SUPABASE_JWT_SECRET nor SUPABASE_URL configured - authenticated \
                 endpoints will reject all requests"
            );
        }

        let auth_state = AuthState::new(
            jwt_manager,
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
            http_client,
        );

        // Initialize billing if Stripe env vars are set
        let billing = if config.enable_billing {
            match BillingService::from_env(pool.clone()) {
                Ok(svc) => {
                    tracing::info!("Stripe billing service initialized");
                    Some(Arc::new(svc))
                }
                Err(e) => {
                    tracing::warn!("Stripe billing not configured: {}", e);
                    None
                }
            }
        } else {
            tracing::info!("Billing disabled via config (ENABLE_BILLING=false)");
            None
        };

        let usage = UsageMeter::new(pool.clone());

        Self {
            pool,
            config,
            billing,
            usage,
            auth_state,
        }
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        self.auth_state.clone()
    }

    pub fn billing_service(&self) -> Option<&Arc<BillingService>> {
        self.billing.as_ref()
    }
}
