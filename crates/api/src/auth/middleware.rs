//! Authentication middleware for Axum
//!
//! One resolve step per request: pull the Supabase access token from the
//! Authorization header (extension) or the session cookie (web app),
//! validate it, and insert an [`AuthUser`] extension tagged with how the
//! caller authenticated.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::jwt::JwtManager;

/// Name of the HttpOnly cookie the web app stores its access token in.
pub const SESSION_COOKIE: &str = "pagestash_auth_token";

/// Cache remote verification results briefly so parallel dashboard requests
/// don't hammer the Supabase auth endpoint.
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Bound the cache so a flood of unique garbage tokens can't exhaust memory.
const MAX_CACHE_ENTRIES: usize = 10_000;

/// Cached remote verification result
#[derive(Clone, Debug)]
struct CachedVerification {
    user_id: Uuid,
    email: Option<String>,
    cached_at: Instant,
}

pub(crate) type TokenCache = Arc<RwLock<HashMap<String, CachedVerification>>>;

pub(crate) fn new_token_cache() -> TokenCache {
    Arc::new(RwLock::new(HashMap::new()))
}

/// How the caller authenticated. Checkout and portal endpoints only accept
/// cookie sessions; everything else accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    Cookie,
}

/// Authenticated user, resolved once per request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub auth_method: AuthMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingAuth,
    InvalidToken,
    VerificationUnavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth | AuthError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Authentication required")
            }
            AuthError::VerificationUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    /// Local validator; present when SUPABASE_JWT_SECRET is configured
    pub jwt_manager: Option<JwtManager>,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub http_client: Client,
    token_cache: TokenCache,
}

impl AuthState {
    pub fn new(
        jwt_manager: Option<JwtManager>,
        supabase_url: String,
        supabase_anon_key: String,
        http_client: Client,
    ) -> Self {
        Self {
            jwt_manager,
            supabase_url,
            supabase_anon_key,
            http_client,
            token_cache: new_token_cache(),
        }
    }
}

/// Pull the access token out of the session cookie header value.
pub(crate) fn token_from_cookie_header(cookies: &str) -> Option<String> {
    for cookie in cookies.split(';') {
        let cookie = cookie.trim();
        if let Some(token) = cookie.strip_prefix(SESSION_COOKIE) {
            if let Some(value) = token.strip_prefix('=') {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Extract the token and how it arrived. The Authorization header wins;
/// the cookie is the web-app fallback.
pub(crate) fn extract_token(request: &Request) -> Option<(String, AuthMethod)> {
    if let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some((token.to_string(), AuthMethod::Bearer));
        }
    }

    request
        .headers()
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(token_from_cookie_header)
        .map(|token| (token, AuthMethod::Cookie))
}

/// Middleware that requires authentication
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let (token, auth_method) = match extract_token(&request) {
        Some(found) => found,
        None => {
            tracing::debug!(path = %path, "No credentials in header or cookie");
            return AuthError::MissingAuth.into_response();
        }
    };

    match authenticate(&auth_state, &token).await {
        Ok((user_id, email)) => {
            tracing::debug!(
                path = %path,
                user_id = %user_id,
                auth_method = ?auth_method,
                "Authenticated"
            );
            request.extensions_mut().insert(AuthUser {
                user_id,
                email,
                auth_method,
            });
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = ?err, "Authentication failed");
            err.into_response()
        }
    }
}

/// Validate a token locally when the JWT secret is configured, otherwise
/// ask the Supabase auth endpoint (with a short cache).
async fn authenticate(
    auth_state: &AuthState,
    token: &str,
) -> Result<(Uuid, Option<String>), AuthError> {
    if let Some(jwt_manager) = &auth_state.jwt_manager {
        let claims = jwt_manager.validate_access_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Local token validation failed");
            AuthError::InvalidToken
        })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        return Ok((user_id, claims.email));
    }

    verify_with_supabase(auth_state, token).await
}

/// Response from the Supabase /auth/v1/user endpoint
#[derive(Debug, Clone, Deserialize)]
struct SupabaseUserResponse {
    id: String,
    email: Option<String>,
}

async fn verify_with_supabase(
    auth_state: &AuthState,
    token: &str,
) -> Result<(Uuid, Option<String>), AuthError> {
    if auth_state.supabase_url.is_empty() {
        tracing::error!("No JWT secret and no Supabase URL configured, cannot verify tokens");
        return Err(AuthError::VerificationUnavailable);
    }

    // Cache hit?
    {
        let cache = auth_state.token_cache.read().await;
        if let Some(cached) = cache.get(token) {
            if cached.cached_at.elapsed() < TOKEN_CACHE_TTL {
                return Ok((cached.user_id, cached.email.clone()));
            }
        }
    }

    let url = format!("{}/auth/v1/user", auth_state.supabase_url);
    let response = auth_state
        .http_client
        .get(&url)
        .header("Authorization", format!("Bearer {}", token))
        .header("apikey", &auth_state.supabase_anon_key)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Supabase token verification request failed");
            AuthError::VerificationUnavailable
        })?;

    if !response.status().is_success() {
        return Err(AuthError::InvalidToken);
    }

    let user: SupabaseUserResponse = response.json().await.map_err(|e| {
        tracing::error!(error = %e, "Supabase token verification returned invalid body");
        AuthError::VerificationUnavailable
    })?;

    let user_id = Uuid::parse_str(&user.id).map_err(|_| AuthError::InvalidToken)?;

    // Cache the result, bounded.
    {
        let mut cache = auth_state.token_cache.write().await;
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.retain(|_, v| v.cached_at.elapsed() < TOKEN_CACHE_TTL);
        }
        if cache.len() < MAX_CACHE_ENTRIES {
            cache.insert(
                token.to_string(),
                CachedVerification {
                    user_id,
                    email: user.email.clone(),
                    cached_at: Instant::now(),
                },
            );
        }
    }

    Ok((user_id, user.email))
}
