//! Authentication for the PageStash API
//!
//! Extension clients send `Authorization: Bearer <token>`; the web app
//! rides on an HttpOnly session cookie carrying the same Supabase access
//! token. Both funnel through a single resolve step in
//! [`middleware::require_auth`].

mod jwt;
mod middleware;

#[cfg(test)]
mod middleware_tests;

pub use jwt::{JwtManager, SupabaseClaims};
pub use middleware::{
    require_auth, AuthError, AuthMethod, AuthState, AuthUser, SESSION_COOKIE,
};
