//! Supabase access token validation

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::Deserialize;

/// Claims of a Supabase-issued access token
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseClaims {
    /// User id (uuid)
    pub sub: String,
    pub email: Option<String>,
    #[allow(dead_code)]
    pub exp: usize,
}

/// Validates Supabase HS256 access tokens with the project JWT secret
#[derive(Clone)]
pub struct JwtManager {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(supabase_jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Supabase stamps access tokens with this audience.
        validation.set_audience(&["authenticated"]);

        Self {
            decoding_key: DecodingKey::from_secret(supabase_jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Validate signature, expiry, and audience; returns the claims.
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<SupabaseClaims, jsonwebtoken::errors::Error> {
        let data: TokenData<SupabaseClaims> =
            decode(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}
