//! API server configuration

/// Configuration loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string
    pub database_url: String,
    /// Base URL of the Supabase project (token verification fallback)
    pub supabase_url: String,
    /// Anon key sent alongside token verification requests
    pub supabase_anon_key: String,
    /// HS256 secret for validating Supabase-issued access tokens locally
    pub supabase_jwt_secret: String,
    /// Public base URL of the web app
    pub app_url: String,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Comma-separated CORS origin allowlist
    pub allowed_origins: Vec<String>,
    /// Whether to initialize Stripe billing at startup
    pub enable_billing: bool,
}

impl Config {
    /// Load from environment variables. Only `DATABASE_URL` is hard
    /// required; everything else has a development default or degrades a
    /// feature (billing, token verification fallback) with a warning.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            supabase_url: std::env::var("SUPABASE_URL").unwrap_or_default(),
            supabase_anon_key: std::env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
            supabase_jwt_secret: std::env::var("SUPABASE_JWT_SECRET").unwrap_or_default(),
            app_url: std::env::var("PUBLIC_APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            allowed_origins,
            enable_billing: std::env::var("ENABLE_BILLING")
                .map(|v| v != "false")
                .unwrap_or(true),
        })
    }
}
