//! API configuration.

use std::time::Duration;

/// Secret used when `JWT_SECRET` is unset outside production.
const DEVELOPMENT_JWT_SECRET: &str = "development-only-jwt-secret";

/// Document store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

/// Résumé storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    R2,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Environment (development/production)
    pub environment: String,
    pub cors_origins: Vec<String>,
    /// Requests allowed per client IP within `rate_limit_window`
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Max request body size
    pub max_body_size: usize,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    /// Session cookie lifetime
    pub cookie_expires_in: Duration,
    pub bcrypt_cost: u32,
    /// Largest accepted résumé, in bytes
    pub max_file_size: usize,
    pub reset_token_ttl: Duration,
    pub store_backend: StoreBackend,
    pub storage_backend: StorageBackend,
    pub upload_path: String,
    pub geocoder_api_key: Option<String>,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    /// External origin used in emailed links, e.g. `https://jobs.example.com`
    pub public_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(10 * 60),
            max_body_size: 10 * 1024 * 1024, // 10MB
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            jwt_expires_in: Duration::from_secs(7 * 24 * 3600),
            cookie_expires_in: Duration::from_secs(7 * 24 * 3600),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            max_file_size: 2 * 1000 * 1000, // 2MB
            reset_token_ttl: Duration::from_secs(30 * 60),
            store_backend: StoreBackend::Memory,
            storage_backend: StorageBackend::Local,
            upload_path: jobboard_storage::DEFAULT_UPLOAD_PATH.to_string(),
            geocoder_api_key: None,
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "noreply@jobboard.local".to_string(),
            public_url: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Parse a lifetime such as `7d`, `12h`, `30m`, `45s` or plain seconds.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
        Some(at) => text.split_at(at),
        None => (text, "s"),
    };
    let amount: u64 = digits.parse().ok()?;
    let seconds = match unit {
        "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(3600)?,
        "d" => amount.checked_mul(24 * 3600)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_max: env_parse("RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            rate_limit_window: env_parse("RATE_LIMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            jwt_secret: env_nonempty("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_expires_in: std::env::var("JWT_EXPIRES_TIME")
                .ok()
                .and_then(|s| parse_duration(&s))
                .unwrap_or(defaults.jwt_expires_in),
            cookie_expires_in: env_parse::<u64>("COOKIE_EXPIRES_TIME")
                .map(|days| Duration::from_secs(days * 24 * 3600))
                .unwrap_or(defaults.cookie_expires_in),
            bcrypt_cost: env_parse("BCRYPT_COST").unwrap_or(defaults.bcrypt_cost),
            max_file_size: env_parse("MAX_FILE_SIZE").unwrap_or(defaults.max_file_size),
            reset_token_ttl: env_parse("RESET_TOKEN_TTL_MINS")
                .map(|mins: u64| Duration::from_secs(mins * 60))
                .unwrap_or(defaults.reset_token_ttl),
            store_backend: match std::env::var("STORE_BACKEND").as_deref() {
                Ok("firestore") => StoreBackend::Firestore,
                _ => StoreBackend::Memory,
            },
            storage_backend: match std::env::var("STORAGE_BACKEND").as_deref() {
                Ok("r2") => StorageBackend::R2,
                _ => StorageBackend::Local,
            },
            upload_path: std::env::var("UPLOAD_PATH").unwrap_or(defaults.upload_path),
            geocoder_api_key: env_nonempty("GEOCODER_API_KEY"),
            mail_api_url: env_nonempty("MAIL_API_URL"),
            mail_api_key: env_nonempty("MAIL_API_KEY"),
            mail_from: std::env::var("MAIL_FROM").unwrap_or(defaults.mail_from),
            public_url: env_nonempty("PUBLIC_URL").map(|url| url.trim().trim_end_matches('/').to_string()),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Settings that must not reach production with their development values.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production() && self.jwt_secret == DEVELOPMENT_JWT_SECRET {
            return Err("JWT_SECRET must be set in production".to_string());
        }
        if self.is_production() && self.public_url.is_none() {
            return Err("PUBLIC_URL must be set in production".to_string());
        }
        if self.rate_limit_max == 0 {
            return Err("RATE_LIMIT_MAX must be positive".to_string());
        }
        Ok(())
    }
}
