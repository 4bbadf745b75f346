//! # Configuration Settings
//!
//! Defines the configuration structure for the keygate session engine.
//! Configuration is read once at startup and passed by value into the
//! constructors that need it; nothing is cached in process globals.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Token signing and lifetime configuration
    #[validate(nested)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from the environment (reading `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config =
            Self { database: DatabaseConfig::from_env(), auth: AuthConfig::from_env()? };
        config.validate_all()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_all(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite://") && !self.database.url.starts_with("sqlite:")
        {
            return Err(Error::validation("Database URL must start with 'sqlite://'"));
        }

        if self.auth.jwt_signing_key.len() < 32 {
            return Err(Error::validation(
                "JWT signing key must be at least 32 characters long",
            ));
        }

        if self.auth.access_token_ttl_seconds >= self.auth.refresh_token_ttl_seconds {
            return Err(Error::validation(
                "Access token TTL must be shorter than refresh token TTL",
            ));
        }

        Ok(())
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/keygate.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/keygate.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);

        let connect_timeout_seconds = std::env::var("DATABASE_CONNECT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        let idle_timeout_seconds = std::env::var("DATABASE_IDLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600);

        let auto_migrate = std::env::var("DATABASE_AUTO_MIGRATE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(true);

        Self {
            url,
            max_connections,
            min_connections,
            connect_timeout_seconds,
            idle_timeout_seconds,
            auto_migrate,
        }
    }
}

/// Token signing and lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// JWT issuer claim
    #[validate(length(min = 1, message = "JWT issuer cannot be empty"))]
    pub jwt_issuer: String,

    /// JWT audience claim values
    #[validate(length(min = 1, message = "JWT audience cannot be empty"))]
    pub jwt_audience: Vec<String>,

    /// Shared secret for HMAC token signing/verification
    #[validate(length(min = 1, message = "JWT signing key cannot be empty"))]
    pub jwt_signing_key: String,

    /// Access token lifetime in seconds
    #[validate(range(min = 60, max = 86400, message = "Access token TTL must be 1m-24h"))]
    pub access_token_ttl_seconds: u64,

    /// Refresh token lifetime in seconds
    #[validate(range(min = 3600, message = "Refresh token TTL must be at least 1h"))]
    pub refresh_token_ttl_seconds: u64,

    /// Verification code lifetime in seconds
    #[validate(range(min = 60, max = 86400, message = "Verification code TTL must be 1m-24h"))]
    pub verification_code_ttl_seconds: u64,

    /// Password reset token lifetime in seconds
    #[validate(range(min = 60, max = 86400, message = "Password reset TTL must be 1m-24h"))]
    pub password_reset_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_issuer: "keygate".to_string(),
            jwt_audience: vec!["keygate-internal".to_string()],
            jwt_signing_key: String::new(),
            access_token_ttl_seconds: 900,            // 15 minutes
            refresh_token_ttl_seconds: 30 * 24 * 3600, // 30 days
            verification_code_ttl_seconds: 900,
            password_reset_ttl_seconds: 900,
        }
    }
}

impl AuthConfig {
    /// Create AuthConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let jwt_signing_key = std::env::var("KEYGATE_JWT_SIGNING_KEY")
            .map_err(|_| Error::config("KEYGATE_JWT_SIGNING_KEY must be set"))?;

        let jwt_issuer =
            std::env::var("KEYGATE_JWT_ISSUER").unwrap_or_else(|_| "keygate".to_string());

        let jwt_audience = std::env::var("KEYGATE_JWT_AUDIENCE")
            .unwrap_or_else(|_| "keygate-internal".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let access_token_ttl_seconds = std::env::var("KEYGATE_ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(900);

        let refresh_token_ttl_seconds = std::env::var("KEYGATE_REFRESH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30 * 24 * 3600);

        let verification_code_ttl_seconds = std::env::var("KEYGATE_VERIFICATION_CODE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(900);

        let password_reset_ttl_seconds = std::env::var("KEYGATE_PASSWORD_RESET_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(900);

        Ok(Self {
            jwt_issuer,
            jwt_audience,
            jwt_signing_key,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            verification_code_ttl_seconds,
            password_reset_ttl_seconds,
        })
    }

    /// Get access token lifetime as Duration
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_seconds)
    }

    /// Get refresh token lifetime as Duration
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_seconds)
    }
}
