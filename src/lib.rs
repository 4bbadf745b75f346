//! # Keygate
//!
//! Keygate is a credential and session lifecycle engine: it authenticates
//! entities by password, issues and rotates signed access/refresh tokens,
//! and manages verification and password-reset flows against a relational
//! store that is the single source of truth.
//!
//! ## Architecture
//!
//! ```text
//! (external) request handlers → SessionService facade → sqlx repositories
//!                                      ↓
//!                        crypto utilities (argon2 / HS256 / OS RNG)
//! ```
//!
//! ## Core Components
//!
//! - **Crypto utilities**: Argon2id password hashing, HMAC-SHA256 JWT
//!   issuance/verification, CSPRNG token generation
//! - **Store**: SQLx repositories over entities, login methods, password
//!   credentials, access tokens, and refresh tokens
//! - **Lifecycle operations**: one atomic transaction per operation,
//!   composed behind the [`SessionService`] facade
//!
//! The HTTP layer, tracing subscriber setup, and status-code mapping are
//! deliberately not part of this crate; callers consume the typed response
//! envelopes and decide those concerns themselves.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use keygate::{AppConfig, Result, SessionService};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let pool = keygate::storage::create_pool(&config.database).await?;
//!     let _sessions = SessionService::with_sqlx(pool, config.auth);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod storage;

// Re-export commonly used types and traits
pub use auth::SessionService;
pub use config::{AppConfig, AuthConfig, DatabaseConfig};
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
