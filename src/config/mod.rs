//! # Configuration Management
//!
//! Process configuration for the keygate session engine: the database
//! connection settings and the JWT issuer/audience/signing-key triple.
//! Loaded once at startup and handed to constructors explicitly.

mod settings;

pub use settings::{AppConfig, AuthConfig, DatabaseConfig};
