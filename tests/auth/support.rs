//! Shared setup for the session lifecycle integration tests.
//!
//! Each test gets a fresh in-memory SQLite database with the production
//! migrations applied. Pools are capped at one connection so every test
//! binary-local database stays isolated.

use keygate::auth::models::{ClientMetadata, SessionResponse};
use keygate::auth::validation::{LoginPasswordRequest, RegisterPasswordRequest};
use keygate::auth::{JwtSigner, SessionService};
use keygate::config::AuthConfig;
use keygate::storage::DbPool;
use sqlx::sqlite::SqlitePoolOptions;

pub const TEST_SIGNING_KEY: &str = "integration-test-signing-key-0123456789";

pub struct TestHarness {
    pub pool: DbPool,
    pub service: SessionService,
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_issuer: "keygate-tests".to_string(),
        jwt_audience: vec!["internal".to_string()],
        jwt_signing_key: TEST_SIGNING_KEY.to_string(),
        ..Default::default()
    }
}

pub fn test_signer() -> JwtSigner {
    JwtSigner::new("keygate-tests", vec!["internal".to_string()], TEST_SIGNING_KEY.as_bytes())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn setup() -> TestHarness {
    init_tracing();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("create sqlite pool");

    keygate::storage::run_migrations(&pool).await.expect("run migrations for tests");

    let service = SessionService::with_sqlx(pool.clone(), test_auth_config());
    TestHarness { pool, service }
}

pub fn register_request(email: &str, password: &str) -> RegisterPasswordRequest {
    RegisterPasswordRequest {
        primary_email: email.to_string(),
        password: password.to_string(),
        public_identifier: email.split('@').next().unwrap_or("entity").to_string(),
        primary_phone: None,
        client: ClientMetadata::default(),
    }
}

pub fn login_request(identifier: &str, password: &str) -> LoginPasswordRequest {
    LoginPasswordRequest {
        identifier: identifier.to_string(),
        password: password.to_string(),
        client: ClientMetadata::default(),
    }
}

pub async fn register(harness: &TestHarness, email: &str, password: &str) -> SessionResponse {
    let response = harness
        .service
        .register_password(&register_request(email, password))
        .await
        .expect("register entity");
    assert!(response.valid, "registration should succeed: {}", response.error);
    response
}

pub async fn count_rows(pool: &DbPool, table: &str) -> i64 {
    let query = format!("SELECT COUNT(*) FROM {}", table);
    sqlx::query_scalar(&query).fetch_one(pool).await.expect("count rows")
}

pub async fn count_active_rows(pool: &DbPool, table: &str) -> i64 {
    let query = format!("SELECT COUNT(*) FROM {} WHERE active = 1", table);
    sqlx::query_scalar(&query).fetch_one(pool).await.expect("count active rows")
}
