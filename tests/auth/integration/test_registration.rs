use chrono::Utc;

use crate::support::{self, count_active_rows, count_rows, register_request, test_signer};

#[tokio::test]
async fn registration_creates_entity_credential_and_session() {
    let harness = support::setup().await;

    let response = support::register(&harness, "alice@example.com", "pw123-long-enough").await;
    let entity = response.entity.clone().expect("entity id");

    assert_eq!(count_active_rows(&harness.pool, "entities").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entity_login_method_password").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entity_login_methods").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 1);

    // Both returned tokens must validate under the configured signing key
    // and name the entity as subject.
    let signer = test_signer();
    let access_claims = signer.verify(&response.token).expect("access token verifies");
    assert_eq!(access_claims.sub, entity.to_string());
    assert_eq!(access_claims.iss, "keygate-tests");

    let refresh_claims = signer.verify(&response.refresh_token).expect("refresh token verifies");
    assert_eq!(refresh_claims.sub, entity.to_string());

    let now = Utc::now().timestamp();
    assert!(access_claims.check_validity(now).is_ok());
    assert!(refresh_claims.check_validity(now).is_ok());
}

#[tokio::test]
async fn registration_returns_policy_expiries() {
    let harness = support::setup().await;

    let before = Utc::now().timestamp();
    let response = support::register(&harness, "bob@example.com", "pw123-long-enough").await;
    let after = Utc::now().timestamp();

    // Access: 15 minutes; refresh: 30 days, both absolute epoch seconds.
    assert!(response.token_expires_at >= before + 900);
    assert!(response.token_expires_at <= after + 900);
    assert!(response.refresh_token_expires_at >= before + 2_592_000);
    assert!(response.refresh_token_expires_at <= after + 2_592_000);
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_side_effects() {
    let harness = support::setup().await;

    support::register(&harness, "carol@example.com", "pw123-long-enough").await;
    let entities_before = count_rows(&harness.pool, "entities").await;
    let tokens_before = count_rows(&harness.pool, "entity_tokens").await;

    let response = harness
        .service
        .register_password(&register_request("carol@example.com", "another-password"))
        .await
        .unwrap();

    assert!(!response.valid);
    assert_eq!(response.error, "Existing email");
    assert!(response.entity.is_none());
    assert_eq!(count_rows(&harness.pool, "entities").await, entities_before);
    assert_eq!(count_rows(&harness.pool, "entity_tokens").await, tokens_before);
}

#[tokio::test]
async fn malformed_registration_requests_are_errors() {
    let harness = support::setup().await;

    let result =
        harness.service.register_password(&register_request("not-an-email", "pw123-long")).await;
    assert!(result.is_err());

    let result =
        harness.service.register_password(&register_request("dave@example.com", "short")).await;
    assert!(result.is_err());

    assert_eq!(count_rows(&harness.pool, "entities").await, 0);
}

#[tokio::test]
async fn access_token_is_bound_to_the_refresh_row_it_was_issued_with() {
    let harness = support::setup().await;
    let response = support::register(&harness, "erin@example.com", "pw123-long-enough").await;

    let refresh_row_id: String =
        sqlx::query_scalar("SELECT id FROM entity_refresh_tokens WHERE token = $1")
            .bind(&response.refresh_token)
            .fetch_one(&harness.pool)
            .await
            .unwrap();

    let bound_refresh_id: String =
        sqlx::query_scalar("SELECT refresh_token_id FROM entity_tokens WHERE token = $1")
            .bind(&response.token)
            .fetch_one(&harness.pool)
            .await
            .unwrap();

    assert_eq!(bound_refresh_id, refresh_row_id);
}
