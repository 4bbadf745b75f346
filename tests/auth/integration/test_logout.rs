use keygate::auth::models::ClientMetadata;
use keygate::auth::validation::{
    LogoutAllRequest, LogoutRefreshTokenRequest, LogoutTokenRequest, RefreshTokenRequest,
};

use crate::support::{self, count_active_rows};

#[tokio::test]
async fn logout_token_revokes_only_that_access_token() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "alice@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    let response = harness
        .service
        .logout_token(&LogoutTokenRequest {
            entity: entity.clone(),
            token: registered.token.clone(),
            client: ClientMetadata::default(),
        })
        .await
        .unwrap();
    assert!(response.valid);

    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 0);
    // The refresh token is untouched.
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 1);

    let revoked_at: Option<i64> =
        sqlx::query_scalar("SELECT revoked_at FROM entity_tokens WHERE token = $1")
            .bind(&registered.token)
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert!(revoked_at.is_some());
}

#[tokio::test]
async fn logging_out_an_already_revoked_token_is_a_no_op_success() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "bob@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    let request = LogoutTokenRequest {
        entity: entity.clone(),
        token: registered.token.clone(),
        client: ClientMetadata::default(),
    };

    let first = harness.service.logout_token(&request).await.unwrap();
    assert!(first.valid);

    let second = harness.service.logout_token(&request).await.unwrap();
    assert!(second.valid, "repeat logout must succeed as a no-op");

    // Unknown tokens behave the same way.
    let unknown = harness
        .service
        .logout_token(&LogoutTokenRequest {
            entity,
            token: "never-issued".to_string(),
            client: ClientMetadata::default(),
        })
        .await
        .unwrap();
    assert!(unknown.valid);
}

#[tokio::test]
async fn logout_refresh_token_blocks_further_refreshes() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "carol@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    let response = harness
        .service
        .logout_refresh_token(&LogoutRefreshTokenRequest {
            entity: entity.clone(),
            refresh_token: registered.refresh_token.clone(),
            client: ClientMetadata::default(),
        })
        .await
        .unwrap();
    assert!(response.valid);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 0);

    let refresh = harness
        .service
        .refresh_token(&RefreshTokenRequest {
            entity,
            refresh_token: registered.refresh_token.clone(),
            client: ClientMetadata::default(),
        })
        .await
        .unwrap();
    assert!(!refresh.valid);
    assert_eq!(refresh.error, "Invalid token");
}

#[tokio::test]
async fn logout_all_revokes_every_session_and_kills_refresh() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "dave@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    // Second session via login.
    let second = harness
        .service
        .login_password(&support::login_request("dave@example.com", "pw123-long-enough"))
        .await
        .unwrap();
    assert!(second.valid);
    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 2);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 2);

    let response = harness
        .service
        .logout_all(&LogoutAllRequest { entity: entity.clone(), client: ClientMetadata::default() })
        .await
        .unwrap();
    assert!(response.valid);

    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 0);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 0);

    // No valid token can be derived from a fully logged-out entity.
    for refresh_token in [&registered.refresh_token, &second.refresh_token] {
        let refresh = harness
            .service
            .refresh_token(&RefreshTokenRequest {
                entity: entity.clone(),
                refresh_token: refresh_token.clone(),
                client: ClientMetadata::default(),
            })
            .await
            .unwrap();
        assert!(!refresh.valid);
        assert_eq!(refresh.error, "Invalid token");
    }
}

#[tokio::test]
async fn logout_all_does_not_touch_other_entities() {
    let harness = support::setup().await;
    let alice = support::register(&harness, "alice3@example.com", "pw123-long-enough").await;
    let _bob = support::register(&harness, "bob3@example.com", "pw123-long-enough").await;

    harness
        .service
        .logout_all(&LogoutAllRequest {
            entity: alice.entity.clone().unwrap(),
            client: ClientMetadata::default(),
        })
        .await
        .unwrap();

    // Bob's session survives Alice's logout-everywhere.
    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 1);
}
