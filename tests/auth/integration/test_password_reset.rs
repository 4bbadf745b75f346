use chrono::Utc;

use keygate::auth::models::ClientMetadata;
use keygate::auth::validation::{ChangePasswordRequest, ForgotPasswordRequest};

use crate::support::{self, count_active_rows, login_request};

fn forgot_request(email: &str) -> ForgotPasswordRequest {
    ForgotPasswordRequest { primary_email: email.to_string(), client: ClientMetadata::default() }
}

fn change_request(email: &str, reset_token: &str, password: &str) -> ChangePasswordRequest {
    ChangePasswordRequest {
        primary_email: email.to_string(),
        password_reset_token: reset_token.to_string(),
        password: password.to_string(),
        client: ClientMetadata::default(),
    }
}

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let harness = support::setup().await;

    let response =
        harness.service.forgot_password(&forgot_request("nobody@example.com")).await.unwrap();

    assert!(!response.valid);
    assert_eq!(response.error, "Not found");
    assert!(response.password_reset_token.is_empty());
}

#[tokio::test]
async fn full_reset_flow_changes_password_and_revokes_all_sessions() {
    let harness = support::setup().await;
    support::register(&harness, "alice@example.com", "old-password-123").await;

    let forgot =
        harness.service.forgot_password(&forgot_request("alice@example.com")).await.unwrap();
    assert!(forgot.valid, "{}", forgot.error);
    assert!(!forgot.password_reset_token.is_empty());

    let changed = harness
        .service
        .change_password(&change_request(
            "alice@example.com",
            &forgot.password_reset_token,
            "new-password-456",
        ))
        .await
        .unwrap();
    assert!(changed.valid, "{}", changed.error);

    // Every previously issued token is now inactive.
    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 0);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 0);

    // Old password no longer authenticates; the new one does.
    let old_login = harness
        .service
        .login_password(&login_request("alice@example.com", "old-password-123"))
        .await
        .unwrap();
    assert!(!old_login.valid);

    let new_login = harness
        .service
        .login_password(&login_request("alice@example.com", "new-password-456"))
        .await
        .unwrap();
    assert!(new_login.valid, "{}", new_login.error);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let harness = support::setup().await;
    support::register(&harness, "bob@example.com", "old-password-123").await;

    let forgot = harness.service.forgot_password(&forgot_request("bob@example.com")).await.unwrap();
    assert!(forgot.valid);

    let first = harness
        .service
        .change_password(&change_request(
            "bob@example.com",
            &forgot.password_reset_token,
            "new-password-456",
        ))
        .await
        .unwrap();
    assert!(first.valid);

    let replay = harness
        .service
        .change_password(&change_request(
            "bob@example.com",
            &forgot.password_reset_token,
            "sneaky-password-789",
        ))
        .await
        .unwrap();
    assert!(!replay.valid);
    assert_eq!(replay.error, "Not found");
}

#[tokio::test]
async fn wrong_or_expired_reset_tokens_are_rejected() {
    let harness = support::setup().await;
    support::register(&harness, "carol@example.com", "old-password-123").await;

    let forgot =
        harness.service.forgot_password(&forgot_request("carol@example.com")).await.unwrap();
    assert!(forgot.valid);

    let wrong = harness
        .service
        .change_password(&change_request("carol@example.com", "bogus-token", "new-password-456"))
        .await
        .unwrap();
    assert!(!wrong.valid);
    assert_eq!(wrong.error, "Not found");

    // Age the stored token past its window.
    sqlx::query("UPDATE entity_login_method_password SET password_reset_token_expires_at = $1")
        .bind(Utc::now().timestamp() - 10)
        .execute(&harness.pool)
        .await
        .unwrap();

    let expired = harness
        .service
        .change_password(&change_request(
            "carol@example.com",
            &forgot.password_reset_token,
            "new-password-456",
        ))
        .await
        .unwrap();
    assert!(!expired.valid);
    assert_eq!(expired.error, "Not found");

    // The original password still works; nothing was changed.
    let login = harness
        .service
        .login_password(&login_request("carol@example.com", "old-password-123"))
        .await
        .unwrap();
    assert!(login.valid);
}

#[tokio::test]
async fn a_new_reset_token_overwrites_the_previous_one() {
    let harness = support::setup().await;
    support::register(&harness, "dave@example.com", "old-password-123").await;

    let first = harness.service.forgot_password(&forgot_request("dave@example.com")).await.unwrap();
    let second =
        harness.service.forgot_password(&forgot_request("dave@example.com")).await.unwrap();
    assert!(first.valid && second.valid);
    assert_ne!(first.password_reset_token, second.password_reset_token);

    let stale = harness
        .service
        .change_password(&change_request(
            "dave@example.com",
            &first.password_reset_token,
            "new-password-456",
        ))
        .await
        .unwrap();
    assert!(!stale.valid);

    let current = harness
        .service
        .change_password(&change_request(
            "dave@example.com",
            &second.password_reset_token,
            "new-password-456",
        ))
        .await
        .unwrap();
    assert!(current.valid, "{}", current.error);
}
