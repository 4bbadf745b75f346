use keygate::auth::models::ClientMetadata;
use keygate::auth::validation::{DeleteEntityRequest, GetEntityDetailsRequest};
use keygate::domain::EntityId;

use crate::support::{self, count_active_rows, count_rows};

fn delete_request(entity: EntityId, reason: &str) -> DeleteEntityRequest {
    DeleteEntityRequest { entity, reason: reason.to_string(), client: ClientMetadata::default() }
}

#[tokio::test]
async fn details_project_the_registered_entity() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "alice@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    let response = harness
        .service
        .get_entity_details(&GetEntityDetailsRequest { entity: entity.clone() })
        .await
        .unwrap();

    assert!(response.valid);
    let details = response.entity.expect("entity details");
    assert_eq!(details.id, entity);
    assert_eq!(details.primary_email, "alice@example.com");
    assert_eq!(details.public_identifier, "alice");
    assert!(details.primary_phone.is_none());
    assert!(!details.is_verified);
    assert!(details.active);
    assert!(details.deleted_at.is_none());
    assert!(details.created_at > 0);
}

#[tokio::test]
async fn details_for_unknown_entity_are_not_found() {
    let harness = support::setup().await;

    let response = harness
        .service
        .get_entity_details(&GetEntityDetailsRequest { entity: EntityId::new() })
        .await
        .unwrap();

    assert!(!response.valid);
    assert_eq!(response.error, "Not found");
    assert!(response.entity.is_none());
}

#[tokio::test]
async fn deletion_is_a_soft_delete_with_an_audit_row() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "bob@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    let response = harness
        .service
        .delete_entity(&delete_request(entity.clone(), "user requested account closure"))
        .await
        .unwrap();
    assert!(response.valid, "{}", response.error);

    // Row retained, flagged inactive with a deletion timestamp.
    assert_eq!(count_rows(&harness.pool, "entities").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entities").await, 0);

    let deleted_at: Option<i64> =
        sqlx::query_scalar("SELECT deleted_at FROM entities WHERE id = $1")
            .bind(&entity)
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert!(deleted_at.is_some());

    // The audit row names the entity and carries the reason verbatim.
    let reason: String =
        sqlx::query_scalar("SELECT reason FROM entity_delete_reasons WHERE entity_id = $1")
            .bind(&entity)
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert_eq!(reason, "user requested account closure");

    // Lookups no longer see the entity.
    let details = harness
        .service
        .get_entity_details(&GetEntityDetailsRequest { entity: entity.clone() })
        .await
        .unwrap();
    assert!(!details.valid);
}

#[tokio::test]
async fn deleting_twice_or_deleting_nobody_is_not_found() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "carol@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    let first = harness
        .service
        .delete_entity(&delete_request(entity.clone(), "first deletion"))
        .await
        .unwrap();
    assert!(first.valid);

    let second = harness
        .service
        .delete_entity(&delete_request(entity.clone(), "second deletion"))
        .await
        .unwrap();
    assert!(!second.valid);
    assert_eq!(second.error, "Not found");

    // No orphan audit row for the failed attempt.
    assert_eq!(count_rows(&harness.pool, "entity_delete_reasons").await, 1);

    let unknown = harness
        .service
        .delete_entity(&delete_request(EntityId::new(), "no such entity"))
        .await
        .unwrap();
    assert!(!unknown.valid);
}

#[tokio::test]
async fn deletion_leaves_outstanding_tokens_to_expire_on_their_own() {
    let harness = support::setup().await;
    let registered = support::register(&harness, "dave@example.com", "pw123-long-enough").await;
    let entity = registered.entity.clone().unwrap();

    harness.service.delete_entity(&delete_request(entity, "closing account")).await.unwrap();

    // Token rows are not revoked by deletion; callers pair this with
    // logout_all when they need an immediate lockout.
    assert_eq!(count_active_rows(&harness.pool, "entity_tokens").await, 1);
    assert_eq!(count_active_rows(&harness.pool, "entity_refresh_tokens").await, 1);
}
