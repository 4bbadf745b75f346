//! Token repository for access and refresh token persistence.
//!
//! Issuance writes (a refresh/access pair, or a lone access token bound to
//! an existing refresh row) and revocation sweeps each run inside a single
//! transaction; the row-level locking of that transaction is the only
//! concurrency guard the engine relies on.

use crate::auth::models::{NewAccessToken, NewRefreshToken, NewSessionTokens};
use crate::domain::{AccessTokenId, EntityId, RefreshTokenId};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection};

#[derive(Debug, Clone, FromRow)]
struct TokenIdRow {
    pub id: String,
}

#[async_trait]
pub trait SessionTokenRepository: Send + Sync {
    /// Persist a freshly minted refresh/access pair in one transaction.
    async fn issue_session(&self, session: &NewSessionTokens) -> Result<()>;

    /// Persist a new access token bound to an existing refresh token row.
    async fn issue_access_token(&self, token: &NewAccessToken) -> Result<()>;

    /// Find the active, unexpired refresh token row matching entity + token string.
    async fn find_active_refresh_token(
        &self,
        entity: &EntityId,
        token: &str,
        now: i64,
    ) -> Result<Option<RefreshTokenId>>;

    /// Find the active access token row matching entity + token string.
    async fn find_active_access_token(
        &self,
        entity: &EntityId,
        token: &str,
    ) -> Result<Option<AccessTokenId>>;

    async fn revoke_access_token(&self, id: &AccessTokenId, now: i64) -> Result<()>;

    async fn revoke_refresh_token(&self, id: &RefreshTokenId, now: i64) -> Result<()>;

    /// Deactivate every active access and refresh token for the entity in
    /// one transaction.
    async fn revoke_all_for_entity(&self, entity: &EntityId, now: i64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxSessionTokenRepository {
    pool: DbPool,
}

impl SqlxSessionTokenRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Insert a refresh token row on an open connection/transaction.
pub(crate) async fn insert_refresh_token(
    conn: &mut SqliteConnection,
    token: &NewRefreshToken,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO entity_refresh_tokens \
         (id, entity_id, token, token_random_id, ip_address, user_agent, device_fingerprint, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&token.id)
    .bind(&token.entity_id)
    .bind(&token.token)
    .bind(&token.token_random_id)
    .bind(token.client.ip_address.as_deref())
    .bind(token.client.user_agent.as_deref())
    .bind(token.client.device_fingerprint.as_deref())
    .bind(token.created_at)
    .bind(token.expires_at)
    .execute(&mut *conn)
    .await
    .map_err(|err| Error::database(err, "Failed to insert refresh token"))?;

    Ok(())
}

/// Insert an access token row on an open connection/transaction.
pub(crate) async fn insert_access_token(
    conn: &mut SqliteConnection,
    token: &NewAccessToken,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO entity_tokens \
         (id, entity_id, refresh_token_id, token, token_random_id, ip_address, user_agent, device_fingerprint, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&token.id)
    .bind(&token.entity_id)
    .bind(&token.refresh_token_id)
    .bind(&token.token)
    .bind(&token.token_random_id)
    .bind(token.client.ip_address.as_deref())
    .bind(token.client.user_agent.as_deref())
    .bind(token.client.device_fingerprint.as_deref())
    .bind(token.created_at)
    .bind(token.expires_at)
    .execute(&mut *conn)
    .await
    .map_err(|err| Error::database(err, "Failed to insert access token"))?;

    Ok(())
}

/// Deactivate every active token (both kinds) for an entity on an open
/// connection/transaction.
pub(crate) async fn revoke_all_tokens(
    conn: &mut SqliteConnection,
    entity: &EntityId,
    now: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE entity_tokens SET active = 0, revoked_at = $1 WHERE entity_id = $2 AND active = 1",
    )
    .bind(now)
    .bind(entity)
    .execute(&mut *conn)
    .await
    .map_err(|err| Error::database(err, "Failed to revoke access tokens"))?;

    sqlx::query(
        "UPDATE entity_refresh_tokens SET active = 0, revoked_at = $1 \
         WHERE entity_id = $2 AND active = 1",
    )
    .bind(now)
    .bind(entity)
    .execute(&mut *conn)
    .await
    .map_err(|err| Error::database(err, "Failed to revoke refresh tokens"))?;

    Ok(())
}

#[async_trait]
impl SessionTokenRepository for SqlxSessionTokenRepository {
    async fn issue_session(&self, session: &NewSessionTokens) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::database(err, "Failed to begin transaction for session issuance"))?;

        insert_refresh_token(&mut tx, &session.refresh).await?;
        insert_access_token(&mut tx, &session.access).await?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit session issuance"))?;

        Ok(())
    }

    async fn issue_access_token(&self, token: &NewAccessToken) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::database(err, "Failed to begin transaction for token issuance"))?;

        insert_access_token(&mut tx, token).await?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit token issuance"))?;

        Ok(())
    }

    async fn find_active_refresh_token(
        &self,
        entity: &EntityId,
        token: &str,
        now: i64,
    ) -> Result<Option<RefreshTokenId>> {
        let row: Option<TokenIdRow> = sqlx::query_as(
            "SELECT id FROM entity_refresh_tokens \
             WHERE entity_id = $1 AND token = $2 AND active = 1 AND expires_at > $3",
        )
        .bind(entity)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to look up refresh token"))?;

        Ok(row.map(|row| RefreshTokenId::from_string(row.id)))
    }

    async fn find_active_access_token(
        &self,
        entity: &EntityId,
        token: &str,
    ) -> Result<Option<AccessTokenId>> {
        let row: Option<TokenIdRow> = sqlx::query_as(
            "SELECT id FROM entity_tokens WHERE entity_id = $1 AND token = $2 AND active = 1",
        )
        .bind(entity)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to look up access token"))?;

        Ok(row.map(|row| AccessTokenId::from_string(row.id)))
    }

    async fn revoke_access_token(&self, id: &AccessTokenId, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE entity_tokens SET active = 0, revoked_at = $1 WHERE id = $2 AND active = 1",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to revoke access token"))?;

        Ok(())
    }

    async fn revoke_refresh_token(&self, id: &RefreshTokenId, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE entity_refresh_tokens SET active = 0, revoked_at = $1 \
             WHERE id = $2 AND active = 1",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to revoke refresh token"))?;

        Ok(())
    }

    async fn revoke_all_for_entity(&self, entity: &EntityId, now: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|err| {
            Error::database(err, "Failed to begin transaction for revoke-all sweep")
        })?;

        revoke_all_tokens(&mut tx, entity, now).await?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit revoke-all sweep"))?;

        Ok(())
    }
}
