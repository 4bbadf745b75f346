//! Entity repository: entities, their polymorphic login methods, and the
//! password credential records behind them.
//!
//! Multi-statement writes (registration, password change, soft deletion)
//! each run inside one transaction. Validation reads happen on the pool
//! before the owning operation opens its transaction.

use crate::auth::models::{
    Entity, NewPasswordRegistration, NewSessionTokens, PasswordCredential, ResetCredential,
};
use crate::domain::{CredentialId, EntityId};
use crate::errors::{Error, Result};
use crate::storage::repositories::token::{
    insert_access_token, insert_refresh_token, revoke_all_tokens,
};
use crate::storage::DbPool;
use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

/// Discriminator stored in `entity_login_methods.method_type`.
const METHOD_TYPE_PASSWORD: &str = "password";

#[derive(Debug, Clone, FromRow)]
struct EntityIdRow {
    pub id: String,
}

#[derive(Debug, Clone, FromRow)]
struct PasswordCredentialRow {
    pub entity_id: String,
    pub credential_id: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, FromRow)]
struct ResetCredentialRow {
    pub entity_id: String,
    pub credential_id: String,
}

#[derive(Debug, Clone, FromRow)]
struct EntityRow {
    pub id: String,
    pub primary_email: String,
    pub primary_phone: Option<String>,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expires_at: i64,
    pub public_identifier: String,
    pub active: bool,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<EntityRow> for Entity {
    fn from(row: EntityRow) -> Self {
        Entity {
            id: EntityId::from_string(row.id),
            primary_email: row.primary_email,
            primary_phone: row.primary_phone,
            is_verified: row.is_verified,
            verification_code: row.verification_code,
            verification_code_expires_at: row.verification_code_expires_at,
            public_identifier: row.public_identifier,
            active: row.active,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Create the entity, its password credential, the login-method link,
    /// and the registration session tokens in one transaction.
    async fn register_with_password(
        &self,
        registration: &NewPasswordRegistration,
        session: &NewSessionTokens,
    ) -> Result<()>;

    /// Find any entity (active or not) by primary email. Used for the
    /// duplicate-registration check, so soft-deleted entities still count.
    async fn find_entity_id_by_email(&self, email: &str) -> Result<Option<EntityId>>;

    /// Find the active entity/method/credential chain for a login identifier.
    async fn find_password_credential(&self, identifier: &str)
        -> Result<Option<PasswordCredential>>;

    /// Store a verification code on an active entity, overwriting any prior
    /// code. Returns false when no active entity matched.
    async fn store_verification_code(
        &self,
        entity: &EntityId,
        code: &str,
        expires_at: i64,
    ) -> Result<bool>;

    /// Find the entity if it is active and holds this unexpired code.
    async fn find_verifiable_entity(
        &self,
        entity: &EntityId,
        code: &str,
        now: i64,
    ) -> Result<Option<EntityId>>;

    /// Flip `is_verified` and clear the consumed code in one transaction.
    async fn mark_verified(&self, entity: &EntityId) -> Result<()>;

    /// Store a password reset token on the entity's active password
    /// credential. Returns false when the entity has no active password
    /// method.
    async fn store_password_reset_token(
        &self,
        entity: &EntityId,
        token: &str,
        expires_at: i64,
    ) -> Result<bool>;

    /// Find the active entity/credential pair matching email + unexpired
    /// reset token.
    async fn find_reset_credential(
        &self,
        email: &str,
        reset_token: &str,
        now: i64,
    ) -> Result<Option<ResetCredential>>;

    /// Store the new hash, clear the reset token, and revoke every token
    /// for the entity in one transaction.
    async fn apply_password_change(
        &self,
        credential: &ResetCredential,
        password_hash: &str,
        now: i64,
    ) -> Result<()>;

    /// Soft-delete the entity and append the audit reason in one
    /// transaction. Returns false (writing nothing) when no active entity
    /// matched.
    async fn soft_delete(&self, entity: &EntityId, reason: &str, now: i64) -> Result<bool>;

    /// Read-only projection of an active entity.
    async fn get_details(&self, entity: &EntityId) -> Result<Option<Entity>>;
}

#[derive(Debug, Clone)]
pub struct SqlxEntityRepository {
    pool: DbPool,
}

impl SqlxEntityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityRepository for SqlxEntityRepository {
    async fn register_with_password(
        &self,
        registration: &NewPasswordRegistration,
        session: &NewSessionTokens,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::database(err, "Failed to begin transaction for registration"))?;

        sqlx::query(
            "INSERT INTO entities (id, primary_email, primary_phone, public_identifier, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&registration.entity_id)
        .bind(&registration.primary_email)
        .bind(registration.primary_phone.as_deref())
        .bind(&registration.public_identifier)
        .bind(registration.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to insert entity"))?;

        sqlx::query(
            "INSERT INTO entity_login_method_password (id, identifier, password_hash, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&registration.credential_id)
        .bind(&registration.identifier)
        .bind(&registration.password_hash)
        .bind(registration.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to insert password credential"))?;

        sqlx::query(
            "INSERT INTO entity_login_methods (id, entity_id, method_id, method_type, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&registration.entity_id)
        .bind(&registration.credential_id)
        .bind(METHOD_TYPE_PASSWORD)
        .bind(registration.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to link login method"))?;

        insert_refresh_token(&mut tx, &session.refresh).await?;
        insert_access_token(&mut tx, &session.access).await?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit registration"))?;

        Ok(())
    }

    async fn find_entity_id_by_email(&self, email: &str) -> Result<Option<EntityId>> {
        let row: Option<EntityIdRow> =
            sqlx::query_as("SELECT id FROM entities WHERE primary_email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| Error::database(err, "Failed to look up entity by email"))?;

        Ok(row.map(|row| EntityId::from_string(row.id)))
    }

    async fn find_password_credential(
        &self,
        identifier: &str,
    ) -> Result<Option<PasswordCredential>> {
        let row: Option<PasswordCredentialRow> = sqlx::query_as(
            "SELECT e.id AS entity_id, elmp.id AS credential_id, elmp.password_hash \
             FROM entities e \
             JOIN entity_login_methods elm ON e.id = elm.entity_id \
             JOIN entity_login_method_password elmp ON elm.method_id = elmp.id \
             WHERE elm.method_type = $1 AND elmp.identifier = $2 \
               AND e.active = 1 AND elm.active = 1 AND elmp.active = 1",
        )
        .bind(METHOD_TYPE_PASSWORD)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to look up password credential"))?;

        Ok(row.map(|row| PasswordCredential {
            entity_id: EntityId::from_string(row.entity_id),
            credential_id: CredentialId::from_string(row.credential_id),
            password_hash: row.password_hash,
        }))
    }

    async fn store_verification_code(
        &self,
        entity: &EntityId,
        code: &str,
        expires_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE entities SET verification_code = $1, verification_code_expires_at = $2 \
             WHERE id = $3 AND active = 1",
        )
        .bind(code)
        .bind(expires_at)
        .bind(entity)
        .execute(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to store verification code"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_verifiable_entity(
        &self,
        entity: &EntityId,
        code: &str,
        now: i64,
    ) -> Result<Option<EntityId>> {
        let row: Option<EntityIdRow> = sqlx::query_as(
            "SELECT id FROM entities \
             WHERE id = $1 AND active = 1 AND verification_code = $2 \
               AND verification_code_expires_at > $3",
        )
        .bind(entity)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to look up verification code"))?;

        Ok(row.map(|row| EntityId::from_string(row.id)))
    }

    async fn mark_verified(&self, entity: &EntityId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::database(err, "Failed to begin transaction for verification"))?;

        // The code is single-use: consuming it and flipping the flag are
        // the same write.
        sqlx::query(
            "UPDATE entities SET is_verified = 1, verification_code = NULL, \
             verification_code_expires_at = 0 WHERE id = $1",
        )
        .bind(entity)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to mark entity verified"))?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit verification"))?;

        Ok(())
    }

    async fn store_password_reset_token(
        &self,
        entity: &EntityId,
        token: &str,
        expires_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE entity_login_method_password \
             SET password_reset_token = $1, password_reset_token_expires_at = $2 \
             WHERE id = ( \
                 SELECT elmp.id FROM entity_login_methods elm \
                 JOIN entity_login_method_password elmp ON elm.method_id = elmp.id \
                 WHERE elm.active = 1 AND elm.method_type = $3 AND elm.entity_id = $4 \
                 LIMIT 1 \
             )",
        )
        .bind(token)
        .bind(expires_at)
        .bind(METHOD_TYPE_PASSWORD)
        .bind(entity)
        .execute(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to store password reset token"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_reset_credential(
        &self,
        email: &str,
        reset_token: &str,
        now: i64,
    ) -> Result<Option<ResetCredential>> {
        let row: Option<ResetCredentialRow> = sqlx::query_as(
            "SELECT e.id AS entity_id, elmp.id AS credential_id \
             FROM entities e \
             JOIN entity_login_methods elm ON e.id = elm.entity_id \
             JOIN entity_login_method_password elmp ON elm.method_id = elmp.id \
             WHERE e.active = 1 AND elm.active = 1 AND elmp.active = 1 \
               AND elm.method_type = $1 AND e.primary_email = $2 \
               AND elmp.password_reset_token = $3 \
               AND elmp.password_reset_token_expires_at > $4",
        )
        .bind(METHOD_TYPE_PASSWORD)
        .bind(email)
        .bind(reset_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to look up password reset token"))?;

        Ok(row.map(|row| ResetCredential {
            entity_id: EntityId::from_string(row.entity_id),
            credential_id: CredentialId::from_string(row.credential_id),
        }))
    }

    async fn apply_password_change(
        &self,
        credential: &ResetCredential,
        password_hash: &str,
        now: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|err| {
            Error::database(err, "Failed to begin transaction for password change")
        })?;

        sqlx::query(
            "UPDATE entity_login_method_password \
             SET password_hash = $1, password_reset_token = NULL, \
                 password_reset_token_expires_at = 0 \
             WHERE id = $2",
        )
        .bind(password_hash)
        .bind(&credential.credential_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to update password hash"))?;

        // Force re-authentication everywhere.
        revoke_all_tokens(&mut tx, &credential.entity_id, now).await?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit password change"))?;

        Ok(())
    }

    async fn soft_delete(&self, entity: &EntityId, reason: &str, now: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::database(err, "Failed to begin transaction for entity deletion"))?;

        let result = sqlx::query(
            "UPDATE entities SET active = 0, deleted_at = $1 WHERE id = $2 AND active = 1",
        )
        .bind(now)
        .bind(entity)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to soft-delete entity"))?;

        if result.rows_affected() == 0 {
            // Nothing to delete; dropping the transaction rolls back.
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO entity_delete_reasons (id, entity_id, reason, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(entity)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|err| Error::database(err, "Failed to record delete reason"))?;

        tx.commit()
            .await
            .map_err(|err| Error::database(err, "Failed to commit entity deletion"))?;

        Ok(true)
    }

    async fn get_details(&self, entity: &EntityId) -> Result<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            "SELECT id, primary_email, primary_phone, is_verified, verification_code, \
                    verification_code_expires_at, public_identifier, active, created_at, deleted_at \
             FROM entities WHERE active = 1 AND id = $1",
        )
        .bind(entity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::database(err, "Failed to fetch entity details"))?;

        Ok(row.map(Entity::from))
    }
}
