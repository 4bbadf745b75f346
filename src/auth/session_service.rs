//! The session lifecycle facade.
//!
//! One operation per use case: registration, password and refresh-token
//! login, token refresh, the three logout shapes, verification-code
//! issuance and consumption, forgot/change password, soft deletion, and
//! the entity details projection.
//!
//! Every operation follows the same discipline: validate the request,
//! perform the gating reads, produce crypto material, then hand the
//! repository exactly one transaction's worth of writes. Business-rule
//! failures (wrong password, expired token, duplicate email) come back as
//! `valid = false` envelopes; store and crypto failures come back as
//! `Err` so the caller can decide on retry/backoff. This layer never
//! retries anything itself.

use std::sync::{Arc, LazyLock};

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::hashing;
use crate::auth::jwt::JwtSigner;
use crate::auth::models::{
    AccessTokenResponse, AcknowledgeResponse, ClientMetadata, EntityDetailsResponse,
    NewAccessToken, NewPasswordRegistration, NewRefreshToken, NewSessionTokens,
    PasswordResetResponse, SessionResponse, VerificationCodeResponse,
};
use crate::auth::secrets::{self, TOKEN_RANDOM_ID_LENGTH};
use crate::auth::validation::{
    ChangePasswordRequest, DeleteEntityRequest, ForgotPasswordRequest, GetEntityDetailsRequest,
    GetVerificationCodeRequest, LoginPasswordRequest, LoginRefreshTokenRequest, LogoutAllRequest,
    LogoutRefreshTokenRequest, LogoutTokenRequest, RefreshTokenRequest, RegisterPasswordRequest,
    VerifyEntityRequest,
};
use crate::config::AuthConfig;
use crate::domain::{AccessTokenId, EntityId, RefreshTokenId};
use crate::errors::{Error, Result};
use crate::storage::repositories::{
    EntityRepository, SessionTokenRepository, SqlxEntityRepository, SqlxSessionTokenRepository,
};
use crate::storage::DbPool;

/// Pre-computed dummy hash for timing-safe entity enumeration prevention.
/// When an unknown identifier is used, we still run Argon2 verification
/// against this hash so the response time matches real verification.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hashing::hash_password("dummy_startup_value")
        .unwrap_or_else(|_| "$argon2id$v=19$m=768,t=1,p=1$dW5rbm93bg$dW5rbm93bg".to_string())
});

const ERR_INCORRECT_PASSWORD: &str = "Incorrect password";
const ERR_EXISTING_EMAIL: &str = "Existing email";
const ERR_INVALID_TOKEN: &str = "Invalid token";
const ERR_NOT_FOUND: &str = "Not found";

/// Single entry point for the credential and session lifecycle.
///
/// Stateless between calls; all durable state lives in the injected store.
#[derive(Clone)]
pub struct SessionService {
    entities: Arc<dyn EntityRepository>,
    tokens: Arc<dyn SessionTokenRepository>,
    signer: JwtSigner,
    config: AuthConfig,
}

impl SessionService {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        tokens: Arc<dyn SessionTokenRepository>,
        config: AuthConfig,
    ) -> Self {
        let signer = JwtSigner::new(
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
            config.jwt_signing_key.as_bytes(),
        );
        Self { entities, tokens, signer, config }
    }

    pub fn with_sqlx(pool: DbPool, config: AuthConfig) -> Self {
        Self::new(
            Arc::new(SqlxEntityRepository::new(pool.clone())),
            Arc::new(SqlxSessionTokenRepository::new(pool)),
            config,
        )
    }

    /// The signer this service issues and verifies tokens with.
    pub fn signer(&self) -> &JwtSigner {
        &self.signer
    }

    /// Register a new entity with a password credential.
    ///
    /// Registration auto-logs-in: the new entity receives an access/refresh
    /// pair in the same transaction that creates it.
    #[instrument(skip(self, request), fields(email = %request.primary_email))]
    pub async fn register_password(
        &self,
        request: &RegisterPasswordRequest,
    ) -> Result<SessionResponse> {
        request.validate().map_err(Error::from)?;

        if self.entities.find_entity_id_by_email(&request.primary_email).await?.is_some() {
            warn!(email = %request.primary_email, "registration attempt with existing email");
            return Ok(SessionResponse::rejected(ERR_EXISTING_EMAIL));
        }

        let now = chrono::Utc::now().timestamp();
        let entity_id = EntityId::new();
        let password_hash = hashing::hash_password(&request.password)?;

        let registration = NewPasswordRegistration {
            entity_id: entity_id.clone(),
            credential_id: crate::domain::CredentialId::new(),
            primary_email: request.primary_email.clone(),
            primary_phone: request.primary_phone.clone(),
            public_identifier: request.public_identifier.clone(),
            identifier: request.primary_email.clone(),
            password_hash,
            created_at: now,
        };

        let session = self.mint_session_tokens(&entity_id, now, &request.client)?;
        self.entities.register_with_password(&registration, &session).await?;

        info!(entity_id = %entity_id, "entity registered with password credential");
        Ok(SessionResponse::issued(entity_id, &session))
    }

    /// Authenticate with identifier + password and issue a fresh session.
    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn login_password(&self, request: &LoginPasswordRequest) -> Result<SessionResponse> {
        request.validate().map_err(Error::from)?;

        let credential = match self.entities.find_password_credential(&request.identifier).await? {
            Some(credential) => credential,
            None => {
                // Burn the same hashing cost as a real verification so
                // unknown identifiers are not distinguishable by timing.
                let _ = hashing::verify_password(&DUMMY_HASH, &request.password);
                warn!(identifier = %request.identifier, "login attempt for unknown identifier");
                return Ok(SessionResponse::rejected(ERR_INCORRECT_PASSWORD));
            }
        };

        if !hashing::verify_password(&credential.password_hash, &request.password) {
            warn!(entity_id = %credential.entity_id, "login attempt with incorrect password");
            return Ok(SessionResponse::rejected(ERR_INCORRECT_PASSWORD));
        }

        let now = chrono::Utc::now().timestamp();
        let session = self.mint_session_tokens(&credential.entity_id, now, &request.client)?;
        self.tokens.issue_session(&session).await?;

        info!(entity_id = %credential.entity_id, "entity logged in with password");
        Ok(SessionResponse::issued(credential.entity_id, &session))
    }

    /// Mint a new access token from a valid refresh token.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn login_refresh_token(
        &self,
        request: &LoginRefreshTokenRequest,
    ) -> Result<AccessTokenResponse> {
        request.validate().map_err(Error::from)?;

        match self
            .issue_access_from_refresh(&request.entity, &request.refresh_token, &request.client)
            .await?
        {
            Some(access) => Ok(AccessTokenResponse::issued(request.entity.clone(), &access)),
            None => Ok(AccessTokenResponse::rejected(ERR_INVALID_TOKEN)),
        }
    }

    /// Mint a new access token from a valid refresh token.
    ///
    /// Identical semantics to [`Self::login_refresh_token`]; both names are
    /// kept because callers use them at different points of a session's
    /// life (initial resumption vs. mid-session refresh).
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn refresh_token(
        &self,
        request: &RefreshTokenRequest,
    ) -> Result<AccessTokenResponse> {
        request.validate().map_err(Error::from)?;

        match self
            .issue_access_from_refresh(&request.entity, &request.refresh_token, &request.client)
            .await?
        {
            Some(access) => Ok(AccessTokenResponse::issued(request.entity.clone(), &access)),
            None => Ok(AccessTokenResponse::rejected(ERR_INVALID_TOKEN)),
        }
    }

    /// Revoke a single access token.
    ///
    /// Revoking a token that is unknown, expired, or already revoked is a
    /// successful no-op: revocation is terminal and re-requesting it is not
    /// an error.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn logout_token(&self, request: &LogoutTokenRequest) -> Result<AcknowledgeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        match self.tokens.find_active_access_token(&request.entity, &request.token).await? {
            Some(id) => {
                self.tokens.revoke_access_token(&id, now).await?;
                info!(entity_id = %request.entity, token_id = %id, "access token revoked");
            }
            None => {
                info!(entity_id = %request.entity, "logout for inactive access token, no-op");
            }
        }

        Ok(AcknowledgeResponse::acknowledged(request.entity.clone()))
    }

    /// Revoke a single refresh token.
    ///
    /// Access tokens already issued under it stay valid until their own
    /// expiry; see `logout_all` for the hard stop.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn logout_refresh_token(
        &self,
        request: &LogoutRefreshTokenRequest,
    ) -> Result<AcknowledgeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        match self
            .tokens
            .find_active_refresh_token(&request.entity, &request.refresh_token, now)
            .await?
        {
            Some(id) => {
                self.tokens.revoke_refresh_token(&id, now).await?;
                info!(entity_id = %request.entity, refresh_token_id = %id, "refresh token revoked");
            }
            None => {
                info!(entity_id = %request.entity, "logout for inactive refresh token, no-op");
            }
        }

        Ok(AcknowledgeResponse::acknowledged(request.entity.clone()))
    }

    /// Revoke every active access and refresh token for the entity.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn logout_all(&self, request: &LogoutAllRequest) -> Result<AcknowledgeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        self.tokens.revoke_all_for_entity(&request.entity, now).await?;

        info!(entity_id = %request.entity, "all sessions revoked");
        Ok(AcknowledgeResponse::acknowledged(request.entity.clone()))
    }

    /// Generate and store a verification code for the entity.
    ///
    /// Overwrites any prior unexpired code. Delivering the code out of band
    /// is the caller's responsibility.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn get_verification_code(
        &self,
        request: &GetVerificationCodeRequest,
    ) -> Result<VerificationCodeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        let code = secrets::random_token(TOKEN_RANDOM_ID_LENGTH)?;
        let expires_at = now + self.config.verification_code_ttl_seconds as i64;

        let stored =
            self.entities.store_verification_code(&request.entity, &code, expires_at).await?;
        if !stored {
            warn!(entity_id = %request.entity, "verification code requested for unknown entity");
            return Ok(VerificationCodeResponse::rejected(ERR_NOT_FOUND));
        }

        info!(entity_id = %request.entity, "verification code issued");
        Ok(VerificationCodeResponse::issued(request.entity.clone(), code))
    }

    /// Consume a verification code, marking the entity verified.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn verify_entity(&self, request: &VerifyEntityRequest) -> Result<AcknowledgeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        let entity = match self
            .entities
            .find_verifiable_entity(&request.entity, &request.code, now)
            .await?
        {
            Some(entity) => entity,
            None => {
                warn!(entity_id = %request.entity, "verification failed: no matching code");
                return Ok(AcknowledgeResponse::rejected(ERR_NOT_FOUND));
            }
        };

        self.entities.mark_verified(&entity).await?;

        info!(entity_id = %entity, "entity verified");
        Ok(AcknowledgeResponse::acknowledged(entity))
    }

    /// Begin a password reset: generate a reset token for the entity
    /// registered under this email.
    #[instrument(skip(self, request), fields(email = %request.primary_email))]
    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<PasswordResetResponse> {
        request.validate().map_err(Error::from)?;

        let entity = match self.entities.find_entity_id_by_email(&request.primary_email).await? {
            Some(entity) => entity,
            None => {
                warn!(email = %request.primary_email, "password reset requested for unknown email");
                return Ok(PasswordResetResponse::rejected(ERR_NOT_FOUND));
            }
        };

        let now = chrono::Utc::now().timestamp();
        let reset_token = secrets::random_token(TOKEN_RANDOM_ID_LENGTH)?;
        let expires_at = now + self.config.password_reset_ttl_seconds as i64;

        let stored =
            self.entities.store_password_reset_token(&entity, &reset_token, expires_at).await?;
        if !stored {
            warn!(entity_id = %entity, "entity has no active password method for reset");
            return Ok(PasswordResetResponse::rejected(ERR_NOT_FOUND));
        }

        info!(entity_id = %entity, "password reset token issued");
        Ok(PasswordResetResponse::issued(entity, reset_token))
    }

    /// Complete a password reset: store the new hash and revoke every
    /// outstanding token for the entity, forcing re-authentication
    /// everywhere.
    #[instrument(skip(self, request), fields(email = %request.primary_email))]
    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<AcknowledgeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        let credential = match self
            .entities
            .find_reset_credential(&request.primary_email, &request.password_reset_token, now)
            .await?
        {
            Some(credential) => credential,
            None => {
                warn!(email = %request.primary_email, "password change with invalid reset token");
                return Ok(AcknowledgeResponse::rejected(ERR_NOT_FOUND));
            }
        };

        let password_hash = hashing::hash_password(&request.password)?;
        self.entities.apply_password_change(&credential, &password_hash, now).await?;

        info!(entity_id = %credential.entity_id, "password changed, all sessions revoked");
        Ok(AcknowledgeResponse::acknowledged(credential.entity_id))
    }

    /// Soft-delete the entity, recording the reason in the append-only
    /// audit table.
    ///
    /// Outstanding tokens are deliberately left to expire on their own;
    /// callers that need an immediate lockout pair this with `logout_all`.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn delete_entity(&self, request: &DeleteEntityRequest) -> Result<AcknowledgeResponse> {
        request.validate().map_err(Error::from)?;

        let now = chrono::Utc::now().timestamp();
        let deleted = self.entities.soft_delete(&request.entity, &request.reason, now).await?;
        if !deleted {
            warn!(entity_id = %request.entity, "deletion requested for unknown entity");
            return Ok(AcknowledgeResponse::rejected(ERR_NOT_FOUND));
        }

        info!(entity_id = %request.entity, "entity soft-deleted");
        Ok(AcknowledgeResponse::acknowledged(request.entity.clone()))
    }

    /// Read-only projection of an active entity.
    #[instrument(skip(self, request), fields(entity_id = %request.entity))]
    pub async fn get_entity_details(
        &self,
        request: &GetEntityDetailsRequest,
    ) -> Result<EntityDetailsResponse> {
        request.validate().map_err(Error::from)?;

        match self.entities.get_details(&request.entity).await? {
            Some(entity) => Ok(EntityDetailsResponse::found(entity)),
            None => Ok(EntityDetailsResponse::rejected(ERR_NOT_FOUND)),
        }
    }

    /// Verify the refresh token cryptographically and against the store,
    /// then mint (and persist) a new access token bound to it.
    ///
    /// Returns `None` for every business-rule failure: bad signature,
    /// malformed token, expired window, or no matching active row. The
    /// refresh token itself is neither rotated nor extended.
    async fn issue_access_from_refresh(
        &self,
        entity: &EntityId,
        refresh_token: &str,
        client: &ClientMetadata,
    ) -> Result<Option<NewAccessToken>> {
        let now = chrono::Utc::now().timestamp();

        let claims = match self.signer.verify(refresh_token) {
            Ok(claims) => claims,
            Err(Error::Auth { .. }) => {
                warn!(entity_id = %entity, "refresh token failed signature verification");
                return Ok(None);
            }
            Err(other) => return Err(other),
        };

        if claims.check_validity(now).is_err() {
            warn!(entity_id = %entity, "refresh token outside its validity window");
            return Ok(None);
        }

        let refresh_token_id =
            match self.tokens.find_active_refresh_token(entity, refresh_token, now).await? {
                Some(id) => id,
                None => {
                    warn!(entity_id = %entity, "refresh token has no active store record");
                    return Ok(None);
                }
            };

        let access = self.mint_access_token(entity, &refresh_token_id, now, client)?;
        self.tokens.issue_access_token(&access).await?;

        info!(entity_id = %entity, refresh_token_id = %refresh_token_id, "access token refreshed");
        Ok(Some(access))
    }

    /// Build a refresh/access pair for `entity`, signed but not yet
    /// persisted. The access token references the refresh row it will be
    /// stored with, which is unexpired by construction.
    fn mint_session_tokens(
        &self,
        entity: &EntityId,
        now: i64,
        client: &ClientMetadata,
    ) -> Result<NewSessionTokens> {
        let refresh_expires_at = now + self.config.refresh_token_ttl_seconds as i64;
        let refresh_jti = secrets::random_token(TOKEN_RANDOM_ID_LENGTH)?;
        let refresh_jwt =
            self.signer.issue(entity.as_str(), &refresh_jti, now, now, refresh_expires_at)?;

        let refresh = NewRefreshToken {
            id: RefreshTokenId::new(),
            entity_id: entity.clone(),
            token: refresh_jwt,
            token_random_id: refresh_jti,
            client: client.clone(),
            created_at: now,
            expires_at: refresh_expires_at,
        };

        let access = self.mint_access_token(entity, &refresh.id, now, client)?;

        Ok(NewSessionTokens { refresh, access })
    }

    /// Build a signed access token bound to an existing refresh token row.
    fn mint_access_token(
        &self,
        entity: &EntityId,
        refresh_token_id: &RefreshTokenId,
        now: i64,
        client: &ClientMetadata,
    ) -> Result<NewAccessToken> {
        let expires_at = now + self.config.access_token_ttl_seconds as i64;
        let jti = secrets::random_token(TOKEN_RANDOM_ID_LENGTH)?;
        let jwt = self.signer.issue(entity.as_str(), &jti, now, now, expires_at)?;

        Ok(NewAccessToken {
            id: AccessTokenId::new(),
            entity_id: entity.clone(),
            refresh_token_id: refresh_token_id.clone(),
            token: jwt,
            token_random_id: jti,
            client: client.clone(),
            created_at: now,
            expires_at,
        })
    }
}
