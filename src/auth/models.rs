//! Data models for the session lifecycle engine: stored entity/token
//! shapes, new-row payloads handed to the repositories, and the response
//! envelopes returned by the facade.
//!
//! Every envelope carries `valid` + `error`; callers must check `valid`
//! before trusting any other field. All timestamps are epoch seconds.

use serde::{Deserialize, Serialize};

use crate::domain::{AccessTokenId, CredentialId, EntityId, RefreshTokenId};

/// Stored representation of an authenticable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
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

/// Optional client metadata captured alongside issued tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
}

/// New access token row payload.
#[derive(Debug, Clone)]
pub struct NewAccessToken {
    pub id: AccessTokenId,
    pub entity_id: EntityId,
    pub refresh_token_id: RefreshTokenId,
    pub token: String,
    pub token_random_id: String,
    pub client: ClientMetadata,
    pub created_at: i64,
    pub expires_at: i64,
}

/// New refresh token row payload.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub id: RefreshTokenId,
    pub entity_id: EntityId,
    pub token: String,
    pub token_random_id: String,
    pub client: ClientMetadata,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A freshly minted refresh/access token pair, persisted as one unit.
#[derive(Debug, Clone)]
pub struct NewSessionTokens {
    pub refresh: NewRefreshToken,
    pub access: NewAccessToken,
}

/// Registration payload: the entity row, its password credential, and the
/// login-method link, written together in one transaction.
#[derive(Debug, Clone)]
pub struct NewPasswordRegistration {
    pub entity_id: EntityId,
    pub credential_id: CredentialId,
    pub primary_email: String,
    pub primary_phone: Option<String>,
    pub public_identifier: String,
    pub identifier: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// Credential lookup result used by password login.
#[derive(Debug, Clone)]
pub struct PasswordCredential {
    pub entity_id: EntityId,
    pub credential_id: CredentialId,
    pub password_hash: String,
}

/// Reset lookup result used by change-password.
#[derive(Debug, Clone)]
pub struct ResetCredential {
    pub entity_id: EntityId,
    pub credential_id: CredentialId,
}

/// Envelope for operations that issue a full access + refresh pair
/// (registration and password login).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub entity: Option<EntityId>,
    pub token: String,
    pub token_expires_at: i64,
    pub refresh_token: String,
    pub refresh_token_expires_at: i64,
    pub valid: bool,
    pub error: String,
}

impl SessionResponse {
    pub fn issued(entity: EntityId, tokens: &NewSessionTokens) -> Self {
        Self {
            entity: Some(entity),
            token: tokens.access.token.clone(),
            token_expires_at: tokens.access.expires_at,
            refresh_token: tokens.refresh.token.clone(),
            refresh_token_expires_at: tokens.refresh.expires_at,
            valid: true,
            error: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            entity: None,
            token: String::new(),
            token_expires_at: 0,
            refresh_token: String::new(),
            refresh_token_expires_at: 0,
            valid: false,
            error: message.into(),
        }
    }
}

/// Envelope for operations that mint only a new access token
/// (refresh flows).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub entity: Option<EntityId>,
    pub token: String,
    pub token_expires_at: i64,
    pub valid: bool,
    pub error: String,
}

impl AccessTokenResponse {
    pub fn issued(entity: EntityId, token: &NewAccessToken) -> Self {
        Self {
            entity: Some(entity),
            token: token.token.clone(),
            token_expires_at: token.expires_at,
            valid: true,
            error: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            entity: None,
            token: String::new(),
            token_expires_at: 0,
            valid: false,
            error: message.into(),
        }
    }
}

/// Envelope for operations that carry no payload beyond the outcome
/// (logouts, verification, password change, deletion).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeResponse {
    pub entity: Option<EntityId>,
    pub valid: bool,
    pub error: String,
}

impl AcknowledgeResponse {
    pub fn acknowledged(entity: EntityId) -> Self {
        Self { entity: Some(entity), valid: true, error: String::new() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { entity: None, valid: false, error: message.into() }
    }
}

/// Envelope carrying a freshly generated verification code. Delivery of
/// the code to the entity is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCodeResponse {
    pub entity: Option<EntityId>,
    pub code: String,
    pub valid: bool,
    pub error: String,
}

impl VerificationCodeResponse {
    pub fn issued(entity: EntityId, code: String) -> Self {
        Self { entity: Some(entity), code, valid: true, error: String::new() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { entity: None, code: String::new(), valid: false, error: message.into() }
    }
}

/// Envelope carrying a password reset token. Delivery is the caller's
/// responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetResponse {
    pub entity: Option<EntityId>,
    pub password_reset_token: String,
    pub valid: bool,
    pub error: String,
}

impl PasswordResetResponse {
    pub fn issued(entity: EntityId, password_reset_token: String) -> Self {
        Self { entity: Some(entity), password_reset_token, valid: true, error: String::new() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            entity: None,
            password_reset_token: String::new(),
            valid: false,
            error: message.into(),
        }
    }
}

/// Envelope carrying a read-only projection of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetailsResponse {
    pub entity: Option<Entity>,
    pub valid: bool,
    pub error: String,
}

impl EntityDetailsResponse {
    pub fn found(entity: Entity) -> Self {
        Self { entity: Some(entity), valid: true, error: String::new() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { entity: None, valid: false, error: message.into() }
    }
}
