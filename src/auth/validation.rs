//! Request structs for the session lifecycle operations.
//!
//! Shape validation belongs to the request-handling layer; the derives here
//! are the backstop the facade runs before touching the store.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::models::ClientMetadata;
use crate::domain::EntityId;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPasswordRequest {
    #[validate(email(message = "Primary email must be a valid email address"))]
    pub primary_email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 256, message = "Public identifier cannot be empty"))]
    pub public_identifier: String,
    pub primary_phone: Option<String>,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginPasswordRequest {
    /// The email the password credential was registered under.
    #[validate(length(min = 1, max = 320, message = "Identifier cannot be empty"))]
    pub identifier: String,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRefreshTokenRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, message = "Refresh token cannot be empty"))]
    pub refresh_token: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, message = "Refresh token cannot be empty"))]
    pub refresh_token: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutTokenRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, message = "Token cannot be empty"))]
    pub token: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRefreshTokenRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, message = "Refresh token cannot be empty"))]
    pub refresh_token: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutAllRequest {
    pub entity: EntityId,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetVerificationCodeRequest {
    pub entity: EntityId,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEntityRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, message = "Verification code cannot be empty"))]
    pub code: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Primary email must be a valid email address"))]
    pub primary_email: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(email(message = "Primary email must be a valid email address"))]
    pub primary_email: String,
    #[validate(length(min = 1, message = "Password reset token cannot be empty"))]
    pub password_reset_token: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntityRequest {
    pub entity: EntityId,
    #[validate(length(min = 1, max = 1024, message = "Reason must be 1-1024 characters"))]
    pub reason: String,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetEntityDetailsRequest {
    pub entity: EntityId,
}
