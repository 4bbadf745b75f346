//! JWT issuance and verification for session tokens.
//!
//! Signing is symmetric (shared-secret HMAC-SHA256). Signature/parse
//! verification and time-window validation are separate steps: `verify`
//! proves the token came from us, `Claims::check_validity` proves it is
//! currently usable. Callers that need both must call both.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AuthErrorType, Error, Result};

/// Registered claims carried by every token this engine signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    /// Unique ID correlating the JWT to its store record.
    pub jti: String,
}

impl Claims {
    /// Check that `now` falls inside the token's validity window.
    ///
    /// A token is invalid when `now < nbf` or `now > exp`.
    pub fn check_validity(&self, now: i64) -> Result<()> {
        if now < self.nbf || now > self.exp {
            return Err(Error::auth(
                "Token is outside its validity window",
                AuthErrorType::ExpiredToken,
            ));
        }
        Ok(())
    }
}

/// Signs and verifies session JWTs with a process-wide shared secret.
#[derive(Clone)]
pub struct JwtSigner {
    issuer: String,
    audience: Vec<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    pub fn new(issuer: impl Into<String>, audience: Vec<String>, secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Window and audience checks are performed explicitly by callers;
        // decode only proves signature and shape.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            issuer: issuer.into(),
            audience,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a signed token for `subject` with the given timestamps (epoch
    /// seconds) and unique `jti`.
    pub fn issue(
        &self,
        subject: &str,
        jti: &str,
        issued_at: i64,
        not_before: i64,
        expires_at: i64,
    ) -> Result<String> {
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: self.audience.clone(),
            exp: expires_at,
            nbf: not_before,
            iat: issued_at,
            jti: jti.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| Error::crypto(format!("Failed to sign token: {}", err)))
    }

    /// Verify a token's signature and structure, returning its claims.
    ///
    /// Does NOT check the validity window; see [`Claims::check_validity`].
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName => {
                    Error::auth("Token signature verification failed", AuthErrorType::InvalidSignature)
                }
                _ => Error::auth("Malformed token", AuthErrorType::MalformedToken),
            })
    }
}
