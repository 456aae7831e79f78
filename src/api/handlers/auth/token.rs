//! Signed session tokens (HS256 JWT).
//!
//! Tokens are stateless: they embed the user id, email and role, and stay valid
//! until `exp`. Refreshing requires a token that still validates and re-issues it
//! with a fresh expiry and the same identity.

use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::policy::Role;

pub const TOKEN_ISSUER: &str = "recruitment-backend";
pub const MIN_TOKEN_TTL_SECONDS: u64 = 60;
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    /// Kept as a raw string so a malformed role is detected after signature checks.
    #[serde(default)]
    pub role: String,
    pub sub: String,
    pub iss: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    InvalidOrExpired,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Token issued to a client together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build a signer/validator from the server secret. The lifetime is floored to one minute.
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: u64) -> Self {
        let secret = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "nbf", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds: ttl_seconds.max(MIN_TOKEN_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for the given identity.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the claims cannot be encoded.
    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, email, role.as_str(), get_current_timestamp())
    }

    pub(super) fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role: role.to_string(),
            sub: user_id.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            nbf: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify signature, issuer and time window.
    ///
    /// # Errors
    /// Any structural, signature or expiry failure is `TokenError::InvalidOrExpired`.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidOrExpired)
    }

    /// Re-issue a still valid token with a fresh expiry, keeping identity and role.
    ///
    /// # Errors
    /// Returns `TokenError::InvalidOrExpired` if the presented token does not validate.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        let claims = self.validate(token)?;
        self.issue_at(
            claims.user_id,
            &claims.email,
            &claims.role,
            get_current_timestamp(),
        )
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
