//! HS256 token issuing and validation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;

use courseware_core::UserId;

use crate::claims::{JwtClaims, TokenType, TokenValidationError, validate_claims};
use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },

    #[error("failed to encode token: {0}")]
    Encode(String),
}

/// Validates bearer tokens presented to the API.
pub trait JwtValidator: Send + Sync {
    /// Decode `token`, verify its signature and check it is an access token
    /// valid at `now`.
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Access + refresh token pair handed out by the token endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Symmetric-key JWT issuer/validator.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue_pair(
        &self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, role, TokenType::Access, now)?,
            refresh: self.issue(user_id, role, TokenType::Refresh, now)?,
        })
    }

    /// Exchange a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = self.decode(refresh_token, TokenType::Refresh, now)?;
        self.issue(claims.sub, claims.role, TokenType::Access, now)
    }

    fn issue(
        &self,
        user_id: UserId,
        role: Role,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = JwtClaims {
            sub: user_id,
            role,
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn decode(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, TokenError> {
        // The time window is checked against the caller's `now` below.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        validate_claims(&claims, now)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(claims)
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        self.decode(token, TokenType::Access, now)
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(secret: &str) -> Hs256Jwt {
        Hs256Jwt::new(secret.as_bytes(), Duration::minutes(5), Duration::days(1))
    }

    #[test]
    fn access_token_validates_to_its_subject_and_role() {
        let jwt = jwt("test-secret");
        let user_id = UserId::new();
        let now = Utc::now();
        let pair = jwt.issue_pair(user_id, Role::Instructor, now).unwrap();

        let claims = jwt.validate(&pair.access, now).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Instructor);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_token_is_not_accepted_as_bearer() {
        let jwt = jwt("test-secret");
        let now = Utc::now();
        let pair = jwt.issue_pair(UserId::new(), Role::Student, now).unwrap();

        assert_eq!(
            jwt.validate(&pair.refresh, now),
            Err(TokenError::WrongType { expected: TokenType::Access })
        );
    }

    #[test]
    fn refresh_issues_a_usable_access_token() {
        let jwt = jwt("test-secret");
        let user_id = UserId::new();
        let now = Utc::now();
        let pair = jwt.issue_pair(user_id, Role::Student, now).unwrap();

        let later = now + Duration::minutes(30);
        assert!(matches!(
            jwt.validate(&pair.access, later),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));

        let access = jwt.refresh(&pair.refresh, later).unwrap();
        assert_eq!(jwt.validate(&access, later).unwrap().sub, user_id);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let now = Utc::now();
        let pair = jwt("one").issue_pair(UserId::new(), Role::Admin, now).unwrap();
        assert!(matches!(
            jwt("two").validate(&pair.access, now),
            Err(TokenError::Invalid(_))
        ));
    }
}
