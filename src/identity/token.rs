//! Signed, time-bound session tokens.
//!
//! Tokens are stateless HS256 JWTs carrying the identity and role claims the
//! guard needs; nothing is persisted server-side, so expiry is the only
//! invalidation mechanism besides the client dropping its cookie.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::store::{Role, UserRecord};

/// The identity payload embedded in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user record id.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_hours: i64,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        Self { secret: secret.into(), ttl_hours }
    }

    /// Serialize the user's identity and role into a signed, expiring token.
    pub fn issue(&self, user: &UserRecord) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(self.ttl_hours)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::store("token_error", e.to_string()))?;
        debug!(user = %user.email, "token.issue");
        Ok(token)
    }

    /// Validate signature and expiry. Every failure mode (expired, malformed,
    /// tampered) collapses to `None`; callers treat verification as a
    /// fallible lookup, never a panic.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord::new("alice@x.com", "Alice", Role::Manager, "phc".into())
    }

    #[test]
    fn issue_then_verify_returns_identity_claims() {
        let svc = TokenService::new("unit-secret", 24);
        let u = user();
        let token = svc.issue(&u).unwrap();
        let claims = svc.verify(&token).expect("fresh token must verify");
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn expired_token_is_invalid() {
        let svc = TokenService::new("unit-secret", -1);
        let token = svc.issue(&user()).unwrap();
        assert!(svc.verify(&token).is_none());
    }

    #[test]
    fn tampered_or_malformed_tokens_are_invalid() {
        let svc = TokenService::new("unit-secret", 24);
        let other = TokenService::new("different-secret", 24);
        let token = svc.issue(&user()).unwrap();
        assert!(other.verify(&token).is_none());
        assert!(svc.verify("not.a.jwt").is_none());
        assert!(svc.verify("").is_none());
    }
}
