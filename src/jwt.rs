use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

const DEFAULT_EXP_HOURS: i64 = 24;

/// Reasons a bearer token can be refused or fail to be produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("signature verification failed")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signing material and token lifetime. Built once at startup and shared
/// through `AppState`.
#[derive(Clone)]
pub struct JwtConfig {
    secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("exp_hours", &self.exp_hours)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }

        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_EXP_HOURS))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;
        if exp_hours <= 0 {
            return Err(AppError::configuration("JWT_EXP_HOURS must be positive"));
        }

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn lifetime(&self) -> Duration {
        Duration::hours(self.exp_hours)
    }

    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, email, Utc::now())
    }

    pub fn issue_at(&self, user_id: i64, email: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let exp = now + self.lifetime();

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Verifies the HS256 signature first, then requires `exp` to be strictly
    /// after `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
                _ => TokenError::Malformed(err.to_string()),
            })?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Identity of the caller, available to any handler behind the
/// authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser::from)
            .ok_or_else(|| AppError::unauthorized("unauthorized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    fn config() -> JwtConfig {
        JwtConfig::new(b"unit-test-secret".to_vec(), 24)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn issue_then_validate_round_trips() {
        let cfg = config();
        let token = cfg.issue_at(42, "ada@example.com", t0()).unwrap();
        let claims = cfg.validate_at(&token, t0() + Duration::minutes(5)).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.iat, t0().timestamp());
        assert_eq!(claims.exp, (t0() + Duration::hours(24)).timestamp());
    }

    #[test]
    fn secret_is_not_embedded() {
        let cfg = config();
        let token = cfg.issue_at(1, "a@b.c", t0()).unwrap();
        assert!(!token.contains("unit-test-secret"));
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let cfg = config();
        let token = cfg.issue_at(7, "x@y.z", t0()).unwrap();
        let exp = t0() + cfg.lifetime();

        assert!(cfg.validate_at(&token, exp - Duration::seconds(1)).is_ok());
        assert_eq!(cfg.validate_at(&token, exp), Err(TokenError::Expired));
        assert_eq!(cfg.validate_at(&token, exp + Duration::seconds(1)), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let token = config().issue_at(1, "a@b.c", t0()).unwrap();
        let other = JwtConfig::new(b"another-secret".to_vec(), 24);
        assert_eq!(other.validate_at(&token, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let cfg = config();
        assert!(matches!(cfg.validate_at("not-a-token", t0()), Err(TokenError::Malformed(_))));
        assert!(matches!(cfg.validate_at("", t0()), Err(TokenError::Malformed(_))));
        assert!(matches!(cfg.validate_at("a.b.c", t0()), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let cfg = config();
        let claims = Claims {
            sub: 1,
            email: "a@b.c".into(),
            iat: t0().timestamp(),
            exp: (t0() + Duration::hours(1)).timestamp(),
        };
        let hs512 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();

        assert_eq!(cfg.validate_at(&hs512, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn unsigned_tokens_are_rejected() {
        let cfg = config();
        let token = cfg.issue_at(1, "a@b.c", t0()).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        // {"alg":"none","typ":"JWT"}
        let forged = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");

        assert!(cfg.validate_at(&forged, t0()).is_err());
    }

    #[test]
    fn lifetime_is_configurable() {
        let cfg = JwtConfig::new(b"s".to_vec(), 1);
        let token = cfg.issue_at(3, "a@b.c", t0()).unwrap();
        assert!(cfg.validate_at(&token, t0() + Duration::minutes(59)).is_ok());
        assert_eq!(cfg.validate_at(&token, t0() + Duration::hours(2)), Err(TokenError::Expired));
    }

    proptest! {
        #[test]
        fn any_payload_or_signature_change_breaks_the_signature(
            segment in 1usize..3,
            pick in any::<prop::sample::Index>(),
            replacement in any::<prop::sample::Index>(),
        ) {
            let cfg = config();
            let token = cfg.issue_at(99, "prop@example.com", t0()).unwrap();
            let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();

            let target = parts[segment].clone().into_bytes();
            let idx = pick.index(target.len());
            let mut new_char = ALPHABET[replacement.index(ALPHABET.len())];
            if new_char == target[idx] {
                new_char = if new_char == b'A' { b'B' } else { b'A' };
            }
            let mut changed = target;
            changed[idx] = new_char;
            parts[segment] = String::from_utf8(changed).unwrap();

            let tampered = parts.join(".");
            prop_assert_eq!(cfg.validate_at(&tampered, t0()), Err(TokenError::BadSignature));
        }

        #[test]
        fn any_header_change_is_rejected(
            pick in any::<prop::sample::Index>(),
            replacement in any::<prop::sample::Index>(),
        ) {
            let cfg = config();
            let token = cfg.issue_at(99, "prop@example.com", t0()).unwrap();
            let (header, rest) = token.split_once('.').unwrap();

            let mut changed = header.as_bytes().to_vec();
            let idx = pick.index(changed.len());
            let mut new_char = ALPHABET[replacement.index(ALPHABET.len())];
            if new_char == changed[idx] {
                new_char = if new_char == b'A' { b'B' } else { b'A' };
            }
            changed[idx] = new_char;

            let tampered = format!("{}.{}", String::from_utf8(changed).unwrap(), rest);
            prop_assert!(cfg.validate_at(&tampered, t0()).is_err());
        }
    }
}
