//! Manage json web tokens.
//!
//! Access and refresh tokens are signed with distinct HMAC secrets.
//! Decoding never fails: the outcome is reported through [`Decoded`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::error::{Result, ServerError, TokenKind};
use crate::user::{Role, User};

pub const TOKEN_TYPE: &str = "bearer";

/// Snapshot of the user's public profile carried by an access token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub role: Role,
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
}

impl AccessClaims {
    fn new(user: &User, iat: u64, exp: u64) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            role: user.role,
            photo: user.photo.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            iat,
            exp,
        }
    }
}

/// Refresh tokens carry no `exp`: deleting the session revokes them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub iat: u64,
}

/// Outcome of [`decode`].
///
/// `valid` and `expired` are never both true, and `payload` is only set when
/// `valid` is.
#[derive(Debug, PartialEq)]
pub struct Decoded<T> {
    pub valid: bool,
    pub expired: bool,
    pub payload: Option<T>,
}

impl<T> Decoded<T> {
    fn valid(payload: T) -> Self {
        Self {
            valid: true,
            expired: false,
            payload: Some(payload),
        }
    }

    fn expired() -> Self {
        Self {
            valid: false,
            expired: true,
            payload: None,
        }
    }

    fn invalid() -> Self {
        Self {
            valid: false,
            expired: false,
            payload: None,
        }
    }

    /// Map the three outcomes onto errors for a given token kind.
    pub fn into_result(self, kind: TokenKind) -> Result<T> {
        match self {
            Decoded {
                valid: true,
                payload: Some(payload),
                ..
            } => Ok(payload),
            Decoded { expired: true, .. } => {
                Err(ServerError::TokenExpired { kind })
            },
            _ => Err(ServerError::TokenInvalid { kind }),
        }
    }
}

/// Sign `claims` with an HMAC `secret`.
pub fn encode<T: Serialize>(
    claims: &T,
    secret: &[u8],
    algorithm: Algorithm,
) -> Result<String> {
    Ok(jsonwebtoken::encode(
        &Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(secret),
    )?)
}

/// Verify signature then expiry, with zero leeway.
///
/// `exp` is only checked when the payload has one, against the system wall
/// clock. An injected [`crate::clock::Clock`] sets `iat` and `exp` at issue
/// time but never moves the expiry check.
pub fn decode<T: DeserializeOwned>(
    token: &str,
    secret: &[u8],
    algorithm: Algorithm,
) -> Decoded<T> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.required_spec_claims.clear();

    match jsonwebtoken::decode::<T>(
        token,
        &DecodingKey::from_secret(secret),
        &validation,
    ) {
        Ok(data) => Decoded::valid(data.claims),
        Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => {
            Decoded::expired()
        },
        Err(err) => {
            tracing::debug!(error = %err, "rejected token");
            Decoded::invalid()
        },
    }
}

/// Issue and read both kinds of tokens.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: u64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a new [`TokenCodec`].
    ///
    /// `access_ttl` is in seconds.
    pub fn new(
        algorithm: Algorithm,
        access_secret: impl Into<Vec<u8>>,
        refresh_secret: impl Into<Vec<u8>>,
        access_ttl: u64,
    ) -> Result<Self> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ServerError::internal(
                "unsupported token algorithm",
                format!("{algorithm:?} is not an HMAC algorithm"),
            ));
        }

        let access_secret = access_secret.into();
        let refresh_secret = refresh_secret.into();
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(ServerError::internal(
                "missing token secret",
                "`ACCESS_TOKEN_SECRET` and `REFRESH_TOKEN_SECRET` must be set",
            ));
        }

        Ok(Self {
            algorithm,
            access_secret,
            refresh_secret,
            access_ttl,
        })
    }

    /// Create a [`TokenCodec`] from the `token` configuration section.
    pub fn from_config(config: &config::Token) -> Result<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|err| ServerError::internal("invalid token algorithm", err))?;

        Self::new(
            algorithm,
            config.access_secret.as_bytes(),
            config.refresh_secret.as_bytes(),
            config.access_ttl_minutes * 60,
        )
    }

    /// Access token lifetime in seconds.
    pub fn expires_in(&self) -> u64 {
        self.access_ttl
    }

    /// Sign a snapshot of `user`, valid from `now` for the access TTL.
    pub fn create_access(&self, user: &User, now: u64) -> Result<String> {
        let claims = AccessClaims::new(user, now, now + self.access_ttl);
        encode(&claims, &self.access_secret, self.algorithm)
    }

    /// Sign a refresh token bound to one session.
    pub fn create_refresh(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        now: u64,
    ) -> Result<String> {
        let claims = RefreshClaims {
            session_id,
            user_id,
            iat: now,
        };
        encode(&claims, &self.refresh_secret, self.algorithm)
    }

    pub fn decode_access(&self, token: &str) -> Decoded<AccessClaims> {
        decode(token, &self.access_secret, self.algorithm)
    }

    pub fn decode_refresh(&self, token: &str) -> Decoded<RefreshClaims> {
        decode(token, &self.refresh_secret, self.algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &[u8] = b"access-secret";
    const REFRESH: &[u8] = b"refresh-secret";

    fn now() -> u64 {
        Utc::now().timestamp() as u64
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(Algorithm::HS256, ACCESS, REFRESH, 3600).unwrap()
    }

    fn user() -> User {
        User::new("alice@example.com", "Alice", None)
    }

    /// Change the first character of the signature segment.
    fn tamper(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars = signature.chars();
        let first = chars.next().unwrap();
        let replacement = if first == 'A' { 'B' } else { 'A' };
        format!("{head}.{replacement}{}", chars.as_str())
    }

    #[test]
    fn test_round_trip_while_unexpired() {
        let user = user();
        let token = codec().create_access(&user, now()).unwrap();

        let decoded = codec().decode_access(&token);
        assert!(decoded.valid);
        assert!(!decoded.expired);
        let claims = decoded.payload.unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn test_expired_one_second_ago() {
        let claims = AccessClaims::new(&user(), now() - 3601, now() - 1);
        let token = encode(&claims, ACCESS, Algorithm::HS256).unwrap();

        let decoded = decode::<AccessClaims>(&token, ACCESS, Algorithm::HS256);
        assert_eq!(decoded, Decoded::expired());
        assert!(matches!(
            decoded.into_result(TokenKind::Access),
            Err(ServerError::TokenExpired {
                kind: TokenKind::Access
            })
        ));
    }

    #[test]
    fn test_tampered_signature_is_invalid() {
        let token = codec().create_access(&user(), now()).unwrap();
        let decoded = codec().decode_access(&tamper(&token));

        assert!(!decoded.valid);
        assert!(!decoded.expired);
        assert!(decoded.payload.is_none());
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = codec().create_access(&user(), now()).unwrap();
        let other =
            TokenCodec::new(Algorithm::HS256, "other", REFRESH, 3600).unwrap();

        assert_eq!(other.decode_access(&token), Decoded::invalid());
        // refresh secret must not open access tokens.
        assert!(!codec().decode_refresh(&token).valid);
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_eq!(codec().decode_access("not.a.token"), Decoded::invalid());
        assert_eq!(codec().decode_access(""), Decoded::invalid());
    }

    #[test]
    fn test_refresh_without_exp() {
        let (session, user) = (Uuid::new_v4(), Uuid::new_v4());
        let token = codec().create_refresh(session, user, 0).unwrap();

        let claims = codec()
            .decode_refresh(&token)
            .into_result(TokenKind::Refresh)
            .unwrap();
        assert_eq!(claims.session_id, session);
        assert_eq!(claims.user_id, user);
    }

    #[test]
    fn test_algorithm_mismatch_is_invalid() {
        let claims = AccessClaims::new(&user(), now(), now() + 60);
        let token = encode(&claims, ACCESS, Algorithm::HS384).unwrap();

        assert!(!decode::<AccessClaims>(&token, ACCESS, Algorithm::HS256).valid);
        assert!(decode::<AccessClaims>(&token, ACCESS, Algorithm::HS384).valid);
    }

    #[test]
    fn test_from_config() {
        let mut config = config::Token {
            access_secret: "a".into(),
            refresh_secret: "r".into(),
            algorithm: "HS512".into(),
            access_ttl_minutes: 60,
        };
        assert_eq!(TokenCodec::from_config(&config).unwrap().expires_in(), 3600);

        config.algorithm = "RS256".into();
        assert!(TokenCodec::from_config(&config).is_err());

        config.algorithm = "HS256".into();
        config.refresh_secret.clear();
        assert!(TokenCodec::from_config(&config).is_err());
    }
}
