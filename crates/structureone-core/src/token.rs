//! Stateless signed bearer tokens.
//!
//! A token is two base64url (unpadded) segments joined by a dot:
//!
//! ```text
//! base64url(JSON(claims + exp)) "." base64url(HMAC-SHA256(encoded_payload + exp, secret))
//! ```
//!
//! The signature covers the *encoded* payload, so changing any claim changes
//! the signed input. There is no algorithm header to negotiate.

use crate::clock::{Clock, SystemClock};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Decoded token claims, in the order they were issued.
pub type Claims = Map<String, Value>;

/// Name of the mandatory expiry claim.
pub const EXP_CLAIM: &str = "exp";

/// Claim a scalar subject is wrapped under.
pub const UID_CLAIM: &str = "uid";

/// Reasons a token is rejected or cannot be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token is not exactly `payload.signature`.
    #[error("token is not in payload.signature form")]
    Malformed,
    /// The payload segment is not valid base64url.
    #[error("token payload is not valid base64url")]
    InvalidEncoding,
    /// The payload does not decode to a JSON object.
    #[error("token payload is not a JSON object")]
    InvalidPayload,
    /// The payload has no integer `exp` claim.
    #[error("token has no expiry")]
    MissingExpiry,
    /// The token is past its expiry.
    #[error("token expired")]
    Expired,
    /// The signature does not match the payload.
    #[error("token signature mismatch")]
    BadSignature,
    /// The claims could not be serialized.
    #[error("claims could not be serialized")]
    InvalidClaims,
    /// The signing key was rejected.
    #[error("invalid signing secret")]
    InvalidSecret,
}

/// Issues and verifies tokens with a shared secret.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use structureone_core::TokenService;
///
/// let tokens = TokenService::new("s3cret", 3600);
/// let token = tokens.generate(&json!({"uid": 7, "role": "admin"})).unwrap();
/// let claims = tokens.validate(&token).unwrap();
/// assert_eq!(claims["role"], "admin");
/// assert!(claims.contains_key("exp"));
/// ```
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<[u8]>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("clock", &self.clock)
            .finish()
    }
}

impl TokenService {
    /// Creates a token service using the system clock.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            ttl_secs,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default lifetime of issued tokens.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issues a token with the configured lifetime.
    ///
    /// An object is used as the claim map as-is; anything else is wrapped as
    /// `{"uid": value}`. An `exp` claim is always (re)written.
    pub fn generate<T: Serialize + ?Sized>(&self, claims: &T) -> Result<String, TokenError> {
        self.generate_with_ttl(claims, self.ttl_secs)
    }

    /// Issues a token that expires `ttl_secs` from now.
    pub fn generate_with_ttl<T: Serialize + ?Sized>(
        &self,
        claims: &T,
        ttl_secs: u64,
    ) -> Result<String, TokenError> {
        let mut claims = match serde_json::to_value(claims).map_err(|_| TokenError::InvalidClaims)? {
            Value::Object(map) => map,
            scalar => {
                let mut map = Map::new();
                map.insert(UID_CLAIM.into(), scalar);
                map
            }
        };

        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let exp = self.clock.now_secs().saturating_add(ttl);
        claims.insert(EXP_CLAIM.into(), Value::from(exp));

        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::InvalidClaims)?;
        let encoded_payload = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.sign(&encoded_payload, exp)?;

        Ok(format!(
            "{encoded_payload}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verifies a token and returns its claims, `exp` included.
    ///
    /// A token is accepted while `now < exp`.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(encoded_payload), Some(encoded_sig), None) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let payload = URL_SAFE_NO_PAD
            .decode(encoded_payload)
            .map_err(|_| TokenError::InvalidEncoding)?;
        let claims = match serde_json::from_slice::<Value>(&payload) {
            Ok(Value::Object(map)) => map,
            _ => return Err(TokenError::InvalidPayload),
        };

        let exp = claims
            .get(EXP_CLAIM)
            .ok_or(TokenError::MissingExpiry)?
            .as_i64()
            .ok_or(TokenError::MissingExpiry)?;
        if self.clock.now_secs() >= exp {
            return Err(TokenError::Expired);
        }

        let provided = URL_SAFE_NO_PAD
            .decode(encoded_sig)
            .map_err(|_| TokenError::BadSignature)?;
        let expected = self.sign(encoded_payload, exp)?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(TokenError::BadSignature);
        }

        Ok(claims)
    }

    fn sign(&self, encoded_payload: &str, exp: i64) -> Result<Vec<u8>, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidSecret)?;
        mac.update(encoded_payload.as_bytes());
        mac.update(exp.to_string().as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
