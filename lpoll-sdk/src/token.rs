//! Channel-scoped access tokens.
//!
//! A token is an HMAC-signed JWT whose claims name the channel it grants
//! access to:
//!
//! ```text
//! {"channel_id": "...", "iat": <unix>, "exp": <unix>}
//! ```
//!
//! Signing and verification go through `jsonwebtoken`, so tokens are
//! interchangeable with HS256/HS384/HS512 JWTs issued by other libraries.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default token lifetime (in seconds).
pub const DEFAULT_TOKEN_TTL: i64 = 3600;

/// Errors produced while issuing or validating a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token is not a well-formed JWT or its claims do not parse.
    #[error("malformed token")]
    Malformed,
    /// The signature is valid but `exp` is in the past.
    #[error("token has expired")]
    Expired,
    /// Wrong signature, wrong key or unexpected signing algorithm.
    #[error("unauthorized token")]
    Unauthorized,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::Unauthorized,
            _ => TokenError::Malformed,
        }
    }
}

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

/// HMAC signing algorithm, named as in the JWS `alg` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl TokenAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenAlgorithm::HS256 => "HS256",
            TokenAlgorithm::HS384 => "HS384",
            TokenAlgorithm::HS512 => "HS512",
        }
    }
}

impl From<TokenAlgorithm> for Algorithm {
    fn from(alg: TokenAlgorithm) -> Self {
        match alg {
            TokenAlgorithm::HS256 => Algorithm::HS256,
            TokenAlgorithm::HS384 => Algorithm::HS384,
            TokenAlgorithm::HS512 => Algorithm::HS512,
        }
    }
}

impl fmt::Display for TokenAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(TokenAlgorithm::HS256),
            "HS384" => Ok(TokenAlgorithm::HS384),
            "HS512" => Ok(TokenAlgorithm::HS512),
            other => Err(TokenError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub channel_id: String,
    pub iat: i64,
    pub exp: i64,
}

// ---------------------------------------------------------------------------
// TokenAuthority
// ---------------------------------------------------------------------------

/// Issues and validates channel access tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    ttl: i64,
}

impl TokenAuthority {
    /// Create a new authority.
    ///
    /// * `secret` – the HMAC key shared by every relay instance.
    /// * `ttl` – token lifetime in seconds.
    pub fn new(secret: &[u8], algorithm: TokenAlgorithm, ttl: i64) -> Self {
        let algorithm = Algorithm::from(algorithm);
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            header: Header::new(algorithm),
            validation,
            ttl,
        }
    }

    /// Issue a token granting access to `channel_id`.
    pub fn issue(&self, channel_id: &str) -> Result<String, TokenError> {
        self.issue_at(channel_id, now())
    }

    /// Validate a token and return the channel it grants access to.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        // `exp` itself is already past.
        if claims.exp <= now() {
            return Err(TokenError::Expired);
        }
        if claims.channel_id.is_empty() {
            return Err(TokenError::Unauthorized);
        }
        Ok(claims.channel_id)
    }

    fn issue_at(&self, channel_id: &str, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            channel_id: channel_id.to_owned(),
            iat: now,
            exp: now + self.ttl,
        };
        encode(&self.header, &claims, &self.encoding_key).map_err(TokenError::Signing)
    }
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
