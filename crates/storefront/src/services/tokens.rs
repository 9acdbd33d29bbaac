//! Bearer token issuance and verification.
//!
//! Tokens are compact JWS strings (`header.payload.signature`, base64url
//! without padding) signed with HMAC-SHA256. The payload is
//! `{"user": <Principal>, "iat": <unix secs>, "exp": <unix secs>}`.
//! There is no revocation list; expiry is the only way a token stops working.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::auth::AuthError;
use crate::models::Principal;

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header for every token we issue.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user: Principal,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Signs and verifies bearer tokens with a server-side secret.
#[derive(Clone)]
pub struct TokenService {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Issue a token for `principal` with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the claims cannot be encoded.
    pub fn issue(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_with_ttl(principal, self.ttl)
    }

    /// Issue a token with an explicit lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the claims cannot be encoded.
    pub fn issue_with_ttl(&self, principal: &Principal, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user: principal.clone(),
            iat: now,
            exp: now + ttl.num_seconds(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token and return the principal it carries.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed, signed with
    /// another key or algorithm, or expired.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let (signing_input, signature) =
            token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or(AuthError::InvalidToken)?;
        if payload.contains('.') {
            return Err(AuthError::InvalidToken);
        }

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(AuthError::InvalidToken);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims = decode_segment(payload)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims.user)
    }

    fn mac(&self, input: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(input);
        Ok(mac)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, AuthError> {
        Ok(self.mac(input)?.finalize().into_bytes().to_vec())
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}
