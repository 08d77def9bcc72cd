//! crates/hospital_chat_core/src/tokens.rs
//!
//! Stateless issuance and verification of the signed access/refresh pair.
//!
//! The two token kinds are signed with distinct secrets so compromise of one
//! never yields the other, and each carries a `token_use` discriminator so a
//! refresh token can never pass an access check (or vice versa).

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::domain::ADMIN_SUBJECT_PREFIX;

const ISSUER: &str = "hospital-login-system";
const AUDIENCE: &str = "hospital-users";

/// Discriminates the two halves of a credential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The signed claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub hospital_name: String,
    pub product_batch: String,
    pub token_use: TokenKind,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Admin subjects are marked by a reserved subject-id prefix.
    pub fn is_admin(&self) -> bool {
        self.sub.starts_with(ADMIN_SUBJECT_PREFIX)
    }
}

/// A freshly issued access/refresh pair.
///
/// `expires_in` is the access-token lifetime in milliseconds, which is what
/// the login response reports to the client.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Why a presented token was not accepted.
///
/// `Expired` is split out so the gate can tell the client to attempt a
/// refresh before redirecting to login; every other failure is `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

/// Issues and verifies credential pairs. Pure computation; no storage.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Produces a new access/refresh pair for a subject.
    ///
    /// Claim values are deterministic for a given input; only the embedded
    /// timestamps vary between calls.
    pub fn issue(
        &self,
        subject_id: &str,
        hospital_name: &str,
        product_batch: &str,
    ) -> Result<TokenPair, TokenError> {
        self.issue_at(Utc::now().timestamp(), subject_id, hospital_name, product_batch)
    }

    fn issue_at(
        &self,
        now: i64,
        subject_id: &str,
        hospital_name: &str,
        product_batch: &str,
    ) -> Result<TokenPair, TokenError> {
        let claims = |kind: TokenKind, ttl: Duration| Claims {
            sub: subject_id.to_string(),
            hospital_name: hospital_name.to_string(),
            product_batch: product_batch.to_string(),
            token_use: kind,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp: now + ttl.num_seconds(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(
            &header,
            &claims(TokenKind::Access, self.access_ttl),
            &self.access_encoding,
        )
        .map_err(|_| TokenError::Invalid)?;
        let refresh_token = encode(
            &header,
            &claims(TokenKind::Refresh, self.refresh_ttl),
            &self.refresh_encoding,
        )
        .map_err(|_| TokenError::Invalid)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_milliseconds(),
        })
    }

    /// Verifies an access token: signature, issuer, audience, expiry, and the
    /// `access` discriminator. Never returns partial claims.
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.access_decoding, TokenKind::Access)
    }

    /// Verifies a refresh token, requiring the `refresh` discriminator.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.refresh_decoding, TokenKind::Refresh)
    }

    /// Verifies a refresh token and re-issues a brand-new pair with the same
    /// subject and claims (rotation; the old refresh token is not actively
    /// invalidated).
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.verify_refresh(refresh_token)?;
        self.issue(&claims.sub, &claims.hospital_name, &claims.product_batch)
    }
}

fn verify(token: &str, key: &DecodingKey, expected: TokenKind) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    // Zero leeway keeps expiry checks exact.
    validation.leeway = 0;

    let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if data.claims.token_use != expected {
        return Err(TokenError::Invalid);
    }
    Ok(data.claims)
}
