//! Signed session tokens.

use super::config::SessionConfig;
use super::error::{SessionError, SessionResult};
use super::identity::Identity;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Identity id.
    pub uid: u64,
    /// Credential digest at issue time.
    pub hash: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expires at, unix seconds.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// Subject.
    pub sub: String,
}

/// What a verified token asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Identity id.
    pub uid: u64,
    /// Credential digest at issue time.
    pub digest: String,
    /// Validity left on the token.
    pub remaining: Duration,
}

/// Pick the session token from a request.
///
/// The `Authorization` header wins over the cookie; a `Bearer ` prefix is
/// stripped. Blank values count as absent.
#[must_use]
pub fn token_from<'a>(authorization: Option<&'a str>, cookie: Option<&'a str>) -> Option<&'a str> {
    let header = authorization
        .map(str::trim)
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
        .filter(|value| !value.is_empty());

    header.or_else(|| cookie.map(str::trim).filter(|value| !value.is_empty()))
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    subject: String,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the session configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            subject: config.subject.clone(),
            lifetime: config.expire(),
        }
    }

    /// Sign a token for `identity` with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encode` if signing fails.
    pub fn issue(&self, identity: &Identity) -> SessionResult<String> {
        let lifetime = chrono::Duration::from_std(self.lifetime)
            .map_err(|e| SessionError::Encode(e.to_string()))?;
        self.issue_with_lifetime(identity, lifetime)
    }

    /// Sign a token for `identity` valid for `lifetime` from now.
    ///
    /// A negative lifetime produces an already expired token.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encode` if signing fails.
    pub fn issue_with_lifetime(
        &self,
        identity: &Identity,
        lifetime: chrono::Duration,
    ) -> SessionResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            uid: identity.id,
            hash: identity.credential_digest(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Encode(e.to_string()))
    }

    /// Check signature, issuer and expiry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Expired` for an expired token and
    /// `SessionError::Invalid` for anything else wrong with it.
    pub fn verify(&self, token: &str) -> SessionResult<VerifiedToken> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)?;
        let claims = data.claims;

        let left = claims.exp.saturating_sub(Utc::now().timestamp()).max(0);
        Ok(VerifiedToken {
            uid: claims.uid,
            digest: claims.hash,
            remaining: Duration::from_secs(u64::try_from(left).unwrap_or(0)),
        })
    }
}
