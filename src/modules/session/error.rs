//! Error types for session tokens.

use std::fmt;

/// Result type for session token operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised while issuing or verifying a session token.
#[derive(Debug)]
pub enum SessionError {
    /// The token's `exp` is in the past.
    Expired,

    /// Signature, structure, issuer or claims are wrong.
    Invalid(String),

    /// The token could not be signed.
    Encode(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "session token expired"),
            Self::Invalid(msg) => write!(f, "invalid session token: {msg}"),
            Self::Encode(msg) => write!(f, "session token could not be signed: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

impl SessionError {
    /// Check if the error means the token merely ran out of time.
    #[must_use]
    pub fn is_expiry(&self) -> bool {
        matches!(self, Self::Expired)
    }
}
