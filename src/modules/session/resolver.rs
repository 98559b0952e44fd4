//! Turns a session token into a caller identity.

use super::identity::{Identity, IDENTITY_TAG};
use super::token::TokenCodec;
use crate::store::{Adapters, StoreResult};
use tracing::{debug, warn};

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    /// The token's validity ran out.
    Expired,
    /// The credential changed after the token was issued.
    CredentialChanged,
    /// Bad signature, issuer or structure.
    Invalid,
    /// The identity no longer exists.
    UnknownIdentity,
    /// The account is frozen.
    Frozen,
}

impl SessionRejection {
    /// Whether the caller should be told to sign in again rather than that
    /// the token is bad.
    #[must_use]
    pub fn is_expiry(&self) -> bool {
        matches!(self, Self::Expired | Self::CredentialChanged)
    }
}

impl std::fmt::Display for SessionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::CredentialChanged => write!(f, "credential changed"),
            Self::Invalid => write!(f, "invalid"),
            Self::UnknownIdentity => write!(f, "unknown identity"),
            Self::Frozen => write!(f, "frozen"),
        }
    }
}

/// Result of resolving a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No token was presented.
    Anonymous,
    /// The token is valid and the identity is in good standing.
    Authenticated(Identity),
    /// The token was presented and refused.
    Rejected(SessionRejection),
    /// The identity could not be looked up.
    Unavailable,
}

/// Verifies session tokens and loads the identity behind them.
#[derive(Debug)]
pub struct SessionResolver {
    adapters: Adapters,
    codec: TokenCodec,
}

impl SessionResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(adapters: Adapters, codec: TokenCodec) -> Self {
        Self { adapters, codec }
    }

    /// The codec tokens are verified with.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Resolve `token`.
    ///
    /// The identity is read cache-first. A store read populates the cache
    /// in the background for as long as the token stays valid.
    pub async fn resolve(&self, token: Option<&str>) -> SessionOutcome {
        let Some(token) = token else {
            return SessionOutcome::Anonymous;
        };

        let verified = match self.codec.verify(token) {
            Ok(verified) => verified,
            Err(e) if e.is_expiry() => {
                debug!(stage = "session", "Session token expired");
                return SessionOutcome::Rejected(SessionRejection::Expired);
            },
            Err(e) => {
                debug!(stage = "session", error = %e, "Session token refused");
                return SessionOutcome::Rejected(SessionRejection::Invalid);
            },
        };

        let key = Identity::cache_key(verified.uid);
        let identity = match self.adapters.cache_get::<Identity>(&key).await {
            Some(identity) => identity,
            None => {
                let store = self.adapters.store();
                match self
                    .adapters
                    .store_call("fetch_identity", store.fetch_identity(verified.uid))
                    .await
                {
                    Ok(Some(identity)) => {
                        if !verified.remaining.is_zero() {
                            self.adapters.cache_fill(
                                key,
                                &identity,
                                Some(verified.remaining),
                                &[IDENTITY_TAG],
                            );
                        }
                        identity
                    },
                    Ok(None) => {
                        debug!(stage = "session", uid = verified.uid, "Identity not found");
                        return SessionOutcome::Rejected(SessionRejection::UnknownIdentity);
                    },
                    Err(e) => {
                        warn!(stage = "session", uid = verified.uid, error = %e, "Identity lookup failed");
                        return SessionOutcome::Unavailable;
                    },
                }
            },
        };

        if identity.is_frozen() {
            debug!(stage = "session", uid = identity.id, "Account frozen");
            return SessionOutcome::Rejected(SessionRejection::Frozen);
        }

        if identity.credential_digest() != verified.digest {
            debug!(stage = "session", uid = identity.id, "Credential changed since issue");
            return SessionOutcome::Rejected(SessionRejection::CredentialChanged);
        }

        SessionOutcome::Authenticated(identity)
    }

    /// Drop the cached record of identity `id` after a profile or credential
    /// update.
    ///
    /// # Errors
    ///
    /// Returns the cache error or a timeout.
    pub async fn invalidate_identity(&self, id: u64) -> StoreResult<()> {
        self.adapters.cache_evict(&Identity::cache_key(id)).await
    }
}
