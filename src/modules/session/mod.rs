//! # Session Module
//!
//! Resolves the caller behind a signed session token. A request without a
//! token is anonymous, which is not an error: the rule stage decides
//! whether the route accepts anonymous callers.
//!
//! Tokens carry a digest of the credential they were issued against, so
//! changing a password invalidates every earlier session without keeping a
//! revocation list.

mod config;
mod error;
mod identity;
mod resolver;
mod token;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use identity::{AccountStatus, Identity, IDENTITY_TAG};
pub use resolver::{SessionOutcome, SessionRejection, SessionResolver};
pub use token::{token_from, SessionClaims, TokenCodec, VerifiedToken};
