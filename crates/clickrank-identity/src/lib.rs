//! Clickrank Identity - Credential verification
//!
//! This crate provides:
//! - The `IdentityVerifier` contract the runtime is written against
//! - A local provider that issues and verifies Ed25519-signed credentials

pub mod local;

pub use local::*;

use std::future::Future;

use clickrank_core::{ClickrankResult, NewUser, UserId};

/// Turns opaque credentials into stable user ids.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Resolve a credential. Fails with `InvalidCredential` or `Identity`.
    fn verify(&self, credential: &str) -> impl Future<Output = ClickrankResult<UserId>> + Send;

    /// Create an account and return its id
    fn create_user(&self, user: NewUser) -> impl Future<Output = ClickrankResult<UserId>> + Send;

    /// Credential a freshly created user can connect with, for providers
    /// that mint their own. External providers sign users in elsewhere.
    fn credential_for(&self, _user: &UserId) -> Option<String> {
        None
    }
}
