//! Identity boundary.
//!
//! # Responsibility
//! - Turn a presented credential into an explicit [`Caller`] once, at the
//!   edge, before any board operation runs.
//!
//! # Invariants
//! - Board operations only see identity through the `&Caller` argument; there
//!   is no process-wide "current user".
//! - An unresolvable credential yields `Caller::Anonymous`, never an error.

use crate::model::user::UserId;
use std::collections::HashMap;
use std::sync::RwLock;

/// Verified identity of whoever issued a board request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(UserId),
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Self::User(user_id)
    }

    /// Resolves `credential` through `provider`.
    pub fn from_credential(provider: &dyn IdentityProvider, credential: Option<&str>) -> Self {
        credential
            .and_then(|value| provider.resolve(value))
            .map_or(Self::Anonymous, Self::User)
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(user_id) => Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl From<Option<UserId>> for Caller {
    fn from(value: Option<UserId>) -> Self {
        value.map_or(Self::Anonymous, Self::User)
    }
}

/// External identity service contract.
pub trait IdentityProvider: Send + Sync {
    /// Maps a credential to a stable user id, or `None` when unauthenticated.
    fn resolve(&self, credential: &str) -> Option<UserId>;
}

/// In-memory bearer token table.
#[derive(Default)]
pub struct TokenIdentityProvider {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl TokenIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `token` to `user_id`, replacing any previous binding.
    pub fn issue(&self, token: impl Into<String>, user_id: UserId) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into(), user_id);
        }
    }

    /// Removes `token`; later resolutions yield anonymous callers.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens
            .write()
            .map(|mut tokens| tokens.remove(token).is_some())
            .unwrap_or(false)
    }
}

impl IdentityProvider for TokenIdentityProvider {
    fn resolve(&self, credential: &str) -> Option<UserId> {
        let tokens = self.tokens.read().ok()?;
        tokens.get(credential.trim()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{Caller, TokenIdentityProvider};
    use crate::model::user::UserId;

    #[test]
    fn issued_token_resolves_to_user_and_revocation_makes_anonymous() {
        let provider = TokenIdentityProvider::new();
        let alice = UserId::new("alice").expect("valid id");
        provider.issue("tok-1", alice.clone());

        let caller = Caller::from_credential(&provider, Some("tok-1"));
        assert_eq!(caller, Caller::User(alice));

        assert!(provider.revoke("tok-1"));
        let caller = Caller::from_credential(&provider, Some("tok-1"));
        assert_eq!(caller, Caller::Anonymous);
    }

    #[test]
    fn missing_credential_is_anonymous() {
        let provider = TokenIdentityProvider::new();
        let caller = Caller::from_credential(&provider, None);
        assert!(!caller.is_authenticated());
        assert_eq!(caller.user_id(), None);
    }
}
