//! # nb-auth-simple
//!
//! Secret-based implementation of `AuthProvider`.
//! A caller presents an API secret; its salted SHA-256 digest is looked up in
//! the account store and the owner's grants are loaded once into an `AclTable`
//! that answers every permission check of the request.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use nb_core::error::{AppError, Result};
use nb_core::models::{Capability, ForumId, Principal, ANONYMOUS_USER_ID};
use nb_core::traits::{AccountRepo, AuthProvider, Authorizer, Grant, Session};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

pub const INVALID_SECRET: &str = "Your secret code is not valid";

/// Hex-encoded SHA-256 of `salt || secret`, the form secrets are stored in.
pub fn hash_secret(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Prefetched grants of one principal.
///
/// Grants on `ForumId::ROOT` apply to every forum. Questions about any other
/// principal are always denied.
#[derive(Debug, Clone)]
pub struct AclTable {
    owner: Principal,
    grants: HashSet<Grant>,
}

impl AclTable {
    pub fn new(owner: Principal, grants: impl IntoIterator<Item = Grant>) -> Self {
        Self {
            owner,
            grants: grants.into_iter().collect(),
        }
    }
}

impl Authorizer for AclTable {
    fn has_capability(&self, principal: &Principal, capability: Capability, forum: ForumId) -> bool {
        if *principal != self.owner {
            return false;
        }
        self.grants.contains(&Grant { forum_id: forum, capability })
            || self.grants.contains(&Grant {
                forum_id: ForumId::ROOT,
                capability,
            })
    }
}

pub struct SimpleAuthProvider {
    accounts: Arc<dyn AccountRepo>,
    salt: SecretString,
}

impl SimpleAuthProvider {
    pub fn new(accounts: Arc<dyn AccountRepo>, salt: SecretString) -> Self {
        Self { accounts, salt }
    }

    /// Digest under this provider's salt, for provisioning new secrets.
    pub fn hash(&self, secret: &str) -> String {
        hash_secret(self.salt.expose_secret(), secret)
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    #[instrument(skip_all, fields(with_secret = secret.is_some()))]
    async fn authenticate(&self, secret: Option<&str>) -> Result<Session> {
        let principal = match secret.filter(|s| !s.is_empty()) {
            None => Principal::Anonymous,
            Some(secret) => {
                let user = self
                    .accounts
                    .user_for_secret(&self.hash(secret))
                    .await?
                    .ok_or_else(|| AppError::unauthorized(INVALID_SECRET))?;
                if user == ANONYMOUS_USER_ID {
                    Principal::Anonymous
                } else {
                    Principal::User(user)
                }
            }
        };

        let grants = self.accounts.grants_for(principal.user_id()).await?;
        debug!(?principal, grants = grants.len(), "session resolved");

        Ok(Session {
            principal,
            acl: Arc::new(AclTable::new(principal, grants)),
        })
    }
}
