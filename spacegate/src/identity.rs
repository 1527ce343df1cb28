//! Turning the raw username asserted upstream into a compliant identity.

use async_trait::async_trait;
use spacegate_core::CompliantIdentity;

use crate::store::{InMemorySharingStore, StoreError};

/// The identity-onboarding collaborator.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` when no account is known for `username`.
    async fn resolve(&self, username: &str) -> Result<Option<CompliantIdentity>, StoreError>;
}

/// Lowercase `raw`, replace every character outside `[a-z0-9-]` with `-` and
/// trim dashes from both ends. `None` if nothing is left.
///
/// `road.bicycle` becomes `road-bicycle`.
pub fn compliant_username(raw: &str) -> Option<CompliantIdentity> {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed = mapped.trim_matches('-');
    if trimmed.is_empty() {
        None
    } else {
        Some(CompliantIdentity::new(trimmed))
    }
}

#[async_trait]
impl IdentityResolver for InMemorySharingStore {
    async fn resolve(&self, username: &str) -> Result<Option<CompliantIdentity>, StoreError> {
        Ok(self.account(username))
    }
}
