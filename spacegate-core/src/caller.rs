//! Caller identity carried with every spacegate operation.

use std::fmt;

use crate::errors::GateError;

/// The normalized, impersonation-safe form of a user's name.
///
/// Unlike the raw username it never contains characters that are invalid in
/// an impersonation header (such as `.`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CompliantIdentity(pub String);

impl CompliantIdentity {
    pub fn new<S: Into<String>>(identity: S) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompliantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompliantIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Context passed explicitly into services and hooks.
///
/// Transports fill in the raw `username` from whatever the upstream
/// authentication layer asserted. The compliant `identity` stays empty until
/// a resolver hook sets it, and [`CallerContext::identity`] refuses to hand
/// out an unresolved caller.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub username: String,
    pub compliant: Option<CompliantIdentity>,
}

impl CallerContext {
    /// A caller whose compliant identity is not known yet.
    pub fn unresolved<S: Into<String>>(username: S) -> Self {
        Self {
            username: username.into(),
            compliant: None,
        }
    }

    /// A caller that was already resolved (internal calls, tests).
    pub fn resolved<S: Into<String>>(username: S, identity: CompliantIdentity) -> Self {
        Self {
            username: username.into(),
            compliant: Some(identity),
        }
    }

    pub fn set_identity(&mut self, identity: CompliantIdentity) {
        self.compliant = Some(identity);
    }

    pub fn is_resolved(&self) -> bool {
        self.compliant.is_some()
    }

    /// The compliant identity, or `NotAuthenticated` when it was never resolved.
    pub fn identity(&self) -> anyhow::Result<&CompliantIdentity> {
        self.compliant.as_ref().ok_or_else(|| {
            GateError::not_authenticated(format!(
                "user \"{}\" has no resolved identity",
                self.username
            ))
            .into_anyhow()
        })
    }
}
