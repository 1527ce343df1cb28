//! The sharing graph: workspaces, their owners and explicit grants.
//!
//! The gateway only ever reads it through [`SharingGraphStore`]. Writes
//! belong to provisioning and sharing, modelled by the in-memory store's
//! writer API.

mod memory;

pub use memory::{InMemorySharingStore, StoreSeed};

use async_trait::async_trait;
use spacegate_core::errors::GateError;
use spacegate_core::CompliantIdentity;
use thiserror::Error;

use crate::model::{Binding, SpaceRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sharing graph unavailable: {0}")]
    Unavailable(String),

    #[error("sharing graph corrupt: {0}")]
    Corrupt(String),

    #[error("workspace {0} does not exist")]
    UnknownWorkspace(String),

    #[error("role {role} is not available on workspace {workspace}")]
    InvalidRole { workspace: String, role: String },

    #[error("workspace {0} has incomplete metadata")]
    IncompleteMetadata(String),

    #[error("username {0} has no compliant form")]
    InvalidUsername(String),
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Unavailable(_) => GateError::unavailable(message),
            StoreError::Corrupt(_) => GateError::general_error(message),
            StoreError::UnknownWorkspace(_) => GateError::not_found(message),
            StoreError::InvalidRole { .. }
            | StoreError::IncompleteMetadata(_)
            | StoreError::InvalidUsername(_) => GateError::unprocessable(message),
        }
    }
}

/// Read side of the sharing graph.
///
/// Every call reads committed state at call time; nothing is cached.
#[async_trait]
pub trait SharingGraphStore: Send + Sync {
    /// The record, if it exists and finished provisioning.
    async fn get_provisioned_workspace(&self, name: &str)
        -> Result<Option<SpaceRecord>, StoreError>;

    async fn bindings_for(&self, workspace: &str) -> Result<Vec<Binding>, StoreError>;

    async fn owner_of(&self, workspace: &str) -> Result<Option<CompliantIdentity>, StoreError>;

    /// Provisioned workspaces owned by `identity`, ordered by name.
    async fn workspaces_owned_by(
        &self,
        identity: &CompliantIdentity,
    ) -> Result<Vec<SpaceRecord>, StoreError>;

    /// Grants naming `identity`, ordered by workspace name. May include
    /// bindings that no longer validate.
    async fn bindings_granted_to(
        &self,
        identity: &CompliantIdentity,
    ) -> Result<Vec<Binding>, StoreError>;
}
