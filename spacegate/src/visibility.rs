//! Which workspaces a caller may see, and with which role.
//!
//! Visibility is `owned ∪ directly granted`. Grants are never followed
//! transitively: a workspace shared with someone who shares their own
//! workspace with you stays invisible to you.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use spacegate_core::errors::GateError;
use spacegate_core::CompliantIdentity;

use crate::model::{Binding, SpaceRecord, OWNER_ROLE};
use crate::store::{SharingGraphStore, StoreError};

/// A workspace the caller may access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleWorkspace {
    pub record: SpaceRecord,
    pub role: String,
    /// The caller owns it.
    pub home: bool,
}

impl VisibleWorkspace {
    fn owned(record: SpaceRecord) -> Self {
        Self {
            record,
            role: OWNER_ROLE.to_string(),
            home: true,
        }
    }
}

#[derive(Clone)]
pub struct VisibilityIndex {
    store: Arc<dyn SharingGraphStore>,
    timeout: Duration,
}

impl VisibilityIndex {
    pub fn new(store: Arc<dyn SharingGraphStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Owned workspaces by name, then granted ones by name.
    pub async fn visible_workspaces(
        &self,
        caller: &CompliantIdentity,
    ) -> anyhow::Result<Vec<VisibleWorkspace>> {
        let mut owned = self
            .read("workspaces owned", self.store.workspaces_owned_by(caller))
            .await?;
        owned.sort_by(|a, b| a.name.cmp(&b.name));

        let mut grants = self
            .read("bindings granted", self.store.bindings_granted_to(caller))
            .await?;
        grants.sort_by(|a, b| a.workspace.cmp(&b.workspace));

        let owned_names: BTreeSet<String> = owned.iter().map(|r| r.name.clone()).collect();
        let mut out: Vec<VisibleWorkspace> =
            owned.into_iter().map(VisibleWorkspace::owned).collect();

        for binding in grants {
            if owned_names.contains(&binding.workspace) {
                continue;
            }
            let record = self
                .read(
                    "workspace",
                    self.store.get_provisioned_workspace(&binding.workspace),
                )
                .await?;
            if let Some(visible) = granted(caller, &binding, record) {
                out.push(visible);
            }
        }

        Ok(out)
    }

    /// The caller's view of `name`, or `None` when it is absent or not
    /// visible. The two cases are deliberately indistinguishable.
    pub async fn resolve(
        &self,
        caller: &CompliantIdentity,
        name: &str,
    ) -> anyhow::Result<Option<VisibleWorkspace>> {
        let Some(record) = self
            .read("workspace", self.store.get_provisioned_workspace(name))
            .await?
        else {
            return Ok(None);
        };

        if record.is_owned_by(caller) {
            return Ok(Some(VisibleWorkspace::owned(record)));
        }

        let bindings = self.read("bindings", self.store.bindings_for(name)).await?;
        let Some(binding) = bindings.into_iter().find(|b| &b.grantee == caller) else {
            return Ok(None);
        };

        Ok(granted(caller, &binding, Some(record)))
    }

    pub async fn can_access(&self, caller: &CompliantIdentity, name: &str) -> anyhow::Result<bool> {
        Ok(self.resolve(caller, name).await?.is_some())
    }

    async fn read<T, F>(&self, what: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, read = what, "sharing graph read failed");
                Err(GateError::from(err).into_anyhow())
            }
            Err(_) => {
                tracing::warn!(
                    read = what,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "sharing graph read timed out"
                );
                Err(GateError::gateway_timeout(format!(
                    "timed out reading {what} from the sharing graph"
                ))
                .into_anyhow())
            }
        }
    }
}

/// Validate a grant against its workspace. Bindings on absent workspaces or
/// with roles the workspace does not offer are skipped.
fn granted(
    caller: &CompliantIdentity,
    binding: &Binding,
    record: Option<SpaceRecord>,
) -> Option<VisibleWorkspace> {
    let Some(record) = record else {
        tracing::warn!(
            workspace = %binding.workspace,
            grantee = %caller,
            "ignoring binding on a missing workspace"
        );
        return None;
    };

    if record.is_owned_by(caller) {
        return Some(VisibleWorkspace::owned(record));
    }

    if !record.has_role(&binding.role) {
        tracing::warn!(
            workspace = %binding.workspace,
            grantee = %caller,
            role = %binding.role,
            "ignoring binding with a role the workspace does not offer"
        );
        return None;
    }

    Some(VisibleWorkspace {
        record,
        role: binding.role.clone(),
        home: false,
    })
}
