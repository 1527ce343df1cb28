use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use spacegate_core::CompliantIdentity;

use super::{SharingGraphStore, StoreError};
use crate::identity::compliant_username;
use crate::model::{Account, Binding, SpaceRecord};

/// Initial contents of an [`InMemorySharingStore`], as read from
/// `store.seedFile`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreSeed {
    pub workspaces: Vec<SpaceRecord>,
    pub bindings: Vec<Binding>,
    pub accounts: Vec<Account>,
}

#[derive(Debug, Default)]
struct Graph {
    workspaces: BTreeMap<String, SpaceRecord>,
    /// (workspace, grantee) -> role
    edges: BTreeMap<(String, CompliantIdentity), String>,
    /// grantee -> workspaces granted to it
    granted: BTreeMap<CompliantIdentity, BTreeSet<String>>,
    /// username -> compliant identity
    accounts: BTreeMap<String, CompliantIdentity>,
}

impl Graph {
    fn put_edge(&mut self, workspace: &str, grantee: &CompliantIdentity, role: &str) {
        self.edges
            .insert((workspace.to_string(), grantee.clone()), role.to_string());
        self.granted
            .entry(grantee.clone())
            .or_default()
            .insert(workspace.to_string());
    }

    fn drop_edge(&mut self, workspace: &str, grantee: &CompliantIdentity) -> bool {
        let removed = self
            .edges
            .remove(&(workspace.to_string(), grantee.clone()))
            .is_some();
        if let Some(set) = self.granted.get_mut(grantee) {
            set.remove(workspace);
            if set.is_empty() {
                self.granted.remove(grantee);
            }
        }
        removed
    }
}

/// Sharing graph held in memory.
///
/// Grants are an explicit edge set keyed by (workspace, grantee), with a
/// reverse index by grantee so visibility never scans the whole graph.
#[derive(Debug, Default)]
pub struct InMemorySharingStore {
    graph: RwLock<Graph>,
}

impl InMemorySharingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: StoreSeed) -> Result<Self, StoreError> {
        let store = Self::new();
        for record in seed.workspaces {
            store.provision(record)?;
        }
        for binding in seed.bindings {
            store.share(&binding.workspace, binding.grantee, &binding.role)?;
        }
        for account in seed.accounts {
            store.register_account(&account.username, account.compliant_identity)?;
        }
        Ok(store)
    }

    pub fn load_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading store seed {}", path.display()))?;
        let seed: StoreSeed = serde_json::from_str(&raw)
            .with_context(|| format!("parsing store seed {}", path.display()))?;
        let store = Self::from_seed(seed)?;
        tracing::info!(path = %path.display(), "sharing graph seeded");
        Ok(store)
    }

    /// Insert or replace a workspace record.
    pub fn provision(&self, record: SpaceRecord) -> Result<(), StoreError> {
        if !record.metadata.is_complete() {
            return Err(StoreError::IncompleteMetadata(record.name));
        }
        tracing::debug!(workspace = %record.name, owner = %record.owner_identity, "workspace provisioned");
        self.graph.write().workspaces.insert(record.name.clone(), record);
        Ok(())
    }

    /// Drop a workspace and every grant on it.
    pub fn deprovision(&self, workspace: &str) -> Result<(), StoreError> {
        let mut g = self.graph.write();
        if g.workspaces.remove(workspace).is_none() {
            return Err(StoreError::UnknownWorkspace(workspace.to_string()));
        }
        let grantees: Vec<CompliantIdentity> = g
            .edges
            .keys()
            .filter(|(ws, _)| ws == workspace)
            .map(|(_, grantee)| grantee.clone())
            .collect();
        for grantee in grantees {
            g.drop_edge(workspace, &grantee);
        }
        Ok(())
    }

    /// Grant `role` on `workspace`. Granting again replaces the role.
    pub fn share(
        &self,
        workspace: &str,
        grantee: CompliantIdentity,
        role: &str,
    ) -> Result<(), StoreError> {
        let mut g = self.graph.write();
        let record = g
            .workspaces
            .get(workspace)
            .ok_or_else(|| StoreError::UnknownWorkspace(workspace.to_string()))?;
        if !record.has_role(role) {
            return Err(StoreError::InvalidRole {
                workspace: workspace.to_string(),
                role: role.to_string(),
            });
        }
        tracing::debug!(workspace, grantee = %grantee, role, "workspace shared");
        g.put_edge(workspace, &grantee, role);
        Ok(())
    }

    /// Returns whether a grant was removed.
    pub fn unshare(&self, workspace: &str, grantee: &CompliantIdentity) -> bool {
        self.graph.write().drop_edge(workspace, grantee)
    }

    /// Write a grant without any validation, as out-of-band writers can.
    pub fn insert_binding_unchecked(&self, binding: Binding) {
        self.graph
            .write()
            .put_edge(&binding.workspace, &binding.grantee, &binding.role);
    }

    /// Record an account; the identity defaults to the compliant form of the
    /// username.
    pub fn register_account(
        &self,
        username: &str,
        identity: Option<CompliantIdentity>,
    ) -> Result<CompliantIdentity, StoreError> {
        let identity = match identity {
            Some(identity) => identity,
            None => compliant_username(username)
                .ok_or_else(|| StoreError::InvalidUsername(username.to_string()))?,
        };
        self.graph
            .write()
            .accounts
            .insert(username.to_string(), identity.clone());
        Ok(identity)
    }

    pub fn account(&self, username: &str) -> Option<CompliantIdentity> {
        self.graph.read().accounts.get(username).cloned()
    }
}

#[async_trait]
impl SharingGraphStore for InMemorySharingStore {
    async fn get_provisioned_workspace(
        &self,
        name: &str,
    ) -> Result<Option<SpaceRecord>, StoreError> {
        Ok(self
            .graph
            .read()
            .workspaces
            .get(name)
            .filter(|r| r.provisioned)
            .cloned())
    }

    async fn bindings_for(&self, workspace: &str) -> Result<Vec<Binding>, StoreError> {
        let g = self.graph.read();
        Ok(g.edges
            .iter()
            .filter(|((ws, _), _)| ws == workspace)
            .map(|((ws, grantee), role)| Binding {
                workspace: ws.clone(),
                grantee: grantee.clone(),
                role: role.clone(),
            })
            .collect())
    }

    async fn owner_of(&self, workspace: &str) -> Result<Option<CompliantIdentity>, StoreError> {
        Ok(self
            .graph
            .read()
            .workspaces
            .get(workspace)
            .filter(|r| r.provisioned)
            .map(|r| r.owner_identity.clone()))
    }

    async fn workspaces_owned_by(
        &self,
        identity: &CompliantIdentity,
    ) -> Result<Vec<SpaceRecord>, StoreError> {
        Ok(self
            .graph
            .read()
            .workspaces
            .values()
            .filter(|r| r.provisioned && r.is_owned_by(identity))
            .cloned()
            .collect())
    }

    async fn bindings_granted_to(
        &self,
        identity: &CompliantIdentity,
    ) -> Result<Vec<Binding>, StoreError> {
        let g = self.graph.read();
        let Some(workspaces) = g.granted.get(identity) else {
            return Ok(vec![]);
        };

        let mut out = Vec::with_capacity(workspaces.len());
        for ws in workspaces {
            let role = g
                .edges
                .get(&(ws.clone(), identity.clone()))
                .ok_or_else(|| StoreError::Corrupt(format!("grant index out of sync for {ws}")))?;
            out.push(Binding {
                workspace: ws.clone(),
                grantee: identity.clone(),
                role: role.clone(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::record;

    fn id(s: &str) -> CompliantIdentity {
        CompliantIdentity::new(s)
    }

    #[tokio::test]
    async fn regrant_replaces_the_role() {
        let store = InMemorySharingStore::new();
        store.provision(record("car")).unwrap();
        store.share("car", id("bus"), "contributor").unwrap();
        store.share("car", id("bus"), "maintainer").unwrap();

        let granted = store.bindings_granted_to(&id("bus")).await.unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].role, "maintainer");
        assert_eq!(store.bindings_for("car").await.unwrap().len(), 1);
    }

    #[test]
    fn share_validates_role_and_workspace() {
        let store = InMemorySharingStore::new();
        store.provision(record("car")).unwrap();

        assert!(matches!(
            store.share("car", id("bus"), "viewer"),
            Err(StoreError::InvalidRole { .. })
        ));
        assert!(matches!(
            store.share("truck", id("bus"), "admin"),
            Err(StoreError::UnknownWorkspace(_))
        ));
    }

    #[test]
    fn incomplete_metadata_is_rejected() {
        let store = InMemorySharingStore::new();
        let mut rec = record("car");
        rec.metadata.uid.clear();
        assert!(matches!(
            store.provision(rec),
            Err(StoreError::IncompleteMetadata(_))
        ));
    }

    #[tokio::test]
    async fn deprovision_drops_grants_on_the_workspace() {
        let store = InMemorySharingStore::new();
        store.provision(record("car")).unwrap();
        store.provision(record("bus")).unwrap();
        store.share("car", id("bicycle"), "contributor").unwrap();
        store.share("bus", id("bicycle"), "contributor").unwrap();

        store.deprovision("car").unwrap();

        let granted = store.bindings_granted_to(&id("bicycle")).await.unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].workspace, "bus");
        assert!(store.owner_of("car").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unprovisioned_records_read_as_absent() {
        let store = InMemorySharingStore::new();
        let mut rec = record("car");
        rec.provisioned = false;
        store.provision(rec).unwrap();

        assert!(store.get_provisioned_workspace("car").await.unwrap().is_none());
        assert!(store.workspaces_owned_by(&id("car")).await.unwrap().is_empty());
        assert!(store.owner_of("car").await.unwrap().is_none());
    }

    #[test]
    fn accounts_default_to_the_compliant_username() {
        let store = InMemorySharingStore::new();
        let identity = store.register_account("road.bicycle", None).unwrap();
        assert_eq!(identity.as_str(), "road-bicycle");
        assert_eq!(store.account("road.bicycle"), Some(identity));
    }

    #[test]
    fn seed_is_validated_like_live_writes() {
        let seed: StoreSeed = serde_json::from_value(serde_json::json!({
            "workspaces": [serde_json::to_value(record("car")).unwrap()],
            "bindings": [{"workspace": "car", "grantee": "bus", "role": "owner"}]
        }))
        .unwrap();

        assert!(matches!(
            InMemorySharingStore::from_seed(seed),
            Err(StoreError::InvalidRole { .. })
        ));
    }
}
