//! Records held by the sharing graph and the public `Workspace` resource.

use serde::{Deserialize, Serialize};
use spacegate_core::CompliantIdentity;

/// Role the owner of a workspace implicitly holds.
pub const OWNER_ROLE: &str = "admin";

/// `status.type` of a workspace presented to its owner.
pub const HOME_TYPE: &str = "home";

/// Namespace type of the tenant namespace every workspace carries.
pub const DEFAULT_NAMESPACE_TYPE: &str = "default";

/// Object metadata passed through from the backing record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub resource_version: String,
    pub generation: i64,
    pub creation_timestamp: String,
    pub uid: String,
}

impl ObjectMeta {
    /// Every field populated. Records without complete metadata are never
    /// accepted into the store.
    pub fn is_complete(&self) -> bool {
        !self.resource_version.is_empty()
            && self.generation > 0
            && !self.creation_timestamp.is_empty()
            && !self.uid.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceNamespace {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl SpaceNamespace {
    pub fn tenant_of(workspace: &str) -> Self {
        Self {
            name: format!("{workspace}-tenant"),
            kind: DEFAULT_NAMESPACE_TYPE.to_string(),
        }
    }
}

fn provisioned_by_default() -> bool {
    true
}

/// Internal workspace record ("Space").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRecord {
    /// Equal to the owner's compliant identity.
    pub name: String,
    /// Signup name of the owner, shown in projections.
    pub owner: String,
    pub owner_identity: CompliantIdentity,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub target_cluster: String,
    #[serde(default)]
    pub namespaces: Vec<SpaceNamespace>,
    pub available_roles: Vec<String>,
    #[serde(default = "provisioned_by_default")]
    pub provisioned: bool,
    pub metadata: ObjectMeta,
}

impl SpaceRecord {
    pub fn has_role(&self, role: &str) -> bool {
        self.available_roles.iter().any(|r| r == role)
    }

    pub fn is_owned_by(&self, identity: &CompliantIdentity) -> bool {
        &self.owner_identity == identity
    }
}

/// A directed grant of `role` on `workspace` to `grantee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub workspace: String,
    pub grantee: CompliantIdentity,
    pub role: String,
}

/// A user known to identity onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    /// Derived from `username` when absent.
    #[serde(default)]
    pub compliant_identity: Option<CompliantIdentity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceMeta {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub generation: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub creation_timestamp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl WorkspaceMeta {
    pub fn from_record(name: &str, meta: &ObjectMeta) -> Self {
        Self {
            name: name.to_string(),
            resource_version: meta.resource_version.clone(),
            generation: meta.generation,
            creation_timestamp: meta.creation_timestamp.clone(),
            uid: meta.uid.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceStatus {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<SpaceNamespace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_roles: Vec<String>,
}

/// The public, read-only `Workspace` resource.
///
/// Also the body type accepted on writes, so decoding is lenient: every
/// field defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceView {
    pub api_version: String,
    pub kind: String,
    pub metadata: WorkspaceMeta,
    pub status: WorkspaceStatus,
}

impl WorkspaceView {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_home(&self) -> bool {
        self.status.kind == HOME_TYPE
    }
}
