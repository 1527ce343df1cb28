use crate::model::{
    SpaceNamespace, SpaceRecord, WorkspaceMeta, WorkspaceStatus, WorkspaceView,
    DEFAULT_NAMESPACE_TYPE, HOME_TYPE,
};

/// Builds the public `Workspace` resource from a record. Pure.
#[derive(Debug, Clone)]
pub struct Projector {
    api_version: String,
    kind: String,
}

impl Projector {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    pub fn project(
        &self,
        record: &SpaceRecord,
        role: &str,
        present_as_home: bool,
        include_roles: bool,
    ) -> WorkspaceView {
        WorkspaceView {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            metadata: WorkspaceMeta::from_record(&record.name, &record.metadata),
            status: WorkspaceStatus {
                owner: record.owner.clone(),
                role: role.to_string(),
                kind: if present_as_home {
                    HOME_TYPE.to_string()
                } else {
                    String::new()
                },
                namespaces: namespaces_of(record),
                available_roles: if include_roles {
                    record.available_roles.clone()
                } else {
                    Vec::new()
                },
            },
        }
    }
}

/// The tenant namespace first, exactly once, then the record's other
/// namespaces in order.
fn namespaces_of(record: &SpaceRecord) -> Vec<SpaceNamespace> {
    let mut out = vec![SpaceNamespace::tenant_of(&record.name)];
    out.extend(
        record
            .namespaces
            .iter()
            .filter(|ns| ns.kind != DEFAULT_NAMESPACE_TYPE)
            .cloned(),
    );
    out
}
