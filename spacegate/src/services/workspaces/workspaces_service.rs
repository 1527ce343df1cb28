use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use async_trait::async_trait;
use spacegate_axum::ResourceInfo;
use spacegate_core::errors::GateError;
use spacegate_core::{
    CallerContext, CompliantIdentity, GateService, ServiceCapabilities, ServiceMethodKind,
};

use crate::forward::{ForwardError, Forwarder};
use crate::model::WorkspaceView;
use crate::projector::Projector;
use crate::rbac;
use crate::services::GatewayParams;
use crate::visibility::{VisibilityIndex, VisibleWorkspace};

use super::workspaces_shared;

/// Read-only `Workspace` API over the sharing graph.
pub struct WorkspacesService {
    pub index: VisibilityIndex,
    pub projector: Projector,
    pub resource: ResourceInfo,
    /// When set, every list and get is confirmed by the hosting clusters
    /// acting as the caller.
    pub forwarder: Option<Forwarder>,
    /// Populate `availableRoles` on list entries too.
    pub list_available_roles: bool,
}

impl WorkspacesService {
    pub fn new(index: VisibilityIndex, resource: ResourceInfo) -> Self {
        let projector = Projector::new(resource.api_version(), resource.kind.clone());
        Self {
            index,
            projector,
            resource,
            forwarder: None,
            list_available_roles: false,
        }
    }

    pub fn with_forwarder(mut self, forwarder: Forwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn with_list_available_roles(mut self, enabled: bool) -> Self {
        self.list_available_roles = enabled;
        self
    }

    /// Keep only the entries each hosting cluster also lists for the caller.
    async fn confirm_listed(
        &self,
        forwarder: &Forwarder,
        identity: &CompliantIdentity,
        visible: &mut Vec<VisibleWorkspace>,
    ) -> Result<()> {
        let clusters: BTreeSet<String> = visible
            .iter()
            .map(|v| v.record.target_cluster.clone())
            .collect();

        let mut listed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for cluster in clusters {
            let res = forwarder
                .list(identity, &cluster)
                .await
                .map_err(|e| GateError::from(e).into_anyhow())?;

            let names = if res.is_denied() {
                BTreeSet::new()
            } else if !res.is_success() {
                return Err(rejected(&cluster, res.status));
            } else {
                res.item_names().ok_or_else(|| {
                    GateError::from(ForwardError::Transport {
                        cluster: cluster.clone(),
                        message: "list answer has no items".into(),
                    })
                    .into_anyhow()
                })?
            };
            listed.insert(cluster, names);
        }

        visible.retain(|v| {
            let confirmed = listed
                .get(&v.record.target_cluster)
                .is_some_and(|names| names.contains(&v.record.name));
            if !confirmed {
                tracing::warn!(
                    identity = %identity,
                    workspace = %v.record.name,
                    cluster = %v.record.target_cluster,
                    "hosting cluster does not list a workspace the sharing graph allows"
                );
            }
            confirmed
        });
        Ok(())
    }

    fn deny(&self, caller: &CallerContext, method: ServiceMethodKind, name: Option<&str>) -> anyhow::Error {
        match caller.identity() {
            Ok(identity) => rbac::forbidden(&self.resource, identity, method, name).into_anyhow(),
            Err(err) => err,
        }
    }
}

fn rejected(cluster: &str, status: u16) -> anyhow::Error {
    GateError::from(ForwardError::Rejected {
        cluster: cluster.to_string(),
        status,
    })
    .into_anyhow()
}

#[async_trait]
impl GateService<WorkspaceView, GatewayParams> for WorkspacesService {
    fn capabilities(&self) -> ServiceCapabilities {
        workspaces_shared::capabilities()
    }

    async fn find(&self, caller: &CallerContext, _params: GatewayParams) -> Result<Vec<WorkspaceView>> {
        let identity = caller.identity()?;
        let mut visible = self.index.visible_workspaces(identity).await?;
        if let Some(forwarder) = &self.forwarder {
            self.confirm_listed(forwarder, identity, &mut visible).await?;
        }

        Ok(visible
            .iter()
            .map(|v| {
                self.projector
                    .project(&v.record, &v.role, v.home, self.list_available_roles)
            })
            .collect())
    }

    async fn get(&self, caller: &CallerContext, name: &str, _params: GatewayParams) -> Result<WorkspaceView> {
        let identity = caller.identity()?;
        let Some(visible) = self.index.resolve(identity, name).await? else {
            return Err(rbac::not_found(&self.resource, name).into_anyhow());
        };

        if let Some(forwarder) = &self.forwarder {
            let res = forwarder
                .forward(identity, ServiceMethodKind::Get, &visible.record, None)
                .await
                .map_err(|e| GateError::from(e).into_anyhow())?;

            if res.is_denied() {
                tracing::warn!(
                    identity = %identity,
                    workspace = name,
                    status = res.status,
                    "hosting cluster refused a workspace the sharing graph allows"
                );
                return Err(rbac::not_found(&self.resource, name).into_anyhow());
            }
            if !res.is_success() {
                return Err(rejected(&visible.record.target_cluster, res.status));
            }
        }

        Ok(self
            .projector
            .project(&visible.record, &visible.role, visible.home, true))
    }

    async fn create(&self, caller: &CallerContext, _data: WorkspaceView, _params: GatewayParams) -> Result<WorkspaceView> {
        Err(self.deny(caller, ServiceMethodKind::Create, None))
    }

    async fn update(
        &self,
        caller: &CallerContext,
        name: &str,
        _data: WorkspaceView,
        _params: GatewayParams,
    ) -> Result<WorkspaceView> {
        Err(self.deny(caller, ServiceMethodKind::Update, Some(name)))
    }

    async fn patch(
        &self,
        caller: &CallerContext,
        name: &str,
        _data: WorkspaceView,
        _params: GatewayParams,
    ) -> Result<WorkspaceView> {
        Err(self.deny(caller, ServiceMethodKind::Patch, Some(name)))
    }

    async fn remove(&self, caller: &CallerContext, name: &str, _params: GatewayParams) -> Result<WorkspaceView> {
        Err(self.deny(caller, ServiceMethodKind::Remove, Some(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::vehicles;
    use crate::forward::LocalCluster;
    use spacegate_core::ErrorKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn resource() -> ResourceInfo {
        ResourceInfo::new("toolchain.dev.openshift.com", "v1alpha1", "workspaces", "Workspace")
    }

    fn service() -> WorkspacesService {
        let index = VisibilityIndex::new(Arc::new(vehicles()), Duration::from_secs(1));
        WorkspacesService::new(index, resource())
    }

    fn as_user(identity: &str) -> CallerContext {
        CallerContext::resolved(identity, CompliantIdentity::new(identity))
    }

    fn kind_of(err: &anyhow::Error) -> ErrorKind {
        GateError::from_anyhow(err).unwrap().kind
    }

    #[tokio::test]
    async fn list_omits_available_roles_by_default() {
        let svc = service();
        let items = svc.find(&as_user("bus"), GatewayParams::default()).await.unwrap();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|w| w.status.available_roles.is_empty()));

        let svc = service().with_list_available_roles(true);
        let items = svc.find(&as_user("bus"), GatewayParams::default()).await.unwrap();
        assert!(items.iter().all(|w| w.status.available_roles.len() == 3));
    }

    #[tokio::test]
    async fn get_of_invisible_workspace_is_not_found() {
        let err = service()
            .get(&as_user("car"), "bus", GatewayParams::default())
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn writes_are_forbidden_even_for_the_owner() {
        let svc = service();
        let err = svc
            .remove(&as_user("car"), "car", GatewayParams::default())
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn unresolved_caller_is_unauthenticated() {
        let err = service()
            .find(&CallerContext::unresolved("car"), GatewayParams::default())
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), ErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn backing_denial_reads_as_not_found() {
        // the gateway's graph allows bus -> car, the hosting cluster's does not
        let gateway_store = Arc::new(vehicles());
        let member_store = Arc::new(vehicles());
        member_store.unshare("car", &CompliantIdentity::new("bus"));

        let member = LocalCluster::new(
            VisibilityIndex::new(member_store, Duration::from_secs(1)),
            resource(),
        );
        let svc = WorkspacesService::new(
            VisibilityIndex::new(gateway_store, Duration::from_secs(1)),
            resource(),
        )
        .with_forwarder(Forwarder::new(Arc::new(member), Duration::from_secs(1)));

        let err = svc
            .get(&as_user("bus"), "car", GatewayParams::default())
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), ErrorKind::NotFound);

        let ok = svc
            .get(&as_user("bus"), "bus", GatewayParams::default())
            .await
            .unwrap();
        assert!(ok.is_home());
    }

    #[tokio::test]
    async fn backing_list_drops_what_the_member_hides() {
        let gateway_store = Arc::new(vehicles());
        let member_store = Arc::new(vehicles());
        member_store.unshare("car", &CompliantIdentity::new("bus"));

        let member = LocalCluster::new(
            VisibilityIndex::new(member_store, Duration::from_secs(1)),
            resource(),
        );
        let svc = WorkspacesService::new(
            VisibilityIndex::new(gateway_store, Duration::from_secs(1)),
            resource(),
        )
        .with_forwarder(Forwarder::new(Arc::new(member), Duration::from_secs(1)));

        let items = svc.find(&as_user("bus"), GatewayParams::default()).await.unwrap();
        let names: Vec<&str> = items.iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["bus"]);
    }
}
