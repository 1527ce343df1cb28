use async_trait::async_trait;
use serde_json::Value;
use spacegate_axum::ResourceInfo;
use spacegate_core::errors::GateError;
use spacegate_core::ServiceMethodKind;

use super::{BackendResponse, ClusterTransport, ForwardError, ForwardRequest};
use crate::projector::Projector;
use crate::rbac;
use crate::visibility::VisibilityIndex;

/// An in-process member cluster whose RBAC follows the sharing graph:
/// reads are allowed iff the impersonated user can see the workspace, and
/// workspaces are never writable.
///
/// Used when no member cluster is configured, and in tests to check that
/// the gateway answers exactly as the backing layer would.
pub struct LocalCluster {
    index: VisibilityIndex,
    projector: Projector,
    resource: ResourceInfo,
}

impl LocalCluster {
    pub fn new(index: VisibilityIndex, resource: ResourceInfo) -> Self {
        let projector = Projector::new(resource.api_version(), resource.kind.clone());
        Self {
            index,
            projector,
            resource,
        }
    }

    fn status(err: GateError) -> BackendResponse {
        BackendResponse {
            status: err.code(),
            body: err.to_status_json(),
        }
    }

    fn unreachable(&self, req: &ForwardRequest, err: anyhow::Error) -> ForwardError {
        ForwardError::Transport {
            cluster: req.cluster.clone(),
            message: format!("{err:#}"),
        }
    }
}

#[async_trait]
impl ClusterTransport for LocalCluster {
    async fn dispatch(&self, req: &ForwardRequest) -> Result<BackendResponse, ForwardError> {
        if req.method.is_mutation() {
            return Ok(Self::status(rbac::forbidden(
                &self.resource,
                &req.identity,
                req.method,
                Some(req.workspace.as_str()),
            )));
        }

        match req.method {
            ServiceMethodKind::Find => {
                let visible = self
                    .index
                    .visible_workspaces(&req.identity)
                    .await
                    .map_err(|e| self.unreachable(req, e))?;
                let items: Vec<Value> = visible
                    .iter()
                    .map(|v| self.projector.project(&v.record, &v.role, v.home, false))
                    .filter_map(|view| serde_json::to_value(view).ok())
                    .collect();
                Ok(BackendResponse {
                    status: 200,
                    body: serde_json::json!({
                        "apiVersion": self.resource.api_version(),
                        "kind": self.resource.list_kind,
                        "metadata": {},
                        "items": items,
                    }),
                })
            }
            _ => {
                let visible = self
                    .index
                    .resolve(&req.identity, &req.workspace)
                    .await
                    .map_err(|e| self.unreachable(req, e))?;
                match visible {
                    Some(v) => {
                        let view = self.projector.project(&v.record, &v.role, v.home, true);
                        Ok(BackendResponse {
                            status: 200,
                            body: serde_json::to_value(view).unwrap_or(Value::Null),
                        })
                    }
                    None => Ok(Self::status(rbac::not_found(&self.resource, &req.workspace))),
                }
            }
        }
    }
}
