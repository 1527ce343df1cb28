use std::sync::Arc;

use spacegate_axum::ResourceInfo;
use spacegate_core::{GateApp, ServiceCapabilities};

use crate::model::WorkspaceView;
use crate::services::GatewayParams;

use super::workspaces_hooks::DenyMutations;

/// Every verb is routed so writes get a proper Forbidden instead of
/// MethodNotAllowed.
pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud()
}

pub fn register_hooks(
    app: &GateApp<WorkspaceView, GatewayParams>,
    resource: &ResourceInfo,
) -> anyhow::Result<()> {
    let deny = Arc::new(DenyMutations::new(resource.clone()));
    app.service("workspaces")?.hooks(|h| {
        h.before_all(deny);
    });
    Ok(())
}
