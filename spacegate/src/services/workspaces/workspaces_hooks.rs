use anyhow::Result;
use async_trait::async_trait;
use spacegate_axum::ResourceInfo;
use spacegate_core::hooks::{GateBeforeHook, HookContext};

use crate::model::WorkspaceView;
use crate::rbac;
use crate::services::GatewayParams;

/// Refuses every write before the service or the sharing graph is reached.
/// Runs whether or not the request carried a decodable body.
pub struct DenyMutations {
    resource: ResourceInfo,
}

impl DenyMutations {
    pub fn new(resource: ResourceInfo) -> Self {
        Self { resource }
    }
}

#[async_trait]
impl GateBeforeHook<WorkspaceView, GatewayParams> for DenyMutations {
    async fn run(&self, ctx: &mut HookContext<WorkspaceView, GatewayParams>) -> Result<()> {
        if !ctx.method.is_mutation() {
            return Ok(());
        }

        let identity = ctx.caller.identity()?;
        Err(rbac::forbidden(&self.resource, identity, ctx.method, ctx.name.as_deref()).into_anyhow())
    }
}
