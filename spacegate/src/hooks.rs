use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use spacegate_core::errors::GateError;
use spacegate_core::hooks::{GateAfterHook, GateBeforeHook, GateErrorHook, HookContext};
use spacegate_core::GateApp;

use crate::identity::IdentityResolver;
use crate::model::WorkspaceView;
use crate::services::GatewayParams;

type Ctx = HookContext<WorkspaceView, GatewayParams>;

/// Turns the raw username from the transport into a compliant identity.
/// Unknown users are rejected as unauthenticated.
pub struct ResolveCaller {
    resolver: Arc<dyn IdentityResolver>,
}

impl ResolveCaller {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl GateBeforeHook<WorkspaceView, GatewayParams> for ResolveCaller {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if ctx.caller.is_resolved() {
            return Ok(());
        }

        let resolved = self
            .resolver
            .resolve(&ctx.caller.username)
            .await
            .map_err(|e| GateError::from(e).into_anyhow())?;

        match resolved {
            Some(identity) => {
                tracing::debug!(username = %ctx.caller.username, identity = %identity, "caller resolved");
                ctx.caller.set_identity(identity);
                Ok(())
            }
            None => {
                tracing::info!(username = %ctx.caller.username, "no account for caller");
                Err(GateError::not_authenticated("Unauthorized").into_anyhow())
            }
        }
    }
}

/// Logs every decision with the identity, verb and resource it was about.
pub struct AuditDecision;

impl AuditDecision {
    fn identity(ctx: &Ctx) -> &str {
        ctx.caller
            .compliant
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("")
    }
}

#[async_trait]
impl GateAfterHook<WorkspaceView, GatewayParams> for AuditDecision {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        tracing::info!(
            identity = Self::identity(ctx),
            verb = ctx.method.verb(),
            resource = %ctx.service,
            workspace = ctx.name.as_deref().unwrap_or(""),
            request_id = ctx.params.request_id.as_deref().unwrap_or(""),
            decision = "allow",
            "workspace request decided"
        );
        Ok(())
    }
}

#[async_trait]
impl GateErrorHook<WorkspaceView, GatewayParams> for AuditDecision {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let Some(err) = ctx.error.as_ref() else {
            return Ok(());
        };
        let (code, reason) = GateError::from_anyhow(err)
            .map(|g| (g.code(), g.reason()))
            .unwrap_or((500, "InternalError"));

        tracing::info!(
            identity = Self::identity(ctx),
            verb = ctx.method.verb(),
            resource = %ctx.service,
            workspace = ctx.name.as_deref().unwrap_or(""),
            request_id = ctx.params.request_id.as_deref().unwrap_or(""),
            decision = "deny",
            code,
            reason,
            "workspace request decided"
        );
        Ok(())
    }
}

pub fn global_hooks(
    app: &GateApp<WorkspaceView, GatewayParams>,
    resolver: Arc<dyn IdentityResolver>,
) {
    let audit = Arc::new(AuditDecision);
    app.hooks(|h| {
        h.before_all(Arc::new(ResolveCaller::new(resolver)));
        h.after_all(audit.clone());
        h.error_all(audit);
    });
}
