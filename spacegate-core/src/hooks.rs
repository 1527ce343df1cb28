use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::caller::CallerContext;
use crate::config::GateConfigSnapshot;
use crate::service::ServiceMethodKind;

/// What a service call produced.
#[derive(Debug, Clone)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

/// Context passed to hooks.
///
/// R = record type
/// P = params type (transport details, query options, etc.)
pub struct HookContext<R, P> {
    pub caller: CallerContext,
    pub service: String,
    pub method: ServiceMethodKind,
    /// Target resource name for get/update/patch/remove.
    pub name: Option<String>,
    pub params: P,
    /// Request body for create/update/patch.
    pub data: Option<R>,
    /// Output. A before hook that sets it skips the service call.
    pub result: Option<HookResult<R>>,
    pub error: Option<anyhow::Error>,
    pub config: GateConfigSnapshot,
}

impl<R, P> HookContext<R, P> {
    pub fn new(
        caller: CallerContext,
        service: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        config: GateConfigSnapshot,
    ) -> Self {
        Self {
            caller,
            service: service.into(),
            method,
            name: None,
            params,
            data: None,
            result: None,
            error: None,
            config,
        }
    }
}

#[async_trait]
pub trait GateBeforeHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait GateAfterHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

/// Runs with `ctx.error` set. Clearing it recovers the call; returning an
/// error replaces it.
#[async_trait]
pub trait GateErrorHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

type Before<R, P> = Arc<dyn GateBeforeHook<R, P>>;
type After<R, P> = Arc<dyn GateAfterHook<R, P>>;
type OnError<R, P> = Arc<dyn GateErrorHook<R, P>>;

/// Hooks registered for every method (`*_all`) or for one method.
pub struct ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + 'static,
{
    pub before_all: Vec<Before<R, P>>,
    pub before_by_method: HashMap<ServiceMethodKind, Vec<Before<R, P>>>,
    pub after_all: Vec<After<R, P>>,
    pub after_by_method: HashMap<ServiceMethodKind, Vec<After<R, P>>>,
    pub error_all: Vec<OnError<R, P>>,
    pub error_by_method: HashMap<ServiceMethodKind, Vec<OnError<R, P>>>,
}

impl<R, P> Default for ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            before_all: Vec::new(),
            before_by_method: HashMap::new(),
            after_all: Vec::new(),
            after_by_method: HashMap::new(),
            error_all: Vec::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn before_all(&mut self, hook: Before<R, P>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethodKind, hook: Before<R, P>) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn after_all(&mut self, hook: After<R, P>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: After<R, P>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error_all(&mut self, hook: OnError<R, P>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: OnError<R, P>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }
}

/// `*_all` hooks first, then the method-specific ones.
pub(crate) fn collect_method_hooks<H: ?Sized>(
    all: &[Arc<H>],
    by_method: &HashMap<ServiceMethodKind, Vec<Arc<H>>>,
    method: ServiceMethodKind,
) -> Vec<Arc<H>> {
    let mut out: Vec<Arc<H>> = all.to_vec();
    if let Some(hooks) = by_method.get(&method) {
        out.extend(hooks.iter().cloned());
    }
    out
}
