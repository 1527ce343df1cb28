use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::hooks::collect_method_hooks;
use crate::{
    CallerContext, GateAfterHook, GateBeforeHook, GateConfig, GateConfigSnapshot, GateError,
    GateErrorHook, GateService, GateServiceRegistry, HookContext, HookResult, ServiceHooks,
    ServiceMethodKind,
};

struct GateAppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    registry: RwLock<GateServiceRegistry<R, P>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<GateConfig>,
}

/// GateApp is the central application container.
///
/// Framework-agnostic. Holds:
/// - service registry
/// - app hooks
/// - per-service hooks
/// - config
///
/// Cloning is cheap; every clone shares the same state.
pub struct GateApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<GateAppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn GateBeforeHook<R, P>>>,
    Vec<Arc<dyn GateAfterHook<R, P>>>,
    Vec<Arc<dyn GateErrorHook<R, P>>>,
);

impl<R, P> Default for GateApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for GateApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> GateApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateAppInner {
                registry: RwLock::new(GateServiceRegistry::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(GateConfig::new()),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn GateService<R, P>>)
    where
        S: Into<String>,
    {
        self.inner.registry.write().register(name, service);
    }

    /// App-wide hooks, run before any service hooks.
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = self.inner.global_hooks.write();
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = self.inner.service_hooks.write();
        let hooks = map.entry(service_name.to_string()).or_default();
        f(hooks);
    }

    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = self
            .inner
            .registry
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GateError::not_found(format!("service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.config.write().set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.config.read().get(key).map(|v| v.to_string())
    }

    /// Apply `PREFIX__A__B=value` environment overrides.
    pub fn load_env(&self, prefix: &str) {
        self.inner.config.write().load_env(prefix, std::env::vars());
    }

    pub fn config_snapshot(&self) -> GateConfigSnapshot {
        self.inner.config.read().snapshot()
    }
}

pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: GateApp<R, P>,
    name: String,
    service: Arc<dyn GateService<R, P>>,
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &Arc<dyn GateService<R, P>> {
        &self.service
    }
}

// ──────────────────────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────────────────────

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    /// Global hooks first, then service hooks.
    fn collect_hooks_for_method(&self, method: ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = self.app.inner.global_hooks.read();
        let map = self.app.inner.service_hooks.read();

        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (before, after, error)
    }

    fn context(&self, caller: CallerContext, method: ServiceMethodKind, params: P) -> HookContext<R, P> {
        HookContext::new(
            caller,
            self.name.clone(),
            method,
            params,
            self.app.config_snapshot(),
        )
    }

    /// before → service call → after, then error hooks on failure.
    async fn run_pipeline(&self, mut ctx: HookContext<R, P>) -> Result<HookContext<R, P>> {
        if !self.service.capabilities().allows(ctx.method) {
            return Err(GateError::method_not_allowed(format!(
                "{} does not support {}",
                self.name,
                ctx.method.verb()
            ))
            .into_anyhow());
        }

        let (before, after, error) = self.collect_hooks_for_method(ctx.method);

        if let Err(e) = run_stages(&before, &after, &self.service, &mut ctx).await {
            ctx.error = Some(e);

            for h in &error {
                if let Err(replaced) = h.run(&mut ctx).await {
                    ctx.error = Some(replaced);
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    pub async fn find(&self, caller: CallerContext, params: P) -> Result<Vec<R>> {
        let ctx = self.context(caller, ServiceMethodKind::Find, params);
        let ctx = self.run_pipeline(ctx).await?;

        match ctx.result {
            Some(HookResult::Many(v)) => Ok(v),
            Some(HookResult::One(_)) => Err(anyhow::anyhow!(
                "find() produced HookResult::One unexpectedly"
            )),
            None => Ok(vec![]),
        }
    }

    pub async fn get(&self, caller: CallerContext, name: &str, params: P) -> Result<R> {
        let mut ctx = self.context(caller, ServiceMethodKind::Get, params);
        ctx.name = Some(name.to_string());
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx, "get")
    }

    /// `data` is `None` when the transport could not decode a body; the
    /// before hooks still run so policy decisions come first.
    pub async fn create(&self, caller: CallerContext, data: Option<R>, params: P) -> Result<R> {
        let mut ctx = self.context(caller, ServiceMethodKind::Create, params);
        ctx.data = data;
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx, "create")
    }

    pub async fn update(
        &self,
        caller: CallerContext,
        name: &str,
        data: Option<R>,
        params: P,
    ) -> Result<R> {
        let mut ctx = self.context(caller, ServiceMethodKind::Update, params);
        ctx.name = Some(name.to_string());
        ctx.data = data;
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx, "update")
    }

    pub async fn patch(
        &self,
        caller: CallerContext,
        name: &str,
        data: Option<R>,
        params: P,
    ) -> Result<R> {
        let mut ctx = self.context(caller, ServiceMethodKind::Patch, params);
        ctx.name = Some(name.to_string());
        ctx.data = data;
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx, "patch")
    }

    pub async fn remove(&self, caller: CallerContext, name: &str, params: P) -> Result<R> {
        let mut ctx = self.context(caller, ServiceMethodKind::Remove, params);
        ctx.name = Some(name.to_string());
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx, "remove")
    }
}

async fn run_stages<R, P>(
    before: &[Arc<dyn GateBeforeHook<R, P>>],
    after: &[Arc<dyn GateAfterHook<R, P>>],
    service: &Arc<dyn GateService<R, P>>,
    ctx: &mut HookContext<R, P>,
) -> Result<()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    for h in before {
        h.run(ctx).await?;
    }

    if ctx.result.is_none() {
        call_service(service, ctx).await?;
    }

    for h in after {
        h.run(ctx).await?;
    }

    Ok(())
}

async fn call_service<R, P>(
    service: &Arc<dyn GateService<R, P>>,
    ctx: &mut HookContext<R, P>,
) -> Result<()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    let result = match ctx.method {
        ServiceMethodKind::Find => {
            HookResult::Many(service.find(&ctx.caller, ctx.params.clone()).await?)
        }
        ServiceMethodKind::Get => {
            let name = required_name(ctx)?;
            HookResult::One(service.get(&ctx.caller, &name, ctx.params.clone()).await?)
        }
        ServiceMethodKind::Create => {
            let data = required_data(ctx)?;
            HookResult::One(service.create(&ctx.caller, data, ctx.params.clone()).await?)
        }
        ServiceMethodKind::Update => {
            let name = required_name(ctx)?;
            let data = required_data(ctx)?;
            HookResult::One(
                service
                    .update(&ctx.caller, &name, data, ctx.params.clone())
                    .await?,
            )
        }
        ServiceMethodKind::Patch => {
            let name = required_name(ctx)?;
            let data = required_data(ctx)?;
            HookResult::One(
                service
                    .patch(&ctx.caller, &name, data, ctx.params.clone())
                    .await?,
            )
        }
        ServiceMethodKind::Remove => {
            let name = required_name(ctx)?;
            HookResult::One(service.remove(&ctx.caller, &name, ctx.params.clone()).await?)
        }
    };

    ctx.result = Some(result);
    Ok(())
}

fn required_name<R, P>(ctx: &HookContext<R, P>) -> Result<String> {
    ctx.name.clone().ok_or_else(|| {
        GateError::bad_request(format!("{}() requires a resource name", ctx.method.verb()))
            .into_anyhow()
    })
}

fn required_data<R, P>(ctx: &mut HookContext<R, P>) -> Result<R> {
    let method = ctx.method;
    ctx.data.take().ok_or_else(|| {
        GateError::bad_request(format!("{}() requires a request body", method.verb()))
            .into_anyhow()
    })
}

fn expect_one<R, P>(ctx: HookContext<R, P>, method: &str) -> Result<R> {
    match ctx.result {
        Some(HookResult::One(v)) => Ok(v),
        Some(HookResult::Many(_)) => Err(anyhow::anyhow!(
            "{method}() produced HookResult::Many unexpectedly"
        )),
        None => Err(anyhow::anyhow!("{method}() produced no result")),
    }
}
