use anyhow::Result;
use async_trait::async_trait;

use crate::caller::CallerContext;
use crate::errors::GateError;

/// Standard service methods.
///
/// `Find` and `Remove` are the service-level names for the `list` and
/// `delete` verbs an API server speaks; see [`ServiceMethodKind::verb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceMethodKind {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
}

impl ServiceMethodKind {
    /// The API verb as an RBAC engine names it.
    pub fn verb(&self) -> &'static str {
        match self {
            ServiceMethodKind::Find => "list",
            ServiceMethodKind::Get => "get",
            ServiceMethodKind::Create => "create",
            ServiceMethodKind::Update => "update",
            ServiceMethodKind::Patch => "patch",
            ServiceMethodKind::Remove => "delete",
        }
    }

    /// Whether the method writes to the resource.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ServiceMethodKind::Create
                | ServiceMethodKind::Update
                | ServiceMethodKind::Patch
                | ServiceMethodKind::Remove
        )
    }
}

/// Capabilities describe which methods a service exposes to the outside
/// world. Adapters mount a route for every method, but methods outside this
/// set are rejected before the pipeline runs.
#[derive(Debug, Clone)]
pub struct ServiceCapabilities {
    pub allowed_methods: Vec<ServiceMethodKind>,
}

impl ServiceCapabilities {
    /// Every method, reads and writes.
    pub fn standard_crud() -> Self {
        use ServiceMethodKind::*;
        Self {
            allowed_methods: vec![Find, Get, Create, Update, Patch, Remove],
        }
    }

    pub fn allows(&self, method: ServiceMethodKind) -> bool {
        self.allowed_methods.contains(&method)
    }
}

/// Core spacegate service trait:
///
/// - `find`   → list many
/// - `get`    → fetch one by name
/// - `create` → create one
/// - `update` → full replace
/// - `patch`  → partial update
/// - `remove` → delete one
///
/// Every method defaults to a `MethodNotAllowed` error so a service only
/// overrides what it supports.
#[async_trait]
pub trait GateService<R, P = ()>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, _caller: &CallerContext, _params: P) -> Result<Vec<R>> {
        Err(not_allowed(ServiceMethodKind::Find))
    }

    async fn get(&self, _caller: &CallerContext, _name: &str, _params: P) -> Result<R> {
        Err(not_allowed(ServiceMethodKind::Get))
    }

    async fn create(&self, _caller: &CallerContext, _data: R, _params: P) -> Result<R> {
        Err(not_allowed(ServiceMethodKind::Create))
    }

    async fn update(
        &self,
        _caller: &CallerContext,
        _name: &str,
        _data: R,
        _params: P,
    ) -> Result<R> {
        Err(not_allowed(ServiceMethodKind::Update))
    }

    async fn patch(
        &self,
        _caller: &CallerContext,
        _name: &str,
        _data: R,
        _params: P,
    ) -> Result<R> {
        Err(not_allowed(ServiceMethodKind::Patch))
    }

    async fn remove(&self, _caller: &CallerContext, _name: &str, _params: P) -> Result<R> {
        Err(not_allowed(ServiceMethodKind::Remove))
    }
}

fn not_allowed(method: ServiceMethodKind) -> anyhow::Error {
    GateError::method_not_allowed(format!("Method not implemented: {}", method.verb()))
        .into_anyhow()
}
