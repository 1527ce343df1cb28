//! spacegate: a read-only `Workspace` API over a sharing graph.
//!
//! A caller sees the workspaces they own plus the ones shared directly with
//! them. Every write is refused. Reads can be confirmed against the cluster
//! hosting the workspace, impersonating the caller.

mod app;
pub mod config;
pub mod forward;
pub mod hooks;
pub mod identity;
pub mod model;
pub mod projector;
pub mod rbac;
pub mod services;
pub mod store;
pub mod visibility;

#[cfg(test)]
mod fixtures;

use std::sync::Arc;

use anyhow::Result;
use spacegate_axum::{AxumApp, ResourceInfo};

use crate::config::{ForwardMode, GatewaySettings};
use crate::forward::{ClusterRoutes, ClusterTransport, Forwarder, HttpClusterTransport, LocalCluster};
use crate::model::WorkspaceView;
use crate::services::workspaces::{workspaces_shared, WorkspacesService};
use crate::services::GatewayParams;
use crate::store::InMemorySharingStore;
use crate::visibility::VisibilityIndex;

/// Gateway configured from the environment, seeded from `store.seedFile`.
pub fn build() -> Result<AxumApp<WorkspaceView, GatewayParams>> {
    let ax = app::gateway_app();
    config::config(ax.app.as_ref())?;

    let settings = GatewaySettings::from_snapshot(&ax.app.config_snapshot())?;
    let store = match settings.seed_file.as_deref() {
        Some(path) => InMemorySharingStore::load_seed_file(path)?,
        None => {
            tracing::warn!("no store.seedFile configured, starting with an empty sharing graph");
            InMemorySharingStore::new()
        }
    };

    assemble(ax, Arc::new(store), None)
}

/// Gateway over `store`, with `settings` applied on top of the defaults.
/// The environment is not read.
pub fn build_with_store(
    store: Arc<InMemorySharingStore>,
    settings: &[(&str, &str)],
) -> Result<AxumApp<WorkspaceView, GatewayParams>> {
    let ax = app::gateway_app();
    for (key, value) in settings {
        ax.app.set(*key, *value);
    }
    config::defaults(ax.app.as_ref());

    assemble(ax, store, None)
}

/// Like [`build_with_store`], but every list and get is confirmed through
/// `transport` whatever `forward.mode` says.
pub fn build_with_transport(
    store: Arc<InMemorySharingStore>,
    transport: Arc<dyn ClusterTransport>,
    settings: &[(&str, &str)],
) -> Result<AxumApp<WorkspaceView, GatewayParams>> {
    let ax = app::gateway_app();
    for (key, value) in settings {
        ax.app.set(*key, *value);
    }
    config::defaults(ax.app.as_ref());

    assemble(ax, store, Some(transport))
}

fn assemble(
    ax: AxumApp<WorkspaceView, GatewayParams>,
    store: Arc<InMemorySharingStore>,
    transport: Option<Arc<dyn ClusterTransport>>,
) -> Result<AxumApp<WorkspaceView, GatewayParams>> {
    let cfg = ax.app.config_snapshot();
    let settings = GatewaySettings::from_snapshot(&cfg)?;
    let resource = ResourceInfo::new(&settings.group, &settings.version, "workspaces", "Workspace");

    let index = VisibilityIndex::new(store.clone(), settings.store_timeout);
    let mut workspaces = WorkspacesService::new(index.clone(), resource.clone())
        .with_list_available_roles(settings.list_available_roles);

    let transport: Option<Arc<dyn ClusterTransport>> = match (transport, settings.forward_mode) {
        (Some(transport), _) => Some(transport),
        (None, ForwardMode::Off) => None,
        (None, ForwardMode::Local) => Some(Arc::new(LocalCluster::new(index, resource.clone()))),
        (None, ForwardMode::Http) => {
            let routes = ClusterRoutes::from_config(&cfg);
            Some(Arc::new(HttpClusterTransport::new(routes, resource.clone())))
        }
    };
    if let Some(transport) = transport {
        workspaces = workspaces.with_forwarder(Forwarder::new(transport, settings.forward_timeout));
    }
    tracing::info!(
        group = %settings.group,
        version = %settings.version,
        forward = ?settings.forward_mode,
        "workspace gateway configured"
    );

    hooks::global_hooks(ax.app.as_ref(), store);

    let ax = ax
        .use_service("workspaces", resource.clone(), Arc::new(workspaces))
        .use_get("/healthz", || async { "ok" });

    workspaces_shared::register_hooks(ax.app.as_ref(), &resource)?;

    Ok(ax)
}
