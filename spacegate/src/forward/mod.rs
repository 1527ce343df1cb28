//! Dispatching authorized requests to the cluster that hosts a workspace,
//! acting as the caller.
//!
//! The gateway authenticates to member clusters with its own service token
//! but every request carries `Impersonate-User: <compliant identity>`, so the
//! member's RBAC decides as if the caller had asked directly.

mod http;
mod local;

pub use http::HttpClusterTransport;
pub use local::LocalCluster;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use spacegate_core::errors::GateError;
use spacegate_core::{CompliantIdentity, GateConfigSnapshot, ServiceMethodKind};
use thiserror::Error;

use crate::model::SpaceRecord;

pub const IMPERSONATE_USER_HEADER: &str = "Impersonate-User";

/// Where a member cluster's API lives and how the gateway authenticates to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRoute {
    pub name: String,
    pub url: String,
    pub token: Option<String>,
}

/// Member clusters by name, read from `clusters.<name>.url` and
/// `clusters.<name>.token`.
#[derive(Debug, Clone, Default)]
pub struct ClusterRoutes {
    routes: BTreeMap<String, ClusterRoute>,
}

impl ClusterRoutes {
    pub fn from_config(config: &GateConfigSnapshot) -> Self {
        let mut urls: BTreeMap<String, String> = BTreeMap::new();
        let mut tokens: BTreeMap<String, String> = BTreeMap::new();

        for (rest, value) in config.with_prefix("clusters") {
            match rest.rsplit_once('.') {
                Some((name, "url")) => {
                    urls.insert(name.to_string(), value);
                }
                Some((name, "token")) => {
                    tokens.insert(name.to_string(), value);
                }
                _ => tracing::warn!(key = %rest, "ignoring unknown cluster setting"),
            }
        }

        let mut routes = BTreeMap::new();
        for (name, url) in urls {
            let token = tokens.remove(&name).filter(|t| !t.is_empty());
            routes.insert(
                name.clone(),
                ClusterRoute {
                    name,
                    url: url.trim_end_matches('/').to_string(),
                    token,
                },
            );
        }
        for name in tokens.keys() {
            tracing::warn!(cluster = %name, "cluster has a token but no url");
        }

        Self { routes }
    }

    pub fn insert(&mut self, route: ClusterRoute) {
        self.routes.insert(route.name.clone(), route);
    }

    pub fn get(&self, name: &str) -> Option<&ClusterRoute> {
        self.routes.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// One request to a member cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRequest {
    /// Acting principal; never the gateway's own identity.
    pub identity: CompliantIdentity,
    pub method: ServiceMethodKind,
    /// Empty for list requests.
    pub workspace: String,
    pub cluster: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Value,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The member's RBAC refused or hid the workspace.
    pub fn is_denied(&self) -> bool {
        matches!(self.status, 403 | 404)
    }

    /// Names in a `<Kind>List` body, or `None` when the body is not a list.
    pub fn item_names(&self) -> Option<BTreeSet<String>> {
        let items = self.body.get("items")?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|item| item.pointer("/metadata/name")?.as_str())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// The request never got an authorization answer.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no route to cluster {0}")]
    UnknownCluster(String),

    #[error("cluster {cluster} unreachable: {message}")]
    Transport { cluster: String, message: String },

    #[error("cluster {cluster} did not answer within {timeout_ms}ms")]
    Timeout { cluster: String, timeout_ms: u64 },

    #[error("cluster {cluster} answered {status}")]
    Rejected { cluster: String, status: u16 },
}

impl From<ForwardError> for GateError {
    fn from(err: ForwardError) -> Self {
        let message = err.to_string();
        match err {
            ForwardError::UnknownCluster(_) => GateError::unavailable(message),
            ForwardError::Transport { .. } | ForwardError::Rejected { .. } => {
                GateError::bad_gateway(message)
            }
            ForwardError::Timeout { .. } => GateError::gateway_timeout(message),
        }
    }
}

#[async_trait]
pub trait ClusterTransport: Send + Sync {
    async fn dispatch(&self, req: &ForwardRequest) -> Result<BackendResponse, ForwardError>;
}

#[derive(Clone)]
pub struct Forwarder {
    transport: Arc<dyn ClusterTransport>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(transport: Arc<dyn ClusterTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Send `method` on `workspace` to its target cluster as `identity`.
    pub async fn forward(
        &self,
        identity: &CompliantIdentity,
        method: ServiceMethodKind,
        workspace: &SpaceRecord,
        payload: Option<Value>,
    ) -> Result<BackendResponse, ForwardError> {
        self.send(ForwardRequest {
            identity: identity.clone(),
            method,
            workspace: workspace.name.clone(),
            cluster: workspace.target_cluster.clone(),
            payload,
        })
        .await
    }

    /// List the collection on `cluster` as `identity`.
    pub async fn list(
        &self,
        identity: &CompliantIdentity,
        cluster: &str,
    ) -> Result<BackendResponse, ForwardError> {
        self.send(ForwardRequest {
            identity: identity.clone(),
            method: ServiceMethodKind::Find,
            workspace: String::new(),
            cluster: cluster.to_string(),
            payload: None,
        })
        .await
    }

    async fn send(&self, req: ForwardRequest) -> Result<BackendResponse, ForwardError> {
        tracing::debug!(
            identity = %req.identity,
            verb = req.method.verb(),
            workspace = %req.workspace,
            cluster = %req.cluster,
            "forwarding as caller"
        );

        match tokio::time::timeout(self.timeout, self.transport.dispatch(&req)).await {
            Ok(res) => res,
            Err(_) => Err(ForwardError::Timeout {
                cluster: req.cluster,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::record;
    use parking_lot::Mutex;
    use spacegate_core::GateConfig;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<ForwardRequest>>,
    }

    #[async_trait]
    impl ClusterTransport for Recording {
        async fn dispatch(&self, req: &ForwardRequest) -> Result<BackendResponse, ForwardError> {
            self.seen.lock().push(req.clone());
            Ok(BackendResponse {
                status: 200,
                body: Value::Null,
            })
        }
    }

    struct Hanging;

    #[async_trait]
    impl ClusterTransport for Hanging {
        async fn dispatch(&self, _req: &ForwardRequest) -> Result<BackendResponse, ForwardError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(ForwardError::UnknownCluster("never".into()))
        }
    }

    #[tokio::test]
    async fn caller_identity_is_the_acting_principal() {
        let transport = Arc::new(Recording::default());
        let fwd = Forwarder::new(transport.clone(), Duration::from_secs(1));

        let mut ws = record("bus");
        ws.target_cluster = "member-2".into();
        fwd.forward(&CompliantIdentity::new("road-bicycle"), ServiceMethodKind::Get, &ws, None)
            .await
            .unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen[0].identity.as_str(), "road-bicycle");
        assert_eq!(seen[0].cluster, "member-2");
        assert_eq!(seen[0].workspace, "bus");
    }

    #[tokio::test]
    async fn list_targets_a_cluster_not_a_workspace() {
        let transport = Arc::new(Recording::default());
        let fwd = Forwarder::new(transport.clone(), Duration::from_secs(1));

        fwd.list(&CompliantIdentity::new("bus"), "member-1").await.unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen[0].method, ServiceMethodKind::Find);
        assert_eq!(seen[0].cluster, "member-1");
        assert!(seen[0].workspace.is_empty());
    }

    #[test]
    fn item_names_read_list_bodies_only() {
        let list = BackendResponse {
            status: 200,
            body: serde_json::json!({
                "kind": "WorkspaceList",
                "items": [{"metadata": {"name": "car"}}, {"metadata": {"name": "bus"}}, {}],
            }),
        };
        let names = list.item_names().unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["bus", "car"]);

        let single = BackendResponse {
            status: 200,
            body: serde_json::json!({"metadata": {"name": "car"}}),
        };
        assert!(single.item_names().is_none());
    }

    #[test]
    fn rejected_answers_are_bad_gateway() {
        let err = GateError::from(ForwardError::Rejected {
            cluster: "member-1".into(),
            status: 500,
        });
        assert_eq!(err.code(), 502);
        assert_eq!(err.message, "cluster member-1 answered 500");
    }

    #[tokio::test]
    async fn slow_clusters_time_out() {
        let fwd = Forwarder::new(Arc::new(Hanging), Duration::from_millis(20));

        let err = fwd
            .forward(&CompliantIdentity::new("car"), ServiceMethodKind::Get, &record("car"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ForwardError::Timeout { .. }));
        assert!(GateError::from(err).is_retryable());
    }

    #[test]
    fn routes_pair_urls_and_tokens() {
        let mut cfg = GateConfig::new();
        cfg.set("clusters.member-1.url", "https://member-1:6443/");
        cfg.set("clusters.member-1.token", "sa-token");
        cfg.set("clusters.member-2.url", "https://member-2:6443");
        cfg.set("clusters.orphan.token", "lost");

        let routes = ClusterRoutes::from_config(&cfg.snapshot());

        let m1 = routes.get("member-1").unwrap();
        assert_eq!(m1.url, "https://member-1:6443");
        assert_eq!(m1.token.as_deref(), Some("sa-token"));
        assert!(routes.get("member-2").unwrap().token.is_none());
        assert!(routes.get("orphan").is_none());
    }
}
