use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use spacegate_axum::ResourceInfo;
use spacegate_core::ServiceMethodKind;

use super::{BackendResponse, ClusterRoute, ClusterRoutes, ClusterTransport, ForwardError, ForwardRequest, IMPERSONATE_USER_HEADER};

/// Talks to member cluster API servers over HTTP.
pub struct HttpClusterTransport {
    client: reqwest::Client,
    routes: ClusterRoutes,
    resource: ResourceInfo,
}

impl HttpClusterTransport {
    pub fn new(routes: ClusterRoutes, resource: ResourceInfo) -> Self {
        Self {
            client: reqwest::Client::new(),
            routes,
            resource,
        }
    }

    fn request(
        &self,
        route: &ClusterRoute,
        req: &ForwardRequest,
    ) -> reqwest::RequestBuilder {
        let collection = format!("{}{}", route.url, self.resource.collection_path());
        let (method, url) = match req.method {
            ServiceMethodKind::Find => (Method::GET, collection),
            ServiceMethodKind::Create => (Method::POST, collection),
            ServiceMethodKind::Get => (Method::GET, format!("{collection}/{}", req.workspace)),
            ServiceMethodKind::Update => (Method::PUT, format!("{collection}/{}", req.workspace)),
            ServiceMethodKind::Patch => (Method::PATCH, format!("{collection}/{}", req.workspace)),
            ServiceMethodKind::Remove => (Method::DELETE, format!("{collection}/{}", req.workspace)),
        };

        let mut builder = self
            .client
            .request(method, url)
            .header(IMPERSONATE_USER_HEADER, req.identity.as_str());
        if let Some(token) = route.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(payload) = &req.payload {
            builder = builder.json(payload);
        }
        builder
    }
}

/// Empty and non-JSON bodies decode to `Null`.
fn decode_body(cluster: &str, status: u16, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(cluster, status, error = %err, len = bytes.len(), "cluster answered with a non-JSON body");
            Value::Null
        }
    }
}

#[async_trait]
impl ClusterTransport for HttpClusterTransport {
    async fn dispatch(&self, req: &ForwardRequest) -> Result<BackendResponse, ForwardError> {
        let route = self
            .routes
            .get(&req.cluster)
            .ok_or_else(|| ForwardError::UnknownCluster(req.cluster.clone()))?;

        let transport_err = |e: reqwest::Error| ForwardError::Transport {
            cluster: req.cluster.clone(),
            message: e.to_string(),
        };

        let res = self.request(route, req).send().await.map_err(transport_err)?;
        let status = res.status().as_u16();
        let bytes = res.bytes().await.map_err(transport_err)?;
        let body = decode_body(&req.cluster, status, &bytes);

        Ok(BackendResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacegate_core::CompliantIdentity;

    fn transport() -> HttpClusterTransport {
        let mut routes = ClusterRoutes::default();
        routes.insert(ClusterRoute {
            name: "member-1".into(),
            url: "https://member-1:6443".into(),
            token: Some("sa-token".into()),
        });
        HttpClusterTransport::new(
            routes,
            ResourceInfo::new("toolchain.dev.openshift.com", "v1alpha1", "workspaces", "Workspace"),
        )
    }

    fn get_as(identity: &str) -> ForwardRequest {
        ForwardRequest {
            identity: CompliantIdentity::new(identity),
            method: ServiceMethodKind::Get,
            workspace: "bus".into(),
            cluster: "member-1".into(),
            payload: None,
        }
    }

    #[test]
    fn request_impersonates_with_the_gateway_token() {
        let t = transport();
        let route = t.routes.get("member-1").unwrap();
        let built = t.request(route, &get_as("road-bicycle")).build().unwrap();

        assert_eq!(built.method(), Method::GET);
        assert_eq!(
            built.url().as_str(),
            "https://member-1:6443/apis/toolchain.dev.openshift.com/v1alpha1/workspaces/bus"
        );
        assert_eq!(built.headers()["impersonate-user"], "road-bicycle");
        assert_eq!(built.headers()["authorization"], "Bearer sa-token");
    }

    #[tokio::test]
    async fn unknown_cluster_is_a_transport_failure() {
        let mut req = get_as("car");
        req.cluster = "member-9".into();

        let err = transport().dispatch(&req).await.unwrap_err();
        assert!(matches!(err, ForwardError::UnknownCluster(ref c) if c == "member-9"));
    }

    #[test]
    fn list_goes_to_the_collection() {
        let t = transport();
        let route = t.routes.get("member-1").unwrap();
        let mut req = get_as("bus");
        req.method = ServiceMethodKind::Find;
        req.workspace = String::new();
        let built = t.request(route, &req).build().unwrap();

        assert_eq!(
            built.url().as_str(),
            "https://member-1:6443/apis/toolchain.dev.openshift.com/v1alpha1/workspaces"
        );
        assert_eq!(built.headers()["impersonate-user"], "bus");
    }

    #[test]
    fn undecodable_bodies_keep_only_the_status() {
        assert_eq!(decode_body("member-1", 502, b"<html>bad gateway</html>"), Value::Null);
        assert_eq!(decode_body("member-1", 200, b""), Value::Null);
        assert_eq!(
            decode_body("member-1", 200, br#"{"kind":"Workspace"}"#)["kind"],
            "Workspace"
        );
    }
}
