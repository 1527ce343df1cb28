use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{OriginalUri, Path, Query, State},
    http::HeaderMap,
    routing, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use spacegate_core::errors::GateError;
use spacegate_core::{CallerContext, GateApp, ServiceHandle};

use crate::{
    params::{FromRestParams, RestParams},
    GateAxumError,
};

/// Header the upstream authenticating proxy uses for the raw username.
pub const DEFAULT_USER_HEADER: &str = "x-remote-user";

/// API coordinates of the resource a router serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub group: String,
    pub version: String,
    /// Lowercase plural, e.g. `workspaces`.
    pub plural: String,
    pub kind: String,
    pub list_kind: String,
}

impl ResourceInfo {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        plural: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
            list_kind: format!("{kind}List"),
            kind,
        }
    }

    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Mount point, e.g. `/apis/<group>/<version>/workspaces`.
    pub fn collection_path(&self) -> String {
        format!("/apis/{}/{}/{}", self.group, self.version, self.plural)
    }

    /// `workspaces.<group>`, the form used in API server messages.
    pub fn qualified_plural(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEnvelope<R> {
    api_version: String,
    kind: String,
    metadata: serde_json::Map<String, serde_json::Value>,
    items: Vec<R>,
}

fn list_envelope<R>(resource: &ResourceInfo, items: Vec<R>) -> ListEnvelope<R> {
    ListEnvelope {
        api_version: resource.api_version(),
        kind: resource.list_kind.clone(),
        metadata: serde_json::Map::new(),
        items,
    }
}

/// Everything a resource's handlers share: the app, the registered service
/// name and the API coordinates lists are wrapped with.
struct ResourceState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    app: Arc<GateApp<R, P>>,
    service: Arc<String>,
    resource: Arc<ResourceInfo>,
}

impl<R, P> Clone for ResourceState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            service: Arc::clone(&self.service),
            resource: Arc::clone(&self.resource),
        }
    }
}

impl<R, P> ResourceState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn service(&self) -> anyhow::Result<ServiceHandle<R, P>> {
        self.app.service(&self.service)
    }
}

fn caller_from_headers<R, P>(
    state: &ResourceState<R, P>,
    headers: &HeaderMap,
) -> Result<CallerContext, GateAxumError>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    let header = state
        .app
        .get("auth.userHeader")
        .unwrap_or_else(|| DEFAULT_USER_HEADER.to_string());

    headers
        .get(header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CallerContext::unresolved)
        .ok_or_else(|| GateError::not_authenticated("Unauthorized").into())
}

fn body_or_none<R>(data: Result<Json<R>, JsonRejection>) -> Option<R> {
    match data {
        Ok(Json(data)) => Some(data),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "request body could not be decoded");
            None
        }
    }
}

pub fn service_router<R, P>(
    service_name: Arc<String>,
    resource: Arc<ResourceInfo>,
    app: Arc<GateApp<R, P>>,
) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let state = ResourceState {
        app,
        service: service_name,
        resource,
    };

    Router::new()
        .route(
            "/",
            routing::get(
                |State(state): State<ResourceState<R, P>>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri| async move {
                    let caller = caller_from_headers(&state, &headers)?;

                    let params = RestParams::from_parts("rest", &headers, query, "GET", &uri);
                    let params = P::from_rest_params(params);

                    let svc = state.service()?;
                    let items = svc.find(caller, params).await?;
                    Ok::<_, GateAxumError>(Json(list_envelope(&state.resource, items)))
                },
            )
            .post(
                |State(state): State<ResourceState<R, P>>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri,
                 data: Result<Json<R>, JsonRejection>| async move {
                    let caller = caller_from_headers(&state, &headers)?;

                    let params = RestParams::from_parts("rest", &headers, query, "POST", &uri);
                    let params = P::from_rest_params(params);

                    let svc = state.service()?;
                    let res = svc.create(caller, body_or_none(data), params).await?;
                    Ok::<_, GateAxumError>(Json(res))
                },
            ),
        )
        .route(
            "/{name}",
            routing::get(
                |State(state): State<ResourceState<R, P>>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri,
                 Path(name): Path<String>| async move {
                    let caller = caller_from_headers(&state, &headers)?;

                    let params = RestParams::from_parts("rest", &headers, query, "GET", &uri);
                    let params = P::from_rest_params(params);

                    let svc = state.service()?;
                    let res = svc.get(caller, &name, params).await?;
                    Ok::<_, GateAxumError>(Json(res))
                },
            )
            .put(
                |State(state): State<ResourceState<R, P>>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri,
                 Path(name): Path<String>,
                 data: Result<Json<R>, JsonRejection>| async move {
                    let caller = caller_from_headers(&state, &headers)?;

                    let params = RestParams::from_parts("rest", &headers, query, "PUT", &uri);
                    let params = P::from_rest_params(params);

                    let svc = state.service()?;
                    let res = svc.update(caller, &name, body_or_none(data), params).await?;
                    Ok::<_, GateAxumError>(Json(res))
                },
            )
            .patch(
                |State(state): State<ResourceState<R, P>>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri,
                 Path(name): Path<String>,
                 data: Result<Json<R>, JsonRejection>| async move {
                    let caller = caller_from_headers(&state, &headers)?;

                    let params = RestParams::from_parts("rest", &headers, query, "PATCH", &uri);
                    let params = P::from_rest_params(params);

                    let svc = state.service()?;
                    let res = svc.patch(caller, &name, body_or_none(data), params).await?;
                    Ok::<_, GateAxumError>(Json(res))
                },
            )
            .delete(
                |State(state): State<ResourceState<R, P>>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri,
                 Path(name): Path<String>| async move {
                    let caller = caller_from_headers(&state, &headers)?;

                    let params = RestParams::from_parts("rest", &headers, query, "DELETE", &uri);
                    let params = P::from_rest_params(params);

                    let svc = state.service()?;
                    let res = svc.remove(caller, &name, params).await?;
                    Ok::<_, GateAxumError>(Json(res))
                },
            ),
        )
        .with_state(state)
}
