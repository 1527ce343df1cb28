use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::get;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use spacegate_core::GateApp;
use spacegate_core::GateService;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::params::FromRestParams;
use crate::rest::{self, ResourceInfo};

pub struct AxumApp<R, P = ()>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: Arc<GateApp<R, P>>,
    routes: Router<()>,
}

impl<R, P> Clone for AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            routes: self.routes.clone(),
        }
    }
}

impl<R, P> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: GateApp<R, P>) -> Self {
        Self {
            app: Arc::new(app),
            routes: Router::new(),
        }
    }

    pub fn use_get<H, T>(mut self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        self.routes = self.routes.route(path, get(handler));
        self
    }

    /// Register `service` under `name` and mount its REST routes at the
    /// resource's collection path.
    pub fn use_service(
        mut self,
        name: &str,
        resource: ResourceInfo,
        service: Arc<dyn GateService<R, P>>,
    ) -> Self
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        self.app.register_service(name, service);

        let path = resource.collection_path();
        let router = rest::service_router(
            Arc::new(name.to_string()),
            Arc::new(resource),
            Arc::clone(&self.app),
        );

        self.routes = self.routes.nest(&path, router);
        self
    }

    /// The routes wrapped in request-id and tracing layers.
    ///
    /// Layers only apply to routes that exist when they are added, so call
    /// this after every service is mounted.
    pub fn router(&self) -> Router<()> {
        self.routes
            .clone()
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = ?listener.local_addr()?, "spacegate listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

pub fn axum<R, P>(app: GateApp<R, P>) -> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    AxumApp::new(app)
}
