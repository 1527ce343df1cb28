use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use spacegate::model::Binding;
use spacegate::store::{InMemorySharingStore, StoreSeed};
use spacegate_core::CompliantIdentity;
use tower::ServiceExt;

const WORKSPACES: &str = "/apis/toolchain.dev.openshift.com/v1alpha1/workspaces";

fn seeded() -> Arc<InMemorySharingStore> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/seed/vehicles.json");
    Arc::new(InMemorySharingStore::load_seed_file(path).unwrap())
}

fn router(store: Arc<InMemorySharingStore>) -> axum::Router {
    spacegate::build_with_store(store, &[]).unwrap().router()
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header("x-remote-user", user);
    }
    match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    }
}

async fn call(router: axum::Router, req: Request<Body>) -> (u16, Value) {
    let res = router.oneshot(req).await.unwrap();
    let status = res.status().as_u16();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn list(router: axum::Router, user: &str) -> Vec<Value> {
    let (status, body) = call(router, request("GET", WORKSPACES, Some(user), None)).await;
    assert_eq!(status, 200);
    assert_eq!(body["kind"], "WorkspaceList");
    body["items"].as_array().unwrap().clone()
}

async fn get(router: axum::Router, user: &str, name: &str) -> (u16, Value) {
    call(router, request("GET", &format!("{WORKSPACES}/{name}"), Some(user), None)).await
}

fn names(items: &[Value]) -> Vec<&str> {
    items.iter().map(|w| w["metadata"]["name"].as_str().unwrap()).collect()
}

fn assert_metadata_complete(ws: &Value) {
    let meta = &ws["metadata"];
    assert!(!meta["resourceVersion"].as_str().unwrap().is_empty());
    assert!(meta["generation"].as_i64().unwrap() > 0);
    assert!(!meta["creationTimestamp"].as_str().unwrap().is_empty());
    assert!(!meta["uid"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn car_sees_only_its_home_workspace() {
    let items = list(router(seeded()), "car").await;

    assert_eq!(names(&items), vec!["car"]);
    let car = &items[0];
    assert_eq!(car["apiVersion"], "toolchain.dev.openshift.com/v1alpha1");
    assert_eq!(car["kind"], "Workspace");
    assert_eq!(
        car["status"],
        json!({
            "owner": "car",
            "role": "admin",
            "type": "home",
            "namespaces": [{"name": "car-tenant", "type": "default"}]
        })
    );
    assert_metadata_complete(car);
}

#[tokio::test]
async fn bus_sees_its_own_and_car() {
    let items = list(router(seeded()), "bus").await;

    assert_eq!(names(&items), vec!["bus", "car"]);
    assert_eq!(items[0]["status"]["type"], "home");
    assert_eq!(items[1]["status"]["role"], "contributor");
    assert!(items[1]["status"].get("type").is_none());
    items.iter().for_each(assert_metadata_complete);
}

#[tokio::test]
async fn dotted_username_sees_three_workspaces() {
    let items = list(router(seeded()), "road.bicycle").await;

    assert_eq!(names(&items), vec!["road-bicycle", "bus", "car"]);
    assert_eq!(items[0]["status"]["owner"], "road.bicycle");
    assert_eq!(items[0]["status"]["type"], "home");
}

#[tokio::test]
async fn get_carries_available_roles() {
    let (status, body) = get(router(seeded()), "road.bicycle", "road-bicycle").await;
    assert_eq!(status, 200);
    assert_eq!(
        body["status"],
        json!({
            "owner": "road.bicycle",
            "role": "admin",
            "type": "home",
            "namespaces": [{"name": "road-bicycle-tenant", "type": "default"}],
            "availableRoles": ["admin", "contributor", "maintainer"]
        })
    );

    let (status, body) = get(router(seeded()), "bus", "car").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"]["role"], "contributor");
    assert!(body["status"].get("type").is_none());
    assert_eq!(body["status"]["availableRoles"], json!(["admin", "contributor", "maintainer"]));
    assert_metadata_complete(&body);
}

#[tokio::test]
async fn invisible_and_absent_workspaces_look_the_same() {
    let (status, hidden) = get(router(seeded()), "car", "bus").await;
    assert_eq!(status, 404);
    assert_eq!(
        hidden["message"],
        "the server could not find the requested resource (get workspaces.toolchain.dev.openshift.com bus)"
    );

    let (status, absent) = get(router(seeded()), "car", "truck").await;
    assert_eq!(status, 404);
    assert_eq!(hidden["reason"], absent["reason"]);
    assert_eq!(hidden["details"]["kind"], absent["details"]["kind"]);
    assert_eq!(
        absent["message"],
        "the server could not find the requested resource (get workspaces.toolchain.dev.openshift.com truck)"
    );
}

#[tokio::test]
async fn create_is_forbidden_at_cluster_scope() {
    let body = json!({"metadata": {"name": "bus"}}).to_string();
    let (status, res) = call(
        router(seeded()),
        request("POST", WORKSPACES, Some("road.bicycle"), Some(&body)),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(res["reason"], "Forbidden");
    assert_eq!(
        res["message"],
        "workspaces.toolchain.dev.openshift.com is forbidden: User \"road-bicycle\" cannot create resource \"workspaces\" in API group \"toolchain.dev.openshift.com\" at the cluster scope"
    );
}

#[tokio::test]
async fn owner_cannot_update_patch_or_delete() {
    for (method, verb) in [("PUT", "update"), ("PATCH", "patch"), ("DELETE", "delete")] {
        let body = (method != "DELETE").then(|| json!({"metadata": {"name": "road-bicycle"}}).to_string());
        let (status, res) = call(
            router(seeded()),
            request(
                method,
                &format!("{WORKSPACES}/road-bicycle"),
                Some("road.bicycle"),
                body.as_deref(),
            ),
        )
        .await;

        assert_eq!(status, 403, "{method}");
        assert_eq!(
            res["message"],
            format!(
                "workspaces.toolchain.dev.openshift.com \"road-bicycle\" is forbidden: User \"road-bicycle\" cannot {verb} resource \"workspaces\" in API group \"toolchain.dev.openshift.com\" at the cluster scope"
            )
        );
    }
}

#[tokio::test]
async fn malformed_write_bodies_are_still_forbidden() {
    let (status, res) = call(
        router(seeded()),
        request("POST", WORKSPACES, Some("car"), Some("{not json")),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(res["reason"], "Forbidden");
}

#[tokio::test]
async fn unauthenticated_callers_are_rejected() {
    let (status, res) = call(router(seeded()), request("GET", WORKSPACES, None, None)).await;
    assert_eq!(status, 401);
    assert_eq!(res["reason"], "Unauthorized");

    let (status, _) = call(router(seeded()), request("GET", WORKSPACES, Some("truck"), None)).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn regrant_changes_role_but_not_the_list() {
    let store = seeded();
    store
        .share("car", CompliantIdentity::new("bus"), "maintainer")
        .unwrap();

    let items = list(router(store), "bus").await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["status"]["role"], "maintainer");
}

#[tokio::test]
async fn corrupt_bindings_do_not_leak() {
    let store = seeded();
    store.insert_binding_unchecked(Binding {
        workspace: "bus".into(),
        grantee: CompliantIdentity::new("car"),
        role: "root".into(),
    });

    let items = list(router(store.clone()), "car").await;
    assert_eq!(names(&items), vec!["car"]);

    let (status, _) = get(router(store), "car", "bus").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn list_roles_can_be_switched_on() {
    let ax = spacegate::build_with_store(seeded(), &[("workspaces.listAvailableRoles", "true")]).unwrap();
    let items = list(ax.router(), "bus").await;

    assert!(items
        .iter()
        .all(|w| w["status"]["availableRoles"].as_array().map(Vec::len) == Some(3)));
}

#[tokio::test]
async fn health_and_request_ids() {
    let res = router(seeded())
        .oneshot(request("GET", "/healthz", None, None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let res = router(seeded())
        .oneshot(request("GET", WORKSPACES, Some("car"), None))
        .await
        .unwrap();
    assert!(res.headers().get("x-request-id").is_some());
}

fn chain() -> Arc<InMemorySharingStore> {
    let workspace = |name: &str| {
        json!({
            "name": name,
            "owner": name,
            "ownerIdentity": name,
            "tier": "appstudio",
            "targetCluster": "member-1",
            "namespaces": [{"name": format!("{name}-tenant"), "type": "default"}],
            "availableRoles": ["admin", "contributor"],
            "metadata": {
                "resourceVersion": "1",
                "generation": 1,
                "creationTimestamp": "2024-05-02T09:14:03Z",
                "uid": format!("uid-{name}")
            }
        })
    };
    let seed: StoreSeed = serde_json::from_value(json!({
        "workspaces": [workspace("x"), workspace("y"), workspace("z")],
        "bindings": [
            {"workspace": "x", "grantee": "y", "role": "contributor"},
            {"workspace": "y", "grantee": "z", "role": "contributor"}
        ],
        "accounts": [{"username": "x"}, {"username": "y"}, {"username": "z"}]
    }))
    .unwrap();
    Arc::new(InMemorySharingStore::from_seed(seed).unwrap())
}

#[tokio::test]
async fn shares_do_not_chain() {
    let store = chain();

    let items = list(router(store.clone()), "z").await;
    assert_eq!(names(&items), vec!["z", "y"]);

    let (status, hidden) = get(router(store.clone()), "z", "x").await;
    assert_eq!(status, 404);
    let (_, absent) = get(router(store), "z", "w").await;
    assert_eq!(hidden["reason"], absent["reason"]);
    assert_eq!(hidden["details"]["kind"], absent["details"]["kind"]);
    assert_eq!(
        hidden["message"],
        "the server could not find the requested resource (get workspaces.toolchain.dev.openshift.com x)"
    );
}
