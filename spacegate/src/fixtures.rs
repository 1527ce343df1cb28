use spacegate_core::CompliantIdentity;

use crate::model::{ObjectMeta, SpaceNamespace, SpaceRecord};
use crate::store::InMemorySharingStore;

pub(crate) fn record(name: &str) -> SpaceRecord {
    SpaceRecord {
        name: name.to_string(),
        owner: name.to_string(),
        owner_identity: CompliantIdentity::new(name),
        tier: "appstudio".to_string(),
        target_cluster: "member-1".to_string(),
        namespaces: vec![SpaceNamespace::tenant_of(name)],
        available_roles: vec!["admin".into(), "contributor".into(), "maintainer".into()],
        provisioned: true,
        metadata: ObjectMeta {
            resource_version: "1".to_string(),
            generation: 1,
            creation_timestamp: "2024-01-01T00:00:00Z".to_string(),
            uid: format!("uid-{name}"),
        },
    }
}

/// car shares with bus and bicycle, bus shares with bicycle.
pub(crate) fn vehicles() -> InMemorySharingStore {
    let store = InMemorySharingStore::new();
    for name in ["car", "bus", "road-bicycle"] {
        store.provision(record(name)).unwrap();
    }
    store.register_account("car", None).unwrap();
    store.register_account("bus", None).unwrap();
    store.register_account("road.bicycle", None).unwrap();

    store.share("car", CompliantIdentity::new("bus"), "contributor").unwrap();
    store.share("car", CompliantIdentity::new("road-bicycle"), "contributor").unwrap();
    store.share("bus", CompliantIdentity::new("road-bicycle"), "maintainer").unwrap();
    store
}
