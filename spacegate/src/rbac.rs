//! Authorization messages in the exact form an API server's RBAC layer
//! produces them.
//!
//! The gateway and [`crate::forward::LocalCluster`] both build their denials
//! here, so a client sees the same text whichever layer refused it.

use spacegate_axum::ResourceInfo;
use spacegate_core::errors::{GateError, StatusDetails};
use spacegate_core::{CompliantIdentity, ServiceMethodKind};

/// `workspaces.<group> ["<name>" ]is forbidden: User "<id>" cannot <verb> ...`
///
/// `create` is never name-qualified.
pub fn forbidden_message(
    resource: &ResourceInfo,
    identity: &CompliantIdentity,
    method: ServiceMethodKind,
    name: Option<&str>,
) -> String {
    let subject = match (method, name) {
        (ServiceMethodKind::Create, _) | (_, None) => resource.qualified_plural(),
        (_, Some(name)) => format!("{} \"{}\"", resource.qualified_plural(), name),
    };
    format!(
        "{subject} is forbidden: User \"{identity}\" cannot {verb} resource \"{plural}\" in API group \"{group}\" at the cluster scope",
        verb = method.verb(),
        plural = resource.plural,
        group = resource.group,
    )
}

pub fn forbidden(
    resource: &ResourceInfo,
    identity: &CompliantIdentity,
    method: ServiceMethodKind,
    name: Option<&str>,
) -> GateError {
    let mut details = StatusDetails::resource(&resource.plural, &resource.group);
    if let Some(name) = name.filter(|_| method != ServiceMethodKind::Create) {
        details = details.named(name);
    }
    GateError::forbidden(forbidden_message(resource, identity, method, name)).with_details(details)
}

/// Identical for a workspace that does not exist and one the caller cannot
/// see.
pub fn not_found(resource: &ResourceInfo, name: &str) -> GateError {
    GateError::not_found(format!(
        "the server could not find the requested resource (get {} {})",
        resource.qualified_plural(),
        name
    ))
    .with_details(StatusDetails::resource(&resource.plural, &resource.group).named(name))
}
