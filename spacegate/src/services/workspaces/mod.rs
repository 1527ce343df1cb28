pub mod workspaces_hooks;
pub mod workspaces_service;
pub mod workspaces_shared;

pub use workspaces_service::WorkspacesService;
