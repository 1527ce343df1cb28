pub mod types;
pub use types::GatewayParams;

pub mod workspaces;
