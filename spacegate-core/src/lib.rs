//! spacegate-core: framework-agnostic core for spacegate.
//!
//! Services are called with an explicit [`CallerContext`] and run through a
//! before/after/error hook pipeline owned by [`GateApp`].

pub mod app;
pub mod caller;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod registry;
pub mod service;

pub use app::{GateApp, ServiceHandle};
pub use caller::{CallerContext, CompliantIdentity};
pub use config::{GateConfig, GateConfigSnapshot};
pub use errors::{ErrorKind, GateError};
pub use hooks::{
    GateAfterHook, GateBeforeHook, GateErrorHook, HookContext, HookResult, ServiceHooks,
};
pub use registry::GateServiceRegistry;
pub use service::{GateService, ServiceCapabilities, ServiceMethodKind};
