//! spacegate-axum: Axum adapter for spacegate.
//!
//! Builds one REST router per registered resource and renders every error as
//! an API server `Status` body.

pub mod app;
pub mod params;
pub mod rest;
mod error;
pub use error::GateAxumError;

pub use app::{axum, AxumApp};
pub use rest::ResourceInfo;
