//! Routers: per-resource document routes, service routes, and the app that serves both.

pub mod app;
pub mod common;
pub mod resource;

pub use app::{resource_app, App};
pub use common::{service_routes, ResourceInfo};
pub use resource::{create_resource, resource_routes, Resource, BODY_LIMIT_BYTES};
