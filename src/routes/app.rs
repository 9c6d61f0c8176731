//! The served application: service routes plus one resource nested at its path.

use crate::routes::common::service_routes;
use crate::routes::resource::Resource;
use crate::store::DocumentDatabase;
use axum::Router;
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Router wrapped so `/posts/` and `/posts` reach the same handler.
pub type App = NormalizePath<Router>;

/// Path normalization has to run before routing, so it wraps the finished router
/// instead of going through `Router::layer`. Serve with
/// `axum::ServiceExt::<axum::extract::Request>::into_make_service(app)`.
pub fn resource_app(db: Arc<dyn DocumentDatabase>, resource: &Resource) -> App {
    let router = Router::new()
        .merge(service_routes(db, resource.info().clone()))
        .nest(resource.path(), resource.router.clone());
    NormalizePathLayer::trim_trailing_slash().layer(router)
}
