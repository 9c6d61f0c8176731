//! The resource factory: one schema bound to one collection, exposed as five routes.

use crate::error::AppError;
use crate::handlers::{create, delete as delete_handler, list, read, update};
use crate::routes::common::ResourceInfo;
use crate::schema::Schema;
use crate::state::ResourceState;
use crate::store::{Collection, DocumentDatabase};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted JSON body.
pub const BODY_LIMIT_BYTES: usize = 100 * 1024;

/// A router exposing the collection plus the collection handle itself.
pub struct Resource {
    pub router: Router,
    pub collection: Collection,
    info: ResourceInfo,
}

impl Resource {
    /// Collection name, mount path and schema summary.
    pub fn info(&self) -> &ResourceInfo {
        &self.info
    }

    /// Where the router is meant to be nested, `/<collection>`.
    pub fn path(&self) -> &str {
        &self.info.path
    }
}

/// Build the resource for `collection_name`, creating its storage if needed.
///
/// Routes, relative to wherever the caller mounts the router:
/// - `GET /` lists documents (`skip`, `limit` query params)
/// - `GET /:id` returns one document or `null`
/// - `POST /` validates and inserts
/// - `PUT /:id` validates and merges, returning the previous document or `null`
/// - `DELETE /:id` deletes, returning the removed document or `null`
pub async fn create_resource(
    schema: Schema,
    db: &dyn DocumentDatabase,
    collection_name: &str,
) -> Result<Resource, AppError> {
    schema.check()?;
    let collection = db.collection(collection_name)?;
    collection.ensure().await?;
    tracing::info!(collection = %collection_name, fields = schema.fields.len(), "resource ready");
    let info = ResourceInfo {
        collection: collection_name.to_string(),
        path: format!("/{}", collection_name),
        fields: schema.fields.keys().cloned().collect(),
        unknown_keys: schema.unknown_keys,
    };
    let state = ResourceState {
        collection: collection.clone(),
        schema: Arc::new(schema),
    };
    Ok(Resource {
        router: resource_routes(state),
        collection,
        info,
    })
}

pub fn resource_routes(state: ResourceState) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(read).put(update).delete(delete_handler))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)),
        )
        .layer(middleware::map_response(payload_too_large_as_json))
        .with_state(state)
}

/// `RequestBodyLimitLayer` answers an oversized `Content-Length` with plain text;
/// give it the same JSON error body as a body that overflows while streaming.
async fn payload_too_large_as_json(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.as_bytes().starts_with(b"application/json"))
        .unwrap_or(false);
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return AppError::PayloadTooLarge(format!("request body exceeds {} bytes", BODY_LIMIT_BYTES))
            .into_response();
    }
    response
}
