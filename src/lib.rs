//! Resource SDK: schema-driven CRUD resources over a document store.

pub mod config;
pub mod document;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;

pub use config::ServerConfig;
pub use document::{DocumentId, FindOptions, InsertOneResult};
pub use error::{AppError, ConfigError, StoreError};
pub use routes::{create_resource, resource_app, service_routes, App, Resource, ResourceInfo};
pub use schema::{load_schema, FieldDef, FieldType, Schema, UnknownKeys, ValidationError};
pub use state::ResourceState;
pub use store::{
    ensure_database_exists, Collection, DocumentDatabase, DocumentStore, MemoryDatabase, PgDatabase,
};
