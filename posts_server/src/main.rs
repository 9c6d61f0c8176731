//! Posts server: connects to the document store, mounts one resource, and serves it.
//!
//! Run from repo root: `cargo run -p posts-server`
//! With no database: `DATABASE_URL=memory:// cargo run -p posts-server`

mod post;

use axum::{extract::Request, ServiceExt};
use resource_sdk::{
    create_resource, ensure_database_exists, load_schema, resource_app, DocumentDatabase, MemoryDatabase,
    PgDatabase, ServerConfig,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info,posts_server=info")),
        )
        .init();

    let db: Arc<dyn DocumentDatabase> = if config.uses_memory_store() {
        tracing::warn!("using in-memory document store; data is lost on exit");
        Arc::new(MemoryDatabase::new())
    } else {
        ensure_database_exists(&config.database_url).await?;
        Arc::new(PgDatabase::connect(&config.database_url, &config.namespace, config.max_connections).await?)
    };

    let schema = match &config.schema_path {
        Some(path) => load_schema(path).await?,
        None => post::post_schema(),
    };
    let resource = create_resource(schema, db.as_ref(), &config.resource_name).await?;

    let app = resource_app(db, &resource);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        "listening on {} (resource {})",
        listener.local_addr()?,
        resource.path()
    );
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
