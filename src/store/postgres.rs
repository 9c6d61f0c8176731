//! PostgreSQL document store. Each collection is a table in the configured namespace
//! (a PostgreSQL schema) holding one JSONB document per row.

use crate::document::{with_id, without_id, DocumentId, FindOptions, InsertOneResult};
use crate::error::{AppError, ConfigError, StoreError};
use crate::store::{validate_collection_name, Collection, DocumentDatabase, DocumentStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::sync::Arc;

/// `id` plus the document as JSON text (`doc::text`).
type DocRow = (uuid::Uuid, String);

/// Quote identifier for PostgreSQL (names are checked by `validate_collection_name`).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(namespace: &str, table: &str) -> String {
    format!("{}.{}", quoted(namespace), quoted(table))
}

fn row_to_doc((id, doc): DocRow) -> Result<Value, StoreError> {
    match serde_json::from_str::<Value>(&doc)? {
        Value::Object(fields) => Ok(with_id(DocumentId(id), fields)),
        other => Err(StoreError::InvalidDocument {
            id: id.to_string(),
            message: format!("stored document is not an object: {}", other),
        }),
    }
}

fn rows_to_docs(rows: Vec<DocRow>) -> Result<Vec<Value>, StoreError> {
    rows.into_iter().map(row_to_doc).collect()
}

/// Documents are bound as text and cast to JSONB in SQL.
fn doc_text(doc: Map<String, Value>) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&without_id(doc))?)
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         seq BIGSERIAL NOT NULL, \
         id UUID PRIMARY KEY, \
         doc JSONB NOT NULL)",
        table
    )
}

/// Database handle: a pool plus the namespace collections are created in.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    namespace: Arc<str>,
}

impl PgDatabase {
    pub fn new(pool: PgPool, namespace: &str) -> Result<Self, ConfigError> {
        validate_collection_name(namespace).map_err(|_| ConfigError::InvalidVar {
            key: "DOCUMENT_NAMESPACE",
            message: format!("'{}' is not an identifier", namespace),
        })?;
        Ok(PgDatabase {
            pool,
            namespace: Arc::from(namespace),
        })
    }

    pub async fn connect(database_url: &str, namespace: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, namespace)?)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentDatabase for PgDatabase {
    fn collection(&self, name: &str) -> Result<Collection, ConfigError> {
        validate_collection_name(name)?;
        let store = PgCollection {
            pool: self.pool.clone(),
            namespace: quoted(&self.namespace),
            table: qualified_table(&self.namespace, name),
        };
        Ok(Collection::new(name, Arc::new(store)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

pub struct PgCollection {
    pool: PgPool,
    namespace: String,
    table: String,
}

#[async_trait]
impl DocumentStore for PgCollection {
    async fn ensure(&self) -> Result<(), StoreError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.namespace))
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_table_sql(&self.table)).execute(&self.pool).await?;
        Ok(())
    }

    async fn find(&self, opts: FindOptions) -> Result<Vec<Value>, StoreError> {
        let sql = format!("SELECT id, doc::text FROM {} ORDER BY seq OFFSET $1 LIMIT $2", self.table);
        tracing::debug!(sql = %sql, "query");
        let rows: Vec<DocRow> = sqlx::query_as(&sql)
            .bind(clamp_i64(opts.skip()))
            .bind(opts.limit().map(clamp_i64))
            .fetch_all(&self.pool)
            .await?;
        rows_to_docs(rows)
    }

    async fn find_one(&self, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let sql = format!("SELECT id, doc::text FROM {} WHERE id = $1", self.table);
        tracing::debug!(sql = %sql, %id, "query");
        let row: Option<DocRow> = sqlx::query_as(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.map(row_to_doc).transpose()
    }

    async fn insert_one(&self, doc: Map<String, Value>) -> Result<InsertOneResult, StoreError> {
        let id = DocumentId::new();
        let payload = doc_text(doc)?;
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2::jsonb)", self.table);
        tracing::debug!(sql = %sql, %id, "query");
        sqlx::query(&sql)
            .bind(id.0)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn find_one_and_update(
        &self,
        id: &DocumentId,
        set: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let payload = doc_text(set)?;
        // The locked subselect yields the pre-update row.
        let sql = format!(
            "UPDATE {t} AS cur SET doc = cur.doc || $2::jsonb \
             FROM (SELECT id, doc FROM {t} WHERE id = $1 FOR UPDATE) AS prev \
             WHERE cur.id = prev.id RETURNING prev.id, prev.doc::text",
            t = self.table
        );
        tracing::debug!(sql = %sql, %id, "query");
        let row: Option<DocRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .bind(payload)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_doc).transpose()
    }

    async fn find_one_and_delete(&self, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1 RETURNING id, doc::text", self.table);
        tracing::debug!(sql = %sql, %id, "query");
        let row: Option<DocRow> = sqlx::query_as(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.map(row_to_doc).transpose()
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Create the database named in `database_url` if it does not exist (connects via the `postgres` db).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| ConfigError::InvalidVar {
            key: "DATABASE_URL",
            message: "no database path".into(),
        })?;
    let path_and_query = &url[path_start..];
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((db, q)) => (db.trim(), Some(q)),
        None => (path_and_query.trim(), None),
    };
    let base = &url[..path_start];
    let admin_url = match query {
        Some(q) => format!("{}postgres?{}", base, q),
        None => format!("{}postgres", base),
    };
    Ok((admin_url, db_name.to_string()))
}
