//! Document store abstraction: one `DocumentStore` per collection, a `DocumentDatabase`
//! that hands out collections, and the `Collection` handle used by resources.

mod memory;
mod postgres;

pub use memory::{MemoryCollection, MemoryDatabase};
pub use postgres::{ensure_database_exists, PgCollection, PgDatabase};

use crate::document::{DocumentId, FindOptions, InsertOneResult};
use crate::error::{ConfigError, StoreError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Operations a collection backend provides. Returned documents include `_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create backing storage if missing. Idempotent.
    async fn ensure(&self) -> Result<(), StoreError>;

    async fn find(&self, opts: FindOptions) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, id: &DocumentId) -> Result<Option<Value>, StoreError>;

    async fn insert_one(&self, doc: Map<String, Value>) -> Result<InsertOneResult, StoreError>;

    /// Shallow-merge `set` into the stored document. Returns the document as it was before.
    async fn find_one_and_update(
        &self,
        id: &DocumentId,
        set: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    async fn find_one_and_delete(&self, id: &DocumentId) -> Result<Option<Value>, StoreError>;
}

#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Handle for a collection. Does not touch storage; call `Collection::ensure` for that.
    fn collection(&self, name: &str) -> Result<Collection, ConfigError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Collection names become table names, so they are restricted to identifiers.
pub fn validate_collection_name(name: &str) -> Result<(), ConfigError> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let ok = RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").ok())
        .as_ref()
        .map(|re| re.is_match(name))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidCollectionName(name.to_string()))
    }
}

/// Cloneable handle to one collection.
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    store: Arc<dyn DocumentStore>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Collection {
    pub fn new(name: &str, store: Arc<dyn DocumentStore>) -> Self {
        Collection {
            name: Arc::from(name),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn ensure(&self) -> Result<(), StoreError> {
        tracing::debug!(collection = %self.name, "ensure");
        self.store.ensure().await
    }

    pub async fn find(&self, opts: FindOptions) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(collection = %self.name, skip = ?opts.skip, limit = ?opts.limit, "find");
        self.store.find(opts).await
    }

    pub async fn find_one(&self, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let doc = self.store.find_one(id).await?;
        tracing::debug!(collection = %self.name, %id, found = doc.is_some(), "find_one");
        Ok(doc)
    }

    pub async fn insert_one(&self, doc: Map<String, Value>) -> Result<InsertOneResult, StoreError> {
        let result = self.store.insert_one(doc).await?;
        tracing::debug!(collection = %self.name, id = %result.inserted_id, "insert_one");
        Ok(result)
    }

    pub async fn find_one_and_update(
        &self,
        id: &DocumentId,
        set: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let doc = self.store.find_one_and_update(id, set).await?;
        tracing::debug!(collection = %self.name, %id, matched = doc.is_some(), "find_one_and_update");
        Ok(doc)
    }

    pub async fn find_one_and_delete(&self, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let doc = self.store.find_one_and_delete(id).await?;
        tracing::debug!(collection = %self.name, %id, matched = doc.is_some(), "find_one_and_delete");
        Ok(doc)
    }
}
