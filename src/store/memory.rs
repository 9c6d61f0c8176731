//! In-process document store. Keeps insertion order; used for tests and `memory://`.

use crate::document::{with_id, without_id, DocumentId, FindOptions, InsertOneResult};
use crate::error::{ConfigError, StoreError};
use crate::store::{validate_collection_name, Collection, DocumentDatabase, DocumentStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryCollection {
    docs: RwLock<Vec<(DocumentId, Map<String, Value>)>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryCollection {
    async fn ensure(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find(&self, opts: FindOptions) -> Result<Vec<Value>, StoreError> {
        let docs = self.docs.read().await;
        let iter = docs.iter().skip(opts.skip() as usize);
        let take = opts.limit().map(|n| n as usize).unwrap_or(usize::MAX);
        Ok(iter.take(take).map(|(id, fields)| with_id(*id, fields.clone())).collect())
    }

    async fn find_one(&self, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(doc_id, fields)| with_id(*doc_id, fields.clone())))
    }

    async fn insert_one(&self, doc: Map<String, Value>) -> Result<InsertOneResult, StoreError> {
        let id = DocumentId::new();
        self.docs.write().await.push((id, without_id(doc)));
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
        let mut docs = self.docs.write().await;
        let Some((_, fields)) = docs.iter_mut().find(|(doc_id, _)| doc_id == id) else {
            return Ok(None);
        };
        let before = with_id(*id, fields.clone());
        for (k, v) in without_id(set) {
            fields.insert(k, v);
        }
        Ok(Some(before))
    }

    async fn find_one_and_delete(&self, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let mut docs = self.docs.write().await;
        match docs.iter().position(|(doc_id, _)| doc_id == id) {
            Some(pos) => {
                let (doc_id, fields) = docs.remove(pos);
                Ok(Some(with_id(doc_id, fields)))
            }
            None => Ok(None),
        }
    }
}

/// Collections by name; handing out the same name twice shares the data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    collections: Arc<Mutex<HashMap<String, Arc<MemoryCollection>>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentDatabase for MemoryDatabase {
    fn collection(&self, name: &str) -> Result<Collection, ConfigError> {
        validate_collection_name(name)?;
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let store = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new()))
            .clone();
        Ok(Collection::new(name, store))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
