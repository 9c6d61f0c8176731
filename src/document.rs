//! Document identity and the result shapes returned by collection calls.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field under which every returned document carries its identifier.
pub const ID_FIELD: &str = "_id";

/// Native identifier assigned by the store on insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub uuid::Uuid);

impl DocumentId {
    pub fn new() -> Self {
        DocumentId(uuid::Uuid::new_v4())
    }

    /// Parse a path segment; anything that is not a UUID is a bad request.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        uuid::Uuid::parse_str(s)
            .map(DocumentId)
            .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", s)))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: DocumentId,
}

/// Raw skip/limit passthrough. Zero is the same as unset for both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn skip(&self) -> u64 {
        self.skip.unwrap_or(0)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit.filter(|n| *n > 0)
    }
}

/// Stored fields plus `_id`, as served to clients.
pub fn with_id(id: DocumentId, mut fields: Map<String, Value>) -> Value {
    fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Value::Object(fields)
}

/// Drop a client-supplied `_id`; identity is never taken from a body.
pub fn without_id(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.remove(ID_FIELD);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_non_uuid() {
        assert!(matches!(DocumentId::parse("42"), Err(AppError::BadRequest(_))));
        let id = DocumentId::new();
        assert_eq!(DocumentId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn insert_result_uses_camel_case() {
        let id = DocumentId::new();
        let v = serde_json::to_value(InsertOneResult { acknowledged: true, inserted_id: id }).unwrap();
        assert_eq!(v, json!({"acknowledged": true, "insertedId": id.to_string()}));
    }

    #[test]
    fn zero_skip_and_limit_mean_unset() {
        let opts = FindOptions { skip: Some(0), limit: Some(0) };
        assert_eq!(opts.skip(), 0);
        assert_eq!(opts.limit(), None);
        assert_eq!(FindOptions { skip: None, limit: Some(3) }.limit(), Some(3));
    }

    #[test]
    fn with_id_overrides_body_id() {
        let id = DocumentId::new();
        let mut fields = Map::new();
        fields.insert("title".into(), json!("t"));
        fields.insert(ID_FIELD.into(), json!("spoofed"));
        let doc = with_id(id, without_id(fields));
        assert_eq!(doc, json!({"_id": id.to_string(), "title": "t"}));
    }
}
