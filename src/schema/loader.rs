//! Load a schema definition from a JSON file.

use crate::error::ConfigError;
use crate::schema::Schema;
use std::path::Path;

/// Read and check a schema file. Shape:
/// `{"fields": {"title": {"type": "string", "max_length": 200}}, "unknown_keys": "strip"}`.
pub async fn load_schema(path: impl AsRef<Path>) -> Result<Schema, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let schema = parse_schema(&raw).map_err(|e| match e {
        ConfigError::Load(msg) => ConfigError::Load(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;
    tracing::debug!(path = %path.display(), fields = schema.fields.len(), "schema loaded");
    Ok(schema)
}

pub fn parse_schema(raw: &str) -> Result<Schema, ConfigError> {
    let schema: Schema = serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
    schema.check()?;
    Ok(schema)
}
