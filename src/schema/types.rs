//! Declarative schema types. Deserializable from JSON so schemas can live in files.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        }
    }
}

/// What happens to body keys the schema does not declare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeys {
    #[default]
    Strip,
    Strict,
    Passthrough,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub type_: FieldType,
    /// Fields are required unless marked optional.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub nullable: bool,
    /// Nested fields when `type` is `object`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldDef>>,
    /// Element shape when `type` is `array`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// `pattern` compiled by `Schema::check` (or on first use).
    #[serde(skip)]
    pub(crate) compiled: OnceLock<Regex>,
}

impl FieldDef {
    pub fn of(type_: FieldType) -> Self {
        FieldDef {
            type_,
            optional: false,
            nullable: false,
            fields: None,
            items: None,
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
            allowed: None,
            minimum: None,
            maximum: None,
            compiled: OnceLock::new(),
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn any() -> Self {
        Self::of(FieldType::Any)
    }

    pub fn array(items: FieldDef) -> Self {
        FieldDef {
            items: Some(Box::new(items)),
            ..Self::of(FieldType::Array)
        }
    }

    pub fn object(fields: impl IntoIterator<Item = (String, FieldDef)>) -> Self {
        FieldDef {
            fields: Some(fields.into_iter().collect()),
            ..Self::of(FieldType::Object)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, re: impl Into<String>) -> Self {
        self.pattern = Some(re.into());
        self.compiled = OnceLock::new();
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn allowed(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.allowed = Some(values.into_iter().collect());
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }

    /// The compiled `pattern`, if any. Compiles once; later calls reuse it.
    pub fn pattern_regex(&self) -> Result<Option<&Regex>, regex::Error> {
        let Some(pattern) = self.pattern.as_deref() else {
            return Ok(None);
        };
        if let Some(re) = self.compiled.get() {
            return Ok(Some(re));
        }
        let re = Regex::new(pattern)?;
        Ok(Some(self.compiled.get_or_init(|| re)))
    }
}

/// Top-level object shape that request bodies are parsed against.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(default)]
    pub unknown_keys: UnknownKeys,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn strict(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Strict;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Passthrough;
        self
    }
}
