//! Body validation against a `Schema`. Collects every issue instead of stopping at the first.

use crate::error::ConfigError;
use crate::schema::{FieldDef, FieldType, Schema, UnknownKeys};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    TooSmall,
    TooBig,
    InvalidString,
    InvalidEnumValue,
    UnrecognizedKeys,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Issue {
    pub code: IssueCode,
    pub path: Vec<PathSegment>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
}

/// Serialized as-is into the 400 response body.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
#[error("{} validation issue(s)", .issues.len())]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

const FORMATS: &[&str] = &["email", "uuid", "datetime", "url"];

impl Schema {
    /// Parse a request body. On success returns the object with undeclared keys
    /// handled per `unknown_keys` (stripped by default).
    pub fn parse(&self, body: &Value) -> Result<Map<String, Value>, ValidationError> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        let out = match body {
            Value::Object(obj) => parse_object(&self.fields, self.unknown_keys, obj, &mut path, &mut issues),
            other => {
                issues.push(type_issue(&path, FieldType::Object, other));
                Map::new()
            }
        };
        if issues.is_empty() {
            Ok(out)
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Check the definition itself: nested shapes present, regexes compile, bounds ordered.
    pub fn check(&self) -> Result<(), ConfigError> {
        for (name, def) in &self.fields {
            check_field(name, def)?;
        }
        Ok(())
    }
}

fn check_field(name: &str, def: &FieldDef) -> Result<(), ConfigError> {
    match def.type_ {
        FieldType::Object => {
            let fields = def
                .fields
                .as_ref()
                .ok_or_else(|| ConfigError::Schema(format!("{}: object field needs 'fields'", name)))?;
            for (child, child_def) in fields {
                check_field(&format!("{}.{}", name, child), child_def)?;
            }
        }
        FieldType::Array => {
            let items = def
                .items
                .as_ref()
                .ok_or_else(|| ConfigError::Schema(format!("{}: array field needs 'items'", name)))?;
            check_field(&format!("{}[]", name), items)?;
        }
        _ => {}
    }
    def.pattern_regex()
        .map_err(|e| ConfigError::Schema(format!("{}: invalid pattern: {}", name, e)))?;
    if let Some(ref format) = def.format {
        if !FORMATS.contains(&format.to_lowercase().as_str()) {
            return Err(ConfigError::Schema(format!("{}: unknown format '{}'", name, format)));
        }
    }
    if let (Some(min), Some(max)) = (def.min_length, def.max_length) {
        if min > max {
            return Err(ConfigError::Schema(format!("{}: min_length greater than max_length", name)));
        }
    }
    if let (Some(min), Some(max)) = (def.minimum, def.maximum) {
        if min > max {
            return Err(ConfigError::Schema(format!("{}: minimum greater than maximum", name)));
        }
    }
    Ok(())
}

fn parse_object(
    fields: &std::collections::BTreeMap<String, FieldDef>,
    unknown_keys: UnknownKeys,
    obj: &Map<String, Value>,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<Issue>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, def) in fields {
        path.push(PathSegment::Key(name.clone()));
        match obj.get(name) {
            None => {
                if !def.optional {
                    issues.push(Issue {
                        code: IssueCode::InvalidType,
                        path: path.clone(),
                        message: "Required".into(),
                        expected: Some(def.type_.as_str().into()),
                        received: Some("undefined".into()),
                    });
                }
            }
            Some(v) => {
                if let Some(parsed) = parse_value(def, unknown_keys, v, path, issues) {
                    out.insert(name.clone(), parsed);
                }
            }
        }
        path.pop();
    }

    let unknown: Vec<&String> = obj.keys().filter(|k| !fields.contains_key(*k)).collect();
    match unknown_keys {
        UnknownKeys::Strip => {}
        UnknownKeys::Passthrough => {
            for k in unknown {
                out.insert(k.clone(), obj[k].clone());
            }
        }
        UnknownKeys::Strict => {
            if !unknown.is_empty() {
                issues.push(Issue {
                    code: IssueCode::UnrecognizedKeys,
                    path: path.clone(),
                    message: format!(
                        "Unrecognized key(s) in object: {}",
                        unknown.iter().map(|k| format!("'{}'", k)).collect::<Vec<_>>().join(", ")
                    ),
                    expected: None,
                    received: None,
                });
            }
        }
    }
    out
}

/// Returns the parsed value, or None when an issue was recorded.
fn parse_value(
    def: &FieldDef,
    unknown_keys: UnknownKeys,
    v: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<Issue>,
) -> Option<Value> {
    if v.is_null() {
        if def.nullable || def.type_ == FieldType::Any {
            return Some(Value::Null);
        }
        issues.push(type_issue(path, def.type_, v));
        return None;
    }
    let before = issues.len();
    let parsed = match (def.type_, v) {
        (FieldType::Any, _) => v.clone(),
        (FieldType::String, Value::String(s)) => {
            check_string(def, s, path, issues);
            v.clone()
        }
        (FieldType::Number, Value::Number(n)) => {
            check_number(def, n.as_f64().unwrap_or(f64::NAN), path, issues);
            v.clone()
        }
        (FieldType::Integer, Value::Number(n)) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if f.fract() != 0.0 {
                issues.push(Issue {
                    code: IssueCode::InvalidType,
                    path: path.clone(),
                    message: "Expected integer, received float".into(),
                    expected: Some("integer".into()),
                    received: Some("float".into()),
                });
            } else {
                check_number(def, f, path, issues);
            }
            v.clone()
        }
        (FieldType::Boolean, Value::Bool(_)) => v.clone(),
        (FieldType::Object, Value::Object(obj)) => {
            let empty = std::collections::BTreeMap::new();
            let fields = def.fields.as_ref().unwrap_or(&empty);
            Value::Object(parse_object(fields, unknown_keys, obj, path, issues))
        }
        (FieldType::Array, Value::Array(items)) => {
            check_length(def, items.len(), "array", "element(s)", path, issues);
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                let parsed = match def.items.as_deref() {
                    Some(item_def) => parse_value(item_def, unknown_keys, item, path, issues),
                    None => Some(item.clone()),
                };
                if let Some(p) = parsed {
                    out.push(p);
                }
                path.pop();
            }
            Value::Array(out)
        }
        (expected, other) => {
            issues.push(type_issue(path, expected, other));
            return None;
        }
    };
    if let Some(ref allowed) = def.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            issues.push(Issue {
                code: IssueCode::InvalidEnumValue,
                path: path.clone(),
                message: format!(
                    "Invalid enum value. Expected {}, received {}",
                    allowed.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" | "),
                    v
                ),
                expected: None,
                received: Some(v.to_string()),
            });
        }
    }
    if issues.len() == before {
        Some(parsed)
    } else {
        None
    }
}

fn check_string(def: &FieldDef, s: &str, path: &[PathSegment], issues: &mut Vec<Issue>) {
    check_length(def, s.chars().count(), "string", "character(s)", path, issues);
    if def.pattern.is_some() {
        // An uncompilable pattern (schema never checked) matches nothing.
        let ok = matches!(def.pattern_regex(), Ok(Some(re)) if re.is_match(s));
        if !ok {
            issues.push(string_issue(path, "Invalid"));
        }
    }
    if let Some(ref format) = def.format {
        let format = format.to_lowercase();
        let ok = match format.as_str() {
            "email" => is_email(s),
            "uuid" => uuid::Uuid::parse_str(s).is_ok(),
            "datetime" => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            "url" => is_url(s),
            _ => true,
        };
        if !ok {
            issues.push(string_issue(path, &format!("Invalid {}", format)));
        }
    }
}

fn check_length(
    def: &FieldDef,
    len: usize,
    kind: &str,
    unit: &str,
    path: &[PathSegment],
    issues: &mut Vec<Issue>,
) {
    if let Some(min) = def.min_length {
        if len < min as usize {
            issues.push(Issue {
                code: IssueCode::TooSmall,
                path: path.to_vec(),
                message: format!("{} must contain at least {} {}", capitalize(kind), min, unit),
                expected: None,
                received: None,
            });
        }
    }
    if let Some(max) = def.max_length {
        if len > max as usize {
            issues.push(Issue {
                code: IssueCode::TooBig,
                path: path.to_vec(),
                message: format!("{} must contain at most {} {}", capitalize(kind), max, unit),
                expected: None,
                received: None,
            });
        }
    }
}

fn check_number(def: &FieldDef, n: f64, path: &[PathSegment], issues: &mut Vec<Issue>) {
    if let Some(min) = def.minimum {
        if n < min {
            issues.push(Issue {
                code: IssueCode::TooSmall,
                path: path.to_vec(),
                message: format!("Number must be greater than or equal to {}", min),
                expected: None,
                received: None,
            });
        }
    }
    if let Some(max) = def.maximum {
        if n > max {
            issues.push(Issue {
                code: IssueCode::TooBig,
                path: path.to_vec(),
                message: format!("Number must be less than or equal to {}", max),
                expected: None,
                received: None,
            });
        }
    }
}

fn type_issue(path: &[PathSegment], expected: FieldType, v: &Value) -> Issue {
    let received = json_type_name(v);
    Issue {
        code: IssueCode::InvalidType,
        path: path.to_vec(),
        message: format!("Expected {}, received {}", expected.as_str(), received),
        expected: Some(expected.as_str().into()),
        received: Some(received.into()),
    }
}

fn string_issue(path: &[PathSegment], message: &str) -> Issue {
    Issue {
        code: IssueCode::InvalidString,
        path: path.to_vec(),
        message: message.to_string(),
        expected: None,
        received: None,
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn is_url(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !rest.is_empty()
        }
        None => false,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
