//! The post schema: a single required title.

use resource_sdk::{FieldDef, Schema};

pub fn post_schema() -> Schema {
    Schema::new().field("title", FieldDef::string())
}
