//! HTTP handlers for resource documents.

pub mod document;
pub use document::*;
