//! Per-resource state shared by the five document handlers.

use crate::schema::Schema;
use crate::store::Collection;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResourceState {
    pub collection: Collection,
    pub schema: Arc<Schema>,
}
