//! Document store contract consumed by the sync and purge jobs.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::Record;

/// A field-equality query over one collection.
///
/// Pages drawn from a handle are always ordered by document identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHandle {
    pub collection: String,
    pub field: String,
    pub value: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every record in `collection`.
    async fn get_all(&self, collection: &str) -> Result<Vec<Record>, AppError>;

    /// Build a query for records in `collection` whose `field` equals `value`.
    fn query(&self, collection: &str, field: &str, value: &str) -> QueryHandle {
        QueryHandle {
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Up to `limit` matching records with identifiers strictly after `cursor`.
    async fn page(
        &self,
        query: &QueryHandle,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, AppError>;

    /// Delete all `ids` from `collection` in one atomic commit.
    ///
    /// Identifiers that no longer exist are ignored.
    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<(), AppError>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError>;

    /// Overwrite (or create) a single document.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError>;
}
