use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::Schema;
use crate::filter::{FilterError, FilterWhereInfo, QueryRequest};

/// A stored entity: camelCase fields plus `id`, `createdAt` and `updatedAt`.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {}", .errors.join(". "))]
    Validation { errors: Vec<String> },

    #[error("Duplicate {field} value: {value}")]
    DuplicateKey { field: String, value: String },

    #[error("Invalid {path}: {value}")]
    Cast { path: String, value: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Stored document is malformed: {0}")]
    Malformed(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlx(err))
    }
}

/// Persistence for schema-described documents.
///
/// Reads return complete stored documents, hidden fields included; rendering for
/// responses goes through [`Schema::present`]. Every operation honours the schema's
/// default scope, and inserts and updates validate against the schema.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, schema: &Schema, body: Document) -> Result<Document, StoreError>;

    async fn find_by_id(&self, schema: &Schema, id: &str) -> Result<Option<Document>, StoreError>;

    /// Filtered, sorted and windowed find. Projection and expansions are not applied here.
    async fn find(&self, schema: &Schema, request: &QueryRequest) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, schema: &Schema, conditions: &[FilterWhereInfo]) -> Result<u64, StoreError>;

    async fn find_one(
        &self,
        schema: &Schema,
        conditions: &[FilterWhereInfo],
    ) -> Result<Option<Document>, StoreError> {
        let request = QueryRequest {
            window: Some(crate::filter::PageWindow { page: 1, limit: 1 }),
            ..QueryRequest::matching(conditions.to_vec())
        };
        Ok(self.find(schema, &request).await?.into_iter().next())
    }

    /// Partial update; `null` values clear fields. `None` when no document matches.
    async fn update_by_id(
        &self,
        schema: &Schema,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns the removed document, `None` when no document matches.
    async fn delete_by_id(&self, schema: &Schema, id: &str) -> Result<Option<Document>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Parses a path or reference id, reporting a cast failure for malformed ids.
pub fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| StoreError::Cast {
        path: "id".to_string(),
        value: raw.to_string(),
    })
}

/// The `id` of a stored document.
pub fn document_id(doc: &Document) -> Result<&str, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("document has no id".to_string()))
}

/// Values of the constrained fields, `None` when any of them is unset.
pub fn unique_key(doc: &Document, fields: &[&str]) -> Option<Vec<Value>> {
    fields
        .iter()
        .map(|f| doc.get(*f).filter(|v| !v.is_null()).cloned())
        .collect()
}

pub fn duplicate_error(fields: &[&str], values: &[Value]) -> StoreError {
    StoreError::DuplicateKey {
        field: fields.join(", "),
        value: values
            .iter()
            .map(super::models::schema::value_text)
            .collect::<Vec<_>>()
            .join(", "),
    }
}
