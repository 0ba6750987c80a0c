use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::schema::value_text;
use super::models::Schema;
use super::store::{document_id, duplicate_error, parse_id, unique_key, Document, DocumentStore, StoreError};
use crate::filter::{FilterOp, FilterOrderInfo, FilterWhereInfo, QueryRequest, SortDirection};

/// In-process store used by tests and by local runs without a database.
///
/// All writes take one lock, which makes uniqueness checks atomic.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn by_id(schema: &Schema, id: &str) -> Result<Vec<FilterWhereInfo>, StoreError> {
        parse_id(id)?;
        schema.scoped_conditions(&[FilterWhereInfo::eq("id", id)])
    }

    fn check_unique(
        schema: &Schema,
        existing: &[Document],
        candidate: &Document,
        skip_id: Option<&str>,
    ) -> Result<(), StoreError> {
        for fields in schema.unique_constraints() {
            let Some(key) = unique_key(candidate, &fields) else { continue };
            let clash = existing
                .iter()
                .filter(|doc| skip_id.map_or(true, |id| doc.get("id").and_then(Value::as_str) != Some(id)))
                .any(|doc| unique_key(doc, &fields).as_ref() == Some(&key));
            if clash {
                return Err(duplicate_error(&fields, &key));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, schema: &Schema, body: Document) -> Result<Document, StoreError> {
        let doc = schema.prepare_insert(body, Utc::now())?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(schema.collection).or_default();
        Self::check_unique(schema, docs, &doc, None)?;
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find_by_id(&self, schema: &Schema, id: &str) -> Result<Option<Document>, StoreError> {
        let conditions = Self::by_id(schema, id)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(schema.collection)
            .and_then(|docs| docs.iter().find(|doc| matches_all(doc, &conditions)))
            .cloned())
    }

    async fn find(&self, schema: &Schema, request: &QueryRequest) -> Result<Vec<Document>, StoreError> {
        let conditions = schema.scoped_conditions(&request.conditions)?;
        let collections = self.collections.read().await;
        let mut found: Vec<Document> = collections
            .get(schema.collection)
            .map(|docs| docs.iter().filter(|doc| matches_all(doc, &conditions)).cloned().collect())
            .unwrap_or_default();
        drop(collections);

        found.sort_by(|a, b| compare_documents(a, b, &request.order));
        Ok(match request.window {
            Some(window) => found.into_iter().skip(window.skip()).take(window.take()).collect(),
            None => found,
        })
    }

    async fn count(&self, schema: &Schema, conditions: &[FilterWhereInfo]) -> Result<u64, StoreError> {
        let conditions = schema.scoped_conditions(conditions)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(schema.collection)
            .map(|docs| docs.iter().filter(|doc| matches_all(doc, &conditions)).count() as u64)
            .unwrap_or(0))
    }

    async fn update_by_id(
        &self,
        schema: &Schema,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let conditions = Self::by_id(schema, id)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(schema.collection).or_default();
        let Some(index) = docs.iter().position(|doc| matches_all(doc, &conditions)) else {
            return Ok(None);
        };

        let updated = schema.prepare_update(&docs[index], patch, Utc::now())?;
        Self::check_unique(schema, docs, &updated, Some(document_id(&updated)?))?;
        docs[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, schema: &Schema, id: &str) -> Result<Option<Document>, StoreError> {
        let conditions = Self::by_id(schema, id)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(schema.collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .position(|doc| matches_all(doc, &conditions))
            .map(|index| docs.remove(index)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn matches_all(doc: &Document, conditions: &[FilterWhereInfo]) -> bool {
    conditions.iter().all(|condition| matches(doc, condition))
}

fn matches(doc: &Document, condition: &FilterWhereInfo) -> bool {
    let value = doc.get(&condition.column).filter(|v| !v.is_null());
    match &condition.data {
        Value::Null => condition.operator == FilterOp::Eq && value.is_none(),
        Value::Array(needles) => match value {
            Some(Value::Array(items)) => needles.iter().all(|needle| items.contains(needle)),
            _ => false,
        },
        Value::Object(_) => value == Some(&condition.data),
        data => match value.and_then(|v| compare_values(v, data)) {
            Some(ordering) => holds(condition.operator, ordering),
            None => false,
        },
    }
}

fn holds(operator: FilterOp, ordering: Ordering) -> bool {
    match operator {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        // Text comparison, as `doc->>'field'` does
        (other, Value::String(b)) if !other.is_array() && !other.is_object() => Some(value_text(other).cmp(b)),
        _ => None,
    }
}

/// Missing values sort last ascending and first descending, then ties break on id.
fn compare_documents(a: &Document, b: &Document, order: &[FilterOrderInfo]) -> Ordering {
    for info in order {
        let left = a.get(&info.column).filter(|v| !v.is_null());
        let right = b.get(&info.column).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
        };
        let ordering = match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let id = |doc: &Document| doc.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    id(a).cmp(&id(b))
}
