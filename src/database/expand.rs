use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::models::Expansion;
use super::store::{Document, DocumentStore, StoreError};
use crate::filter::{FilterWhereInfo, Projection, QueryRequest};

/// Resolves expansions in place, in order, across a batch of documents.
pub fn resolve_all<'a>(
    store: &'a dyn DocumentStore,
    docs: &'a mut [Document],
    expansions: &'a [Expansion],
) -> BoxFuture<'a, Result<(), StoreError>> {
    async move {
        for expansion in expansions {
            match expansion {
                Expansion::Reference { field, target, select } => {
                    resolve_reference(store, docs, field, target, select).await?
                }
                Expansion::Virtual { field, target, foreign_field, nested } => {
                    for doc in docs.iter_mut() {
                        let Some(id) = doc.get("id").and_then(Value::as_str).map(str::to_string) else {
                            continue;
                        };
                        let request = QueryRequest {
                            order: target.default_sort.clone(),
                            ..QueryRequest::matching(vec![FilterWhereInfo::eq(*foreign_field, id)])
                        };
                        let children = store.find(target, &request).await?;
                        let mut children: Vec<Document> = children
                            .into_iter()
                            .map(|child| target.present(child, &Projection::default()))
                            .collect();
                        resolve_all(store, &mut children, nested).await?;
                        doc.insert(field.to_string(), Value::Array(children.into_iter().map(Value::Object).collect()));
                    }
                }
            }
        }
        Ok(())
    }
    .boxed()
}

async fn resolve_reference(
    store: &dyn DocumentStore,
    docs: &mut [Document],
    field: &str,
    target: &super::models::Schema,
    select: &[&str],
) -> Result<(), StoreError> {
    let ids: BTreeSet<String> = docs
        .iter()
        .filter_map(|doc| doc.get(field))
        .flat_map(referenced_ids)
        .collect();
    if ids.is_empty() {
        return Ok(());
    }

    let projection = Projection {
        include: select.iter().map(|s| s.to_string()).collect(),
        exclude: Vec::new(),
    };
    let found = try_join_all(ids.iter().map(|id| store.find_by_id(target, id))).await?;
    let resolved: HashMap<String, Value> = ids
        .into_iter()
        .zip(found)
        .filter_map(|(id, doc)| doc.map(|d| (id, Value::Object(target.present(d, &projection)))))
        .collect();

    for doc in docs.iter_mut() {
        let Some(value) = doc.get_mut(field) else { continue };
        let expanded = match &*value {
            // A dangling reference renders as null
            Value::String(id) => resolved.get(id.as_str()).cloned().unwrap_or(Value::Null),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| item.as_str().and_then(|id| resolved.get(id)).cloned())
                    .collect(),
            ),
            other => other.clone(),
        };
        *value = expanded;
    }
    Ok(())
}

fn referenced_ids(value: &Value) -> Vec<String> {
    match value {
        Value::String(id) => vec![id.clone()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}
