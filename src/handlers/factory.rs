use std::collections::HashMap;

use axum::{
    extract::{Path, RawQuery, State},
    routing::{delete, get, patch, post, MethodRouter},
};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use super::{query_pairs, JsonBody};
use crate::database::expand::resolve_all;
use crate::database::models::{Expansion, Schema};
use crate::database::{Document, DocumentStore, StoreError};
use crate::error::ApiError;
use crate::filter::{FilterWhereInfo, Projection, QueryFeatures};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

/// Runs after a document was created, updated or deleted. Updates also pass the document
/// as it was before the write.
pub type ChangeHook = for<'a> fn(
    &'a dyn DocumentStore,
    Option<&'a Document>,
    &'a Document,
) -> BoxFuture<'a, Result<(), StoreError>>;

/// Path parameter that scopes a nested collection, e.g. `/tours/:id/reviews` → `tour`.
#[derive(Debug, Clone, Copy)]
pub struct ParentScope {
    pub param: &'static str,
    pub field: &'static str,
}

/// Descriptor the generic handlers are built from.
#[derive(Clone)]
pub struct Resource {
    pub schema: &'static Schema,
    pub read_one: fn() -> Vec<Expansion>,
    pub read_many: fn() -> Vec<Expansion>,
    pub parent: Option<ParentScope>,
    /// Filled with the current user's id on create when the body leaves it out.
    pub owner_field: Option<&'static str>,
    pub on_change: Option<ChangeHook>,
}

fn no_expansions() -> Vec<Expansion> {
    Vec::new()
}

impl Resource {
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            read_one: no_expansions,
            read_many: no_expansions,
            parent: None,
            owner_field: None,
            on_change: None,
        }
    }

    pub fn expand_one(mut self, expansions: fn() -> Vec<Expansion>) -> Self {
        self.read_one = expansions;
        self
    }

    pub fn expand_many(mut self, expansions: fn() -> Vec<Expansion>) -> Self {
        self.read_many = expansions;
        self
    }

    pub fn nested(mut self, param: &'static str, field: &'static str) -> Self {
        self.parent = Some(ParentScope { param, field });
        self
    }

    pub fn owned_by(mut self, field: &'static str) -> Self {
        self.owner_field = Some(field);
        self
    }

    pub fn on_change(mut self, hook: ChangeHook) -> Self {
        self.on_change = Some(hook);
        self
    }

    fn parent_id<'p>(&self, params: &'p HashMap<String, String>) -> Option<(&'static str, &'p str)> {
        let parent = self.parent?;
        params.get(parent.param).map(|id| (parent.field, id.as_str()))
    }

    async fn changed(
        &self,
        state: &AppState,
        previous: Option<&Document>,
        doc: &Document,
    ) -> Result<(), ApiError> {
        if let Some(hook) = self.on_change {
            hook(state.store.as_ref(), previous, doc).await?;
        }
        Ok(())
    }

    pub async fn list(
        &self,
        state: &AppState,
        params: &HashMap<String, String>,
        raw_query: Option<&str>,
    ) -> ApiResult {
        let scope = match self.parent_id(params) {
            Some((field, id)) => vec![FilterWhereInfo::eq(field, id)],
            None => Vec::new(),
        };

        let docs = QueryFeatures::new(query_pairs(raw_query))
            .scope(scope)
            .filter()?
            .sort(&self.schema.default_sort)?
            .limit_fields()?
            .paginate(&state.config.query)?
            .expand(&(self.read_many)())
            .execute(state.store.as_ref(), self.schema)
            .await?;

        debug!("Listed {} {}", docs.len(), self.schema.collection);
        Ok(ApiResponse::documents(docs))
    }

    /// Loads one rendered document with its read-one expansions resolved.
    pub async fn read(&self, state: &AppState, id: &str) -> Result<Document, ApiError> {
        let doc = state
            .store
            .find_by_id(self.schema, id)
            .await?
            .ok_or_else(ApiError::no_document)?;

        let mut docs = vec![self.schema.present(doc, &Projection::default())];
        resolve_all(state.store.as_ref(), &mut docs, &(self.read_one)()).await?;
        docs.pop().ok_or_else(ApiError::no_document)
    }

    pub async fn create(
        &self,
        state: &AppState,
        params: &HashMap<String, String>,
        user: Option<&CurrentUser>,
        mut body: Document,
    ) -> ApiResult {
        self.schema.reject_guarded(&body)?;

        if let Some((field, id)) = self.parent_id(params) {
            fill_missing(&mut body, field, id);
        }
        if let (Some(field), Some(user)) = (self.owner_field, user) {
            fill_missing(&mut body, field, &user.id);
        }

        let doc = state.store.insert(self.schema, body).await?;
        self.changed(state, None, &doc).await?;
        Ok(ApiResponse::document(self.schema.present(doc, &Projection::default())).created())
    }

    pub async fn update(&self, state: &AppState, id: &str, body: Document) -> ApiResult {
        self.schema.reject_guarded(&body)?;

        let previous = match self.on_change {
            Some(_) => state.store.find_by_id(self.schema, id).await?,
            None => None,
        };
        let doc = state
            .store
            .update_by_id(self.schema, id, body)
            .await?
            .ok_or_else(ApiError::no_document)?;
        self.changed(state, previous.as_ref(), &doc).await?;
        Ok(ApiResponse::document(self.schema.present(doc, &Projection::default())))
    }

    pub async fn remove(&self, state: &AppState, id: &str) -> ApiResult {
        let doc = state
            .store
            .delete_by_id(self.schema, id)
            .await?
            .ok_or_else(ApiError::no_document)?;
        self.changed(state, None, &doc).await?;
        Ok(ApiResponse::no_content())
    }
}

fn fill_missing(body: &mut Document, field: &str, value: &str) {
    let missing = body.get(field).map_or(true, Value::is_null);
    if missing {
        body.insert(field.to_string(), Value::String(value.to_string()));
    }
}

pub fn get_all(resource: Resource) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>,
              params: Option<Path<HashMap<String, String>>>,
              RawQuery(query): RawQuery| async move {
            let params = params.map(|Path(p)| p).unwrap_or_default();
            resource.list(&state, &params, query.as_deref()).await
        },
    )
}

pub fn get_one(resource: Resource) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>, Path(id): Path<String>| async move {
        let doc = resource.read(&state, &id).await?;
        Ok::<_, ApiError>(ApiResponse::document(doc))
    })
}

pub fn create_one(resource: Resource) -> MethodRouter<AppState> {
    post(
        move |State(state): State<AppState>,
              params: Option<Path<HashMap<String, String>>>,
              user: Option<CurrentUser>,
              JsonBody(body): JsonBody| async move {
            let params = params.map(|Path(p)| p).unwrap_or_default();
            resource.create(&state, &params, user.as_ref(), body).await
        },
    )
}

pub fn update_one(resource: Resource) -> MethodRouter<AppState> {
    patch(
        move |State(state): State<AppState>, Path(id): Path<String>, JsonBody(body): JsonBody| async move {
            resource.update(&state, &id, body).await
        },
    )
}

pub fn delete_one(resource: Resource) -> MethodRouter<AppState> {
    delete(move |State(state): State<AppState>, Path(id): Path<String>| async move {
        resource.remove(&state, &id).await
    })
}
