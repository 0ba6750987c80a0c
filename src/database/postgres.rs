use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};

use super::manager::DatabaseManager;
use super::models::Schema;
use super::store::{document_id, duplicate_error, parse_id, unique_key, Document, DocumentStore, StoreError};
use crate::filter::{Filter, FilterWhereInfo, QueryRequest};

const UNIQUE_VIOLATION: &str = "23505";

/// Document store over a single JSONB `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Re-expresses a request with the schema scope applied and values cast.
    fn scoped(schema: &Schema, request: &QueryRequest) -> Result<QueryRequest, StoreError> {
        Ok(QueryRequest {
            conditions: schema.scoped_conditions(&request.conditions)?,
            ..request.clone()
        })
    }

    fn by_id(schema: &Schema, id: &str) -> Result<QueryRequest, StoreError> {
        parse_id(id)?;
        Self::scoped(schema, &QueryRequest::matching(vec![FilterWhereInfo::eq("id", id)]))
    }

    /// Unique index violations become duplicate-key errors naming the constrained fields.
    fn map_write_error(schema: &Schema, doc: &Document, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint();
                for fields in schema.unique_constraints() {
                    let named = constraint.map_or(true, |c| c == schema.index_name(&fields));
                    if let (true, Some(values)) = (named, unique_key(doc, &fields)) {
                        return duplicate_error(&fields, &values);
                    }
                }
            }
        }
        err.into()
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::Number(n) => query.bind(n.as_f64()),
            Value::Bool(b) => query.bind(*b),
            Value::String(s) => query.bind(s.clone()),
            Value::Null => query.bind(Option::<String>::None),
            other => query.bind(Json(other.clone())),
        };
    }
    query
}

fn row_to_document(row: PgRow) -> Result<Document, StoreError> {
    let Json(value): Json<Value> = row.try_get("doc")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!("expected object, found {}", other))),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, schema: &Schema, body: Document) -> Result<Document, StoreError> {
        let doc = schema.prepare_insert(body, Utc::now())?;
        let id = parse_id(document_id(&doc)?)?;

        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(schema.collection)
            .bind(id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await
            .map_err(|err| Self::map_write_error(schema, &doc, err))?;
        Ok(doc)
    }

    async fn find_by_id(&self, schema: &Schema, id: &str) -> Result<Option<Document>, StoreError> {
        let request = Self::by_id(schema, id)?;
        let sql = Filter::new(schema, &request)?.to_sql()?;
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_document).transpose()
    }

    async fn find(&self, schema: &Schema, request: &QueryRequest) -> Result<Vec<Document>, StoreError> {
        let request = Self::scoped(schema, request)?;
        let sql = Filter::new(schema, &request)?.to_sql()?;
        tracing::debug!("find {}: {}", schema.collection, sql.query);
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_document).collect()
    }

    async fn count(&self, schema: &Schema, conditions: &[FilterWhereInfo]) -> Result<u64, StoreError> {
        let request = Self::scoped(schema, &QueryRequest::matching(conditions.to_vec()))?;
        let sql = Filter::new(schema, &request)?.to_count_sql()?;
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn update_by_id(
        &self,
        schema: &Schema,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let request = Self::by_id(schema, id)?;
        let sql = Filter::new(schema, &request)?.to_sql()?;
        let locking = format!("{} FOR UPDATE", sql.query);

        let mut tx = self.pool.begin().await?;
        let Some(row) = bind_params(sqlx::query(&locking), &sql.params)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let existing = row_to_document(row)?;
        let updated = schema.prepare_update(&existing, patch, Utc::now())?;

        sqlx::query("UPDATE documents SET doc = $3 WHERE collection = $1 AND id = $2")
            .bind(schema.collection)
            .bind(parse_id(id)?)
            .bind(Json(&updated))
            .execute(&mut *tx)
            .await
            .map_err(|err| Self::map_write_error(schema, &updated, err))?;
        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, schema: &Schema, id: &str) -> Result<Option<Document>, StoreError> {
        let request = Self::by_id(schema, id)?;
        let sql = Filter::new(schema, &request)?.to_where_sql()?;
        let statement = format!("DELETE FROM documents WHERE {} RETURNING doc", sql.query);
        let row = bind_params(sqlx::query(&statement), &sql.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_document).transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        DatabaseManager::health_check(&self.pool).await?;
        Ok(())
    }
}
