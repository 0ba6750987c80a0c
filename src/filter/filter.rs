use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{PageWindow, QueryRequest, SqlResult};
use crate::database::models::Schema;

/// Renders a [`QueryRequest`] as SQL over the shared `documents` table.
///
/// `$1` is always the collection name; condition parameters follow.
pub struct Filter<'a> {
    schema: &'a Schema,
    request: &'a QueryRequest,
}

impl<'a> Filter<'a> {
    pub fn new(schema: &'a Schema, request: &'a QueryRequest) -> Result<Self, FilterError> {
        for condition in &request.conditions {
            validate_column(&condition.column)?;
        }
        for order in &request.order {
            validate_column(&order.column)?;
        }
        Ok(Self { schema, request })
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(self.schema, &self.request.order)?;
        let limit_clause = build_limit_clause(self.request.window);

        let query = [
            "SELECT doc FROM documents".to_string(),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let mut params = vec![Value::String(self.schema.collection.to_string())];
        let mut clauses = vec!["collection = $1".to_string()];
        let (conditions, condition_params) = FilterWhere::generate(&self.request.conditions, params.len())?;
        clauses.extend(conditions);
        params.extend(condition_params);
        Ok(SqlResult { query: clauses.join(" AND "), params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        Ok(SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM documents WHERE {}", where_result.query),
            params: where_result.params,
        })
    }
}

/// Field names flow into SQL text as JSON keys, so only identifier characters are allowed.
pub fn validate_column(column: &str) -> Result<(), FilterError> {
    let mut chars = column.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidColumn(column.to_string()));
    }
    Ok(())
}

fn build_limit_clause(window: Option<PageWindow>) -> String {
    match window {
        Some(w) => format!("LIMIT {} OFFSET {}", w.take(), w.skip()),
        None => String::new(),
    }
}
