use super::error::FilterError;
use super::filter::validate_column;
use super::types::FilterOrderInfo;
use crate::database::models::{FieldKind, Schema};

pub struct FilterOrder;

impl FilterOrder {
    /// Builds the ORDER BY clause. `id` is always appended so paging is stable.
    pub fn generate(schema: &Schema, infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(infos.len() + 1);
        for info in infos {
            validate_column(&info.column)?;
            parts.push(format!("{} {}", Self::sort_expression(schema, &info.column), info.sort.to_sql()));
        }
        parts.push("doc->>'id' ASC".to_string());
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    fn sort_expression(schema: &Schema, column: &str) -> String {
        match schema.field(column).map(|f| f.kind) {
            Some(FieldKind::Number) => format!("(doc->>'{}')::float8", column),
            Some(FieldKind::Boolean) => format!("(doc->>'{}')::boolean", column),
            _ => format!("doc->>'{}'", column),
        }
    }
}
