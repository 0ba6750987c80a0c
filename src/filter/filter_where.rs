use serde_json::Value;

use super::error::FilterError;
use super::filter::validate_column;
use super::types::{FilterOp, FilterWhereInfo};

/// Renders typed conditions as JSONB predicates.
///
/// Conditions are expected to be cast already (see `Schema::cast_conditions`); the JSON type
/// of each value picks the SQL cast applied to the document field.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        conditions: &[FilterWhereInfo],
        starting_param_index: usize,
    ) -> Result<(Vec<String>, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut clauses = Vec::with_capacity(conditions.len());
        for condition in conditions {
            clauses.push(filter_where.build_sql_condition(condition)?);
        }
        Ok((clauses, filter_where.param_values))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        validate_column(&condition.column)?;
        let column = &condition.column;
        let op = condition.operator.to_sql();

        let sql = match &condition.data {
            Value::Null => match condition.operator {
                FilterOp::Eq => format!("(doc->'{}' IS NULL OR doc->'{}' = 'null'::jsonb)", column, column),
                other => return Err(FilterError::UnsupportedOperator(format!("{:?} null", other))),
            },
            Value::Number(_) => {
                let param = self.push(condition.data.clone());
                format!("(doc->>'{}')::float8 {} {}", column, op, param)
            }
            Value::Bool(_) => {
                if condition.operator.is_range() {
                    return Err(FilterError::UnsupportedOperator(format!("{:?} boolean", condition.operator)));
                }
                let param = self.push(condition.data.clone());
                format!("(doc->>'{}')::boolean = {}", column, param)
            }
            Value::String(_) => {
                let param = self.push(condition.data.clone());
                format!("doc->>'{}' {} {}", column, op, param)
            }
            // Array fields match when they contain the value (e.g. guides = <id>)
            Value::Array(_) | Value::Object(_) => {
                let param = self.push(condition.data.clone());
                format!("doc->'{}' @> {}", column, param)
            }
        };
        Ok(sql)
    }

    fn push(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
