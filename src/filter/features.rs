use serde_json::Value;

use super::error::FilterError;
use super::filter::validate_column;
use super::types::{FilterOp, FilterOrderInfo, FilterWhereInfo, PageWindow, Projection, QueryRequest};
use crate::config::QueryConfig;
use crate::database::models::{Expansion, Schema};
use crate::database::{Document, DocumentStore, StoreError};

/// Query-string keys that drive sorting, projection and pagination and never filter.
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Builds a [`QueryRequest`] from raw query-string pairs.
///
/// Each step is independent; call them in any order, the page window is always
/// applied last by the store.
///
/// ```ignore
/// let request = QueryFeatures::new(pairs)
///     .scope(vec![FilterWhereInfo::eq("tour", tour_id)])
///     .filter()?
///     .sort(&schema.default_sort)?
///     .limit_fields()?
///     .paginate(&config.query)?
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    raw: Vec<(String, String)>,
    request: QueryRequest,
}

impl QueryFeatures {
    pub fn new(raw: Vec<(String, String)>) -> Self {
        Self { raw, request: QueryRequest::default() }
    }

    /// Ambient conditions (e.g. a parent entity) merged with the query-string filter.
    pub fn scope(mut self, conditions: Vec<FilterWhereInfo>) -> Self {
        self.request.conditions.extend(conditions);
        self
    }

    pub fn filter(mut self) -> Result<Self, FilterError> {
        for (key, value) in &self.raw {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let (column, operator) = parse_filter_key(key)?;
            self.request.conditions.push(FilterWhereInfo {
                column,
                operator,
                data: Value::String(value.clone()),
            });
        }
        Ok(self)
    }

    pub fn sort(mut self, default: &[FilterOrderInfo]) -> Result<Self, FilterError> {
        let order = match self.last("sort") {
            Some(raw) => parse_list(raw)
                .map(|token| {
                    let info = FilterOrderInfo::parse(token);
                    validate_column(&info.column).map(|_| info)
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        self.request.order = if order.is_empty() { default.to_vec() } else { order };
        Ok(self)
    }

    pub fn limit_fields(mut self) -> Result<Self, FilterError> {
        let mut projection = Projection::default();
        if let Some(raw) = self.last("fields") {
            for token in parse_list(raw) {
                match token.strip_prefix('-') {
                    Some(field) => {
                        validate_column(field)?;
                        projection.exclude.push(field.to_string());
                    }
                    None => {
                        validate_column(token)?;
                        projection.include.push(token.to_string());
                    }
                }
            }
        }
        self.request.projection = projection;
        Ok(self)
    }

    pub fn paginate(mut self, config: &QueryConfig) -> Result<Self, FilterError> {
        let page = match self.last("page") {
            Some(raw) => parse_positive(raw).ok_or_else(|| FilterError::InvalidPage(raw.to_string()))?,
            None => 1,
        };
        let limit = match self.last("limit") {
            Some(raw) => parse_positive(raw).ok_or_else(|| FilterError::InvalidLimit(raw.to_string()))?,
            None => config.default_limit,
        };
        // skip is always (page - 1) * limit; no silent capping
        if let Some(max) = config.max_limit.filter(|max| limit > *max) {
            return Err(FilterError::LimitTooLarge { limit, max });
        }
        self.request.window = Some(PageWindow { page, limit });
        Ok(self)
    }

    pub fn expand(mut self, expansions: &[Expansion]) -> Self {
        self.request.expansions = expansions.to_vec();
        self
    }

    pub fn build(self) -> QueryRequest {
        self.request
    }

    /// Runs the request, renders each document through the schema projection and resolves
    /// expansions on the results.
    pub async fn execute(
        self,
        store: &dyn DocumentStore,
        schema: &Schema,
    ) -> Result<Vec<Document>, StoreError> {
        let request = self.build();
        schema.check_queryable(&request)?;
        let mut docs: Vec<Document> = store
            .find(schema, &request)
            .await?
            .into_iter()
            .map(|doc| schema.present(doc, &request.projection))
            .collect();
        crate::database::expand::resolve_all(store, &mut docs, &request.expansions).await?;
        Ok(docs)
    }

    fn last(&self, key: &str) -> Option<&str> {
        self.raw.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Splits `price[gte]` into (`price`, Gte); bare keys are equality filters.
pub fn parse_filter_key(key: &str) -> Result<(String, FilterOp), FilterError> {
    let (column, operator) = match key.split_once('[') {
        Some((column, rest)) => {
            let suffix = rest
                .strip_suffix(']')
                .ok_or_else(|| FilterError::InvalidColumn(key.to_string()))?;
            let operator = FilterOp::from_suffix(suffix)
                .ok_or_else(|| FilterError::UnsupportedOperator(suffix.to_string()))?;
            (column, operator)
        }
        None => (key, FilterOp::Eq),
    };
    validate_column(column)?;
    Ok((column.to_string(), operator))
}

fn parse_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortDirection;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn config() -> QueryConfig {
        QueryConfig { default_limit: 100, max_limit: Some(1000) }
    }

    #[test]
    fn reserved_keys_never_become_filters() {
        let request = QueryFeatures::new(pairs(&[
            ("page", "2"),
            ("sort", "-price"),
            ("limit", "5"),
            ("fields", "name,price"),
            ("difficulty", "easy"),
        ]))
        .filter()
        .unwrap()
        .build();

        assert_eq!(request.conditions, vec![FilterWhereInfo::eq("difficulty", "easy")]);
    }

    #[test]
    fn operator_suffixes_map_to_comparisons() {
        let request = QueryFeatures::new(pairs(&[("price[gte]", "500"), ("duration[lt]", "10")]))
            .filter()
            .unwrap()
            .build();

        assert_eq!(request.conditions[0].column, "price");
        assert_eq!(request.conditions[0].operator, FilterOp::Gte);
        assert_eq!(request.conditions[0].data, Value::String("500".into()));
        assert_eq!(request.conditions[1].operator, FilterOp::Lt);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = QueryFeatures::new(pairs(&[("price[regex]", ".*")])).filter().unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperator(op) if op == "regex"));
    }

    #[test]
    fn scope_is_merged_with_query_filter() {
        let request = QueryFeatures::new(pairs(&[("rating", "5")]))
            .scope(vec![FilterWhereInfo::eq("tour", "abc")])
            .filter()
            .unwrap()
            .build();
        assert_eq!(request.conditions.len(), 2);
        assert_eq!(request.conditions[0].column, "tour");
    }

    #[test]
    fn sort_parses_directions_and_falls_back_to_default() {
        let default = vec![FilterOrderInfo::parse("-createdAt")];

        let request = QueryFeatures::new(pairs(&[("sort", "-rating,price")]))
            .sort(&default)
            .unwrap()
            .build();
        assert_eq!(request.order[0].column, "rating");
        assert_eq!(request.order[0].sort, SortDirection::Desc);
        assert_eq!(request.order[1].sort, SortDirection::Asc);

        let request = QueryFeatures::new(vec![]).sort(&default).unwrap().build();
        assert_eq!(request.order, default);
    }

    #[test]
    fn fields_split_into_include_and_exclude() {
        let request = QueryFeatures::new(pairs(&[("fields", "name, price,-summary")]))
            .limit_fields()
            .unwrap()
            .build();
        assert_eq!(request.projection.include, vec!["name", "price"]);
        assert_eq!(request.projection.exclude, vec!["summary"]);
    }

    #[test]
    fn pagination_defaults_and_window() {
        let request = QueryFeatures::new(vec![]).paginate(&config()).unwrap().build();
        let window = request.window.unwrap();
        assert_eq!((window.page, window.limit), (1, 100));
        assert_eq!(window.skip(), 0);

        let request = QueryFeatures::new(pairs(&[("page", "3"), ("limit", "10")]))
            .paginate(&config())
            .unwrap()
            .build();
        let window = request.window.unwrap();
        assert_eq!(window.skip(), 20);
        assert_eq!(window.take(), 10);
    }

    #[test]
    fn pagination_rejects_non_positive_values() {
        assert!(matches!(
            QueryFeatures::new(pairs(&[("page", "0")])).paginate(&config()),
            Err(FilterError::InvalidPage(_))
        ));
        assert!(matches!(
            QueryFeatures::new(pairs(&[("limit", "ten")])).paginate(&config()),
            Err(FilterError::InvalidLimit(_))
        ));
    }

    #[test]
    fn limit_above_configured_max_is_rejected() {
        let err = QueryFeatures::new(pairs(&[("page", "2"), ("limit", "2000")]))
            .paginate(&config())
            .unwrap_err();
        assert!(matches!(err, FilterError::LimitTooLarge { limit: 2000, max: 1000 }));

        let request = QueryFeatures::new(pairs(&[("page", "2"), ("limit", "1000")]))
            .paginate(&config())
            .unwrap()
            .build();
        let window = request.window.unwrap();
        assert_eq!((window.skip(), window.take()), (1000, 1000));
    }

    #[test]
    fn rejects_injection_in_field_names() {
        assert!(QueryFeatures::new(pairs(&[("name'; DROP", "x")])).filter().is_err());
        assert!(QueryFeatures::new(pairs(&[("sort", "price desc")])).sort(&[]).is_err());
    }
}
