use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::models::Expansion;

/// Comparison operators accepted from query strings (`field[op]=value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "eq" => Some(FilterOp::Eq),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    pub fn to_sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }

    pub fn is_range(self) -> bool {
        !matches!(self, FilterOp::Eq)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

impl FilterWhereInfo {
    pub fn eq(column: impl Into<String>, data: impl Into<Value>) -> Self {
        Self { column: column.into(), operator: FilterOp::Eq, data: data.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

impl FilterOrderInfo {
    /// Parses a single `field` / `-field` sort token.
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('-') {
            Some(column) => Self { column: column.to_string(), sort: SortDirection::Desc },
            None => Self { column: token.to_string(), sort: SortDirection::Asc },
        }
    }
}

/// Field selection. Empty `include` means "everything not excluded".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub fn is_default(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn skip(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }

    pub fn take(&self) -> usize {
        self.limit as usize
    }
}

/// Normalized retrieval request: filter, sort, projection, page window and expansions.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub conditions: Vec<FilterWhereInfo>,
    pub order: Vec<FilterOrderInfo>,
    pub projection: Projection,
    pub window: Option<PageWindow>,
    pub expansions: Vec<Expansion>,
}

impl QueryRequest {
    pub fn matching(conditions: Vec<FilterWhereInfo>) -> Self {
        Self { conditions, ..Default::default() }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
