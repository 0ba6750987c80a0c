use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::database::store::{Document, StoreError};
use crate::filter::{FilterError, FilterOrderInfo, FilterWhereInfo, Projection, QueryRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    Text,
    Number,
    Boolean,
    Date,
    Reference,
    ReferenceList,
    TextList,
    Json,
}

/// A document-level rule over the whole candidate document. Returns the failure message.
pub type DocumentCheck = fn(&Document) -> Option<String>;

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: Option<&'static str>,
    pub unique: bool,
    /// Never rendered in responses and never queryable from a query string.
    pub hidden: bool,
    /// Only writable by dedicated handlers, never by the generic update.
    pub guarded: bool,
    pub immutable: bool,
    pub trim: bool,
    pub lowercase: bool,
    pub default: Option<Value>,
    pub allowed: Option<(&'static [&'static str], &'static str)>,
    pub min: Option<(f64, &'static str)>,
    pub max: Option<(f64, &'static str)>,
    pub min_length: Option<(usize, &'static str)>,
    pub max_length: Option<(usize, &'static str)>,
}

impl Field {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: None,
            unique: false,
            hidden: false,
            guarded: false,
            immutable: false,
            trim: false,
            lowercase: false,
            default: None,
            allowed: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }
    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }
    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }
    pub fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }
    pub fn reference(name: &'static str) -> Self {
        Self::new(name, FieldKind::Reference)
    }
    pub fn references(name: &'static str) -> Self {
        Self::new(name, FieldKind::ReferenceList)
    }
    pub fn text_list(name: &'static str) -> Self {
        Self::new(name, FieldKind::TextList)
    }
    pub fn json(name: &'static str) -> Self {
        Self::new(name, FieldKind::Json)
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
    pub fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
    pub fn one_of(mut self, values: &'static [&'static str], message: &'static str) -> Self {
        self.allowed = Some((values, message));
        self
    }
    pub fn min(mut self, bound: f64, message: &'static str) -> Self {
        self.min = Some((bound, message));
        self
    }
    pub fn max(mut self, bound: f64, message: &'static str) -> Self {
        self.max = Some((bound, message));
        self
    }
    pub fn min_length(mut self, len: usize, message: &'static str) -> Self {
        self.min_length = Some((len, message));
        self
    }
    pub fn max_length(mut self, len: usize, message: &'static str) -> Self {
        self.max_length = Some((len, message));
        self
    }

    fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    fn issues(&self, value: Option<&Value>, out: &mut Vec<String>) {
        let present = match value {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if !present {
            if let Some(message) = self.required {
                out.push(message.to_string());
            }
            return;
        }

        match value {
            Some(Value::String(s)) => {
                if let Some((values, message)) = self.allowed {
                    if !values.contains(&s.as_str()) {
                        out.push(message.to_string());
                    }
                }
                let len = s.chars().count();
                if let Some((min, message)) = self.min_length {
                    if len < min {
                        out.push(message.to_string());
                    }
                }
                if let Some((max, message)) = self.max_length {
                    if len > max {
                        out.push(message.to_string());
                    }
                }
            }
            Some(Value::Number(n)) => {
                let n = n.as_f64().unwrap_or_default();
                if let Some((min, message)) = self.min {
                    if n < min {
                        out.push(message.to_string());
                    }
                }
                if let Some((max, message)) = self.max {
                    if n > max {
                        out.push(message.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    /// Casts an incoming value to the field's storage representation.
    fn cast(&self, value: Value) -> Result<Value, StoreError> {
        let cast_error = |value: &Value| StoreError::Cast {
            path: self.name.to_string(),
            value: value_text(value),
        };

        match self.kind {
            FieldKind::Id | FieldKind::Reference => match &value {
                Value::String(s) if Uuid::parse_str(s).is_ok() => Ok(value),
                _ => Err(cast_error(&value)),
            },
            FieldKind::Text => {
                let mut text = match &value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(cast_error(&value)),
                };
                if self.trim {
                    text = text.trim().to_string();
                }
                if self.lowercase {
                    text = text.to_lowercase();
                }
                Ok(Value::String(text))
            }
            FieldKind::Number => match &value {
                Value::Number(_) => Ok(value),
                Value::String(s) => parse_number(s).ok_or_else(|| cast_error(&value)),
                _ => Err(cast_error(&value)),
            },
            FieldKind::Boolean => match &value {
                Value::Bool(_) => Ok(value),
                Value::String(s) => parse_bool(s).ok_or_else(|| cast_error(&value)),
                _ => Err(cast_error(&value)),
            },
            FieldKind::Date => match &value {
                Value::String(s) => parse_date(s).map(|d| Value::String(timestamp(d))).ok_or_else(|| cast_error(&value)),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(|d| Value::String(timestamp(d)))
                    .ok_or_else(|| cast_error(&value)),
                _ => Err(cast_error(&value)),
            },
            FieldKind::ReferenceList => match value {
                Value::String(_) => Ok(Value::Array(vec![self.cast_item(value)?])),
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| self.cast_item(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Err(cast_error(&other)),
            },
            FieldKind::TextList => match value {
                Value::Array(items) if items.iter().all(Value::is_string) => Ok(Value::Array(items)),
                Value::String(_) => Ok(Value::Array(vec![value])),
                other => Err(cast_error(&other)),
            },
            FieldKind::Json => Ok(value),
        }
    }

    fn cast_item(&self, item: Value) -> Result<Value, StoreError> {
        match &item {
            Value::String(s) if Uuid::parse_str(s).is_ok() => Ok(item),
            _ => Err(StoreError::Cast {
                path: self.name.to_string(),
                value: value_text(&item),
            }),
        }
    }
}

/// Expansion of a stored reference into the referenced document(s).
#[derive(Debug, Clone)]
pub enum Expansion {
    /// Replaces an id (or list of ids) held in `field`.
    Reference {
        field: &'static str,
        target: &'static Lazy<Schema>,
        select: &'static [&'static str],
    },
    /// Adds `field` holding every `target` document whose `foreign_field` equals this id.
    Virtual {
        field: &'static str,
        target: &'static Lazy<Schema>,
        foreign_field: &'static str,
        nested: Vec<Expansion>,
    },
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub collection: &'static str,
    pub fields: Vec<Field>,
    pub default_sort: Vec<FilterOrderInfo>,
    /// Conditions implicitly applied to every read, update and delete.
    pub default_scope: Vec<FilterWhereInfo>,
    pub unique_together: Vec<&'static [&'static str]>,
    pub checks: Vec<DocumentCheck>,
}

impl Schema {
    pub fn new(collection: &'static str) -> Self {
        Self {
            collection,
            fields: vec![
                Field::new("id", FieldKind::Id).immutable(),
                Field::date("createdAt").immutable(),
                Field::date("updatedAt").immutable(),
            ],
            default_sort: vec![FilterOrderInfo::parse("-createdAt")],
            default_scope: Vec::new(),
            unique_together: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn sorted_by(mut self, raw: &str) -> Self {
        self.default_sort = raw.split(',').map(|token| FilterOrderInfo::parse(token.trim())).collect();
        self
    }

    pub fn scoped(mut self, condition: FilterWhereInfo) -> Self {
        self.default_scope.push(condition);
        self
    }

    pub fn unique_together(mut self, fields: &'static [&'static str]) -> Self {
        self.unique_together.push(fields);
        self
    }

    pub fn check(mut self, check: DocumentCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.field(name).map(|f| f.hidden).unwrap_or(false)
    }

    /// Every uniqueness constraint: single unique fields first, then compound groups.
    pub fn unique_constraints(&self) -> Vec<Vec<&'static str>> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| vec![f.name])
            .chain(self.unique_together.iter().map(|group| group.to_vec()))
            .collect()
    }

    /// Name of the backing unique index for a constraint.
    pub fn index_name(&self, fields: &[&str]) -> String {
        format!("documents_{}_{}_key", self.collection, fields.join("_")).to_lowercase()
    }

    /// Casts, defaults and validates a new document, then stamps id and timestamps.
    pub fn prepare_insert(&self, body: Document, now: DateTime<Utc>) -> Result<Document, StoreError> {
        let mut doc = Document::new();
        for (key, value) in self.cast_body(body, true)? {
            if !value.is_null() {
                doc.insert(key, value);
            }
        }
        for field in &self.fields {
            if let Some(default) = &field.default {
                doc.entry(field.name).or_insert_with(|| default.clone());
            }
        }
        self.validate(&doc)?;

        let stamp = Value::String(timestamp(now));
        doc.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        doc.insert("createdAt".into(), stamp.clone());
        doc.insert("updatedAt".into(), stamp);
        Ok(doc)
    }

    /// Applies a partial update to a stored document. `null` values remove the field.
    pub fn prepare_update(
        &self,
        existing: &Document,
        patch: Document,
        now: DateTime<Utc>,
    ) -> Result<Document, StoreError> {
        let immutable: Vec<String> = patch
            .keys()
            .filter(|key| self.field(key).map(|f| f.immutable).unwrap_or(false))
            .map(|key| format!("Field '{}' is immutable", key))
            .collect();
        if !immutable.is_empty() {
            return Err(StoreError::Validation { errors: immutable });
        }

        let mut doc = existing.clone();
        for (key, value) in self.cast_body(patch, false)? {
            if value.is_null() {
                doc.remove(&key);
            } else {
                doc.insert(key, value);
            }
        }
        self.validate(&doc)?;
        doc.insert("updatedAt".into(), Value::String(timestamp(now)));
        Ok(doc)
    }

    /// Rejects fields that only dedicated handlers may write.
    pub fn reject_guarded(&self, body: &Document) -> Result<(), StoreError> {
        let errors: Vec<String> = body
            .keys()
            .filter(|key| self.field(key).map(|f| f.guarded).unwrap_or(false))
            .map(|key| format!("Field '{}' cannot be set on this route", key))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation { errors })
        }
    }

    pub fn validate(&self, doc: &Document) -> Result<(), StoreError> {
        let mut errors = Vec::new();
        for field in self.fields.iter().filter(|f| !f.immutable) {
            field.issues(doc.get(field.name), &mut errors);
        }
        errors.extend(self.checks.iter().filter_map(|check| check(doc)));
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation { errors })
        }
    }

    /// Casts string condition values according to the field type so comparisons are typed.
    pub fn cast_conditions(&self, conditions: &[FilterWhereInfo]) -> Result<Vec<FilterWhereInfo>, StoreError> {
        conditions
            .iter()
            .map(|condition| {
                let data = match (self.field(&condition.column), &condition.data) {
                    (Some(field), Value::String(raw)) => cast_condition_value(field, raw)?,
                    _ => condition.data.clone(),
                };
                Ok(FilterWhereInfo { data, ..condition.clone() })
            })
            .collect()
    }

    /// Conditions for a query: the schema's default scope followed by the caller's own.
    pub fn scoped_conditions(&self, conditions: &[FilterWhereInfo]) -> Result<Vec<FilterWhereInfo>, StoreError> {
        let mut all = self.default_scope.clone();
        all.extend(self.cast_conditions(conditions)?);
        Ok(all)
    }

    /// Hidden fields may never be filtered, sorted or selected from a query string.
    pub fn check_queryable(&self, request: &QueryRequest) -> Result<(), StoreError> {
        let columns = request
            .conditions
            .iter()
            .map(|c| c.column.as_str())
            .chain(request.order.iter().map(|o| o.column.as_str()))
            .chain(request.projection.include.iter().map(String::as_str));
        for column in columns {
            if self.is_hidden(column) {
                return Err(FilterError::InvalidColumn(column.to_string()).into());
            }
        }
        Ok(())
    }

    /// Renders a stored document for a response: hidden fields dropped, projection applied.
    pub fn present(&self, mut doc: Document, projection: &Projection) -> Document {
        doc.retain(|key, _| !self.is_hidden(key));
        if !projection.include.is_empty() {
            doc.retain(|key, _| key == "id" || projection.include.iter().any(|f| f == key));
        }
        for field in projection.exclude.iter().filter(|f| *f != "id") {
            doc.remove(field);
        }
        doc
    }

    fn cast_body(&self, body: Document, inserting: bool) -> Result<Document, StoreError> {
        let mut out = Document::new();
        for (key, value) in body {
            let Some(field) = self.field(&key) else {
                tracing::debug!("Dropping unknown field '{}' for {}", key, self.collection);
                continue;
            };
            if field.immutable && inserting {
                continue;
            }
            let value = if value.is_null() { value } else { field.cast(value)? };
            out.insert(key, value);
        }
        Ok(out)
    }
}

fn cast_condition_value(field: &Field, raw: &str) -> Result<Value, StoreError> {
    let cast_error = || StoreError::Cast {
        path: field.name.to_string(),
        value: raw.to_string(),
    };
    match field.kind {
        FieldKind::Number => parse_number(raw).ok_or_else(cast_error),
        FieldKind::Boolean => parse_bool(raw).ok_or_else(cast_error),
        FieldKind::Id | FieldKind::Reference => Uuid::parse_str(raw)
            .map(|_| Value::String(raw.to_string()))
            .map_err(|_| cast_error()),
        FieldKind::ReferenceList => Uuid::parse_str(raw)
            .map(|_| Value::Array(vec![Value::String(raw.to_string())]))
            .map_err(|_| cast_error()),
        FieldKind::TextList => Ok(Value::Array(vec![Value::String(raw.to_string())])),
        FieldKind::Date => match parse_date(raw) {
            Some(date) => Ok(Value::String(timestamp(date))),
            None => Err(cast_error()),
        },
        FieldKind::Text | FieldKind::Json => {
            let mut text = raw.to_string();
            if field.lowercase {
                text = text.to_lowercase();
            }
            Ok(Value::String(text))
        }
    }
}

/// RFC 3339 with millisecond precision, so stored timestamps sort lexicographically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

fn parse_bool(raw: &str) -> Option<Value> {
    match raw.trim() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use serde_json::json;

    fn sample() -> Schema {
        Schema::new("samples")
            .with(Field::text("name").required("A sample must have a name").trim().max_length(5, "Name too long"))
            .with(Field::number("score").min(1.0, "Score must be above 1.0").default_value(3))
            .with(Field::text("level").one_of(&["low", "high"], "Level is either: low, high"))
            .with(Field::text("secret").hidden().guarded())
            .with(Field::reference("owner"))
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_applies_defaults_and_stamps() {
        let now = Utc::now();
        let stored = sample().prepare_insert(doc(json!({"name": " abc ", "bogus": 1})), now).unwrap();
        assert_eq!(stored["name"], "abc");
        assert_eq!(stored["score"], 3);
        assert!(stored.get("bogus").is_none());
        assert_eq!(stored["createdAt"], stored["updatedAt"]);
        assert!(Uuid::parse_str(stored["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn insert_ignores_client_supplied_id() {
        let stored = sample()
            .prepare_insert(doc(json!({"name": "a", "id": "not-a-uuid"})), Utc::now())
            .unwrap();
        assert_ne!(stored["id"], "not-a-uuid");
    }

    #[test]
    fn validation_collects_every_message() {
        let err = sample()
            .prepare_insert(doc(json!({"score": 0, "level": "mid"})), Utc::now())
            .unwrap_err();
        match err {
            StoreError::Validation { errors } => assert_eq!(
                errors,
                vec![
                    "A sample must have a name".to_string(),
                    "Score must be above 1.0".to_string(),
                    "Level is either: low, high".to_string(),
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_number_is_a_cast_error() {
        let err = sample()
            .prepare_insert(doc(json!({"name": "a", "score": "lots"})), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::Cast { path, value } if path == "score" && value == "lots"));
    }

    #[test]
    fn update_rejects_immutable_fields() {
        let schema = sample();
        let existing = schema.prepare_insert(doc(json!({"name": "a"})), Utc::now()).unwrap();
        let err = schema
            .prepare_update(&existing, doc(json!({"createdAt": "2020-01-01"})), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn update_merges_and_null_removes() {
        let schema = sample();
        let existing = schema
            .prepare_insert(doc(json!({"name": "a", "level": "low"})), Utc::now())
            .unwrap();
        let updated = schema
            .prepare_update(&existing, doc(json!({"score": "7", "level": null})), Utc::now())
            .unwrap();
        assert_eq!(updated["score"], 7);
        assert!(updated.get("level").is_none());
        assert_eq!(updated["id"], existing["id"]);
    }

    #[test]
    fn guarded_fields_are_rejected() {
        assert!(sample().reject_guarded(&doc(json!({"secret": "x"}))).is_err());
        assert!(sample().reject_guarded(&doc(json!({"name": "x"}))).is_ok());
    }

    #[test]
    fn conditions_are_cast_by_field_type() {
        let cast = sample()
            .cast_conditions(&[
                FilterWhereInfo { column: "score".into(), operator: FilterOp::Gte, data: json!("2.5") },
                FilterWhereInfo::eq("name", "abc"),
            ])
            .unwrap();
        assert_eq!(cast[0].data, json!(2.5));
        assert_eq!(cast[1].data, json!("abc"));

        let err = sample()
            .cast_conditions(&[FilterWhereInfo::eq("owner", "nope")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Cast { path, .. } if path == "owner"));
    }

    #[test]
    fn present_hides_and_projects() {
        let stored = doc(json!({"id": "1", "name": "a", "score": 3, "secret": "s"}));
        let all = sample().present(stored.clone(), &Projection::default());
        assert!(all.get("secret").is_none());

        let only = sample().present(
            stored.clone(),
            &Projection { include: vec!["name".into(), "secret".into()], exclude: vec![] },
        );
        assert_eq!(only.keys().cloned().collect::<Vec<_>>(), vec!["id", "name"]);

        let without = sample().present(stored, &Projection { include: vec![], exclude: vec!["score".into()] });
        assert!(without.get("score").is_none());
        assert!(without.get("name").is_some());
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = timestamp(Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(early, "2021-01-02T03:04:05.000Z");
        assert_eq!(parse_date("2021-01-02").map(timestamp).unwrap(), "2021-01-02T00:00:00.000Z");
    }
}
