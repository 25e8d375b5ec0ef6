//! Canonical, store-agnostic query representation.
//!
//! A [`Query`] is produced by the [`translator`] from a REST-style query
//! string (or assembled with [`QueryBuilder`]) and handed to a repository,
//! which compiles it for its own store: [`compile`] emits a document-store
//! filter, [`matcher`] evaluates it in memory.

pub mod compile;
pub mod matcher;
pub mod translator;

use crate::utils::error::{ValidationCode, ValidationFailure};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use translator::translate;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

/// Typed operand of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl QueryValue {
    /// Types a raw operand: canonical integers and floats become numbers,
    /// `true`/`false` become booleans, everything else stays text.
    pub fn infer(raw: &str) -> Self {
        match raw {
            "true" => return QueryValue::Bool(true),
            "false" => return QueryValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            if n.to_string() == raw {
                return QueryValue::Int(n);
            }
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() && f.to_string() == raw {
                return QueryValue::Float(f);
            }
        }
        QueryValue::Text(raw.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Int(n) => write!(f, "{}", n),
            QueryValue::Float(n) => write!(f, "{}", n),
            QueryValue::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            QueryValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Prefix,
    Suffix,
    Substring,
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPattern {
    pub text: String,
    pub kind: PatternKind,
    pub case_insensitive: bool,
}

impl TextPattern {
    pub fn matches(&self, candidate: &str) -> bool {
        let (candidate, text) = if self.case_insensitive {
            (candidate.to_lowercase(), self.text.to_lowercase())
        } else {
            (candidate.to_string(), self.text.clone())
        };
        match self.kind {
            PatternKind::Prefix => candidate.starts_with(&text),
            PatternKind::Suffix => candidate.ends_with(&text),
            PatternKind::Substring => candidate.contains(&text),
            PatternKind::Exact => candidate == text,
        }
    }

    /// Wildcard form understood by the translator.
    pub fn to_wildcard(&self) -> String {
        match self.kind {
            PatternKind::Prefix => format!("{}*", self.text),
            PatternKind::Suffix => format!("*{}", self.text),
            PatternKind::Substring => format!("*{}*", self.text),
            PatternKind::Exact => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Eq(QueryValue),
    Lt(QueryValue),
    Lte(QueryValue),
    Gt(QueryValue),
    Gte(QueryValue),
    Pattern(TextPattern),
}

const OPERATOR_PREFIXES: [&str; 4] = ["lt:", "lte:", "gt:", "gte:"];

fn has_wildcard_edge(text: &str) -> bool {
    text.starts_with('*') || text.ends_with('*')
}

fn has_operator_prefix(text: &str) -> bool {
    OPERATOR_PREFIXES.iter().any(|op| text.starts_with(op))
}

fn reads_as_other_type(text: &str) -> bool {
    !matches!(QueryValue::infer(text), QueryValue::Text(_))
}

impl Predicate {
    /// Whether the rendered value would translate back to this predicate.
    /// The grammar has no escaping, so text that looks like a number, a
    /// boolean, an operator or a wildcard cannot be written.
    fn is_expressible(&self) -> bool {
        match self {
            Predicate::Eq(QueryValue::Text(text)) => {
                !(text.is_empty()
                    || has_wildcard_edge(text)
                    || has_operator_prefix(text)
                    || reads_as_other_type(text))
            }
            Predicate::Lt(QueryValue::Text(text))
            | Predicate::Lte(QueryValue::Text(text))
            | Predicate::Gt(QueryValue::Text(text))
            | Predicate::Gte(QueryValue::Text(text)) => {
                !(text.is_empty() || has_wildcard_edge(text) || reads_as_other_type(text))
            }
            Predicate::Pattern(pattern) => {
                let text = &pattern.text;
                let plain = !(text.is_empty() || has_wildcard_edge(text) || has_operator_prefix(text));
                plain && (pattern.kind != PatternKind::Exact || !reads_as_other_type(text))
            }
            _ => true,
        }
    }

    fn to_query_value(&self, field: &str) -> Result<String, ValidationFailure> {
        if !self.is_expressible() {
            let shown = match self {
                Predicate::Pattern(p) => p.text.clone(),
                Predicate::Eq(v)
                | Predicate::Lt(v)
                | Predicate::Lte(v)
                | Predicate::Gt(v)
                | Predicate::Gte(v) => v.to_string(),
            };
            return Err(ValidationFailure::new(
                ValidationCode::ValueInvalid,
                format!(
                    "The value '{}' for {} cannot be written as a query string.",
                    shown, field
                ),
                "Text that reads as a number, a boolean, an operator or a wildcard has no query string form.",
            ));
        }
        Ok(match self {
            Predicate::Eq(v) => v.to_string(),
            Predicate::Lt(v) => format!("lt:{}", v),
            Predicate::Lte(v) => format!("lte:{}", v),
            Predicate::Gt(v) => format!("gt:{}", v),
            Predicate::Gte(v) => format!("gte:{}", v),
            Predicate::Pattern(p) => p.to_wildcard(),
        })
    }
}

/// All predicates attached to one field; they combine conjunctively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Page/limit pair. `skip` is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Result<Self, ValidationFailure> {
        if page == 0 || limit == 0 {
            return Err(ValidationFailure::new(
                ValidationCode::PaginationInvalid,
                "The value of the page and limit parameters must be positive integers.",
                format!("Received page={} and limit={}.", page, limit),
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Applies the projection to a flat wire object. `id` survives inclusion
    /// projections.
    pub fn apply(&self, value: &mut serde_json::Value) {
        let Some(object) = value.as_object_mut() else {
            return;
        };
        match self {
            Projection::All => {}
            Projection::Include(fields) => {
                object.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
            }
            Projection::Exclude(fields) => {
                for field in fields {
                    object.remove(field);
                }
            }
        }
    }
}

/// Defaults a collaborator hands to the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefaults {
    pub page: u64,
    pub limit: u64,
    /// Field that `start_at`/`period` expand onto.
    pub date_field: String,
    /// Fields whose operands must parse as calendar dates.
    pub date_fields: Vec<String>,
    pub case_insensitive_patterns: bool,
}

impl QueryDefaults {
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_date_field(&self, field: &str) -> bool {
        field == self.date_field || self.date_fields.iter().any(|f| f == field)
    }
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            date_field: "created_at".to_string(),
            date_fields: vec![
                "created_at".to_string(),
                "last_login".to_string(),
                "last_sync".to_string(),
                "age_calc_date".to_string(),
            ],
            case_insensitive_patterns: false,
        }
    }
}

/// A fully resolved query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    filters: Vec<FieldFilter>,
    ordination: Vec<SortKey>,
    pagination: Pagination,
    projection: Projection,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn predicates_for(&self, field: &str) -> &[Predicate] {
        self.filters
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.predicates.as_slice())
            .unwrap_or(&[])
    }

    pub fn ordination(&self) -> &[SortKey] {
        &self.ordination
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Renders the query back into the grammar accepted by [`translate`].
    ///
    /// Fails for text values the grammar would read as something else, such
    /// as `Eq(Text("true"))` or `Eq(Text("lt:5"))`.
    pub fn to_query_string(&self) -> Result<String, ValidationFailure> {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for filter in &self.filters {
            for predicate in &filter.predicates {
                serializer.append_pair(&filter.field, &predicate.to_query_value(&filter.field)?);
            }
        }
        if !self.ordination.is_empty() {
            let sort = self
                .ordination
                .iter()
                .map(|key| match key.direction {
                    SortDirection::Asc => key.field.clone(),
                    SortDirection::Desc => format!("-{}", key.field),
                })
                .collect::<Vec<_>>()
                .join(",");
            serializer.append_pair("sort", &sort);
        }
        match &self.projection {
            Projection::All => {}
            Projection::Include(fields) => {
                serializer.append_pair("fields", &fields.join(","));
            }
            Projection::Exclude(fields) => {
                let excluded = fields
                    .iter()
                    .map(|f| format!("-{}", f))
                    .collect::<Vec<_>>()
                    .join(",");
                serializer.append_pair("fields", &excluded);
            }
        }
        serializer.append_pair("page", &self.pagination.page.to_string());
        serializer.append_pair("limit", &self.pagination.limit.to_string());
        Ok(serializer.finish())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl From<Query> for QueryBuilder {
    fn from(query: Query) -> Self {
        Self { query }
    }
}

impl QueryBuilder {
    pub fn filter(mut self, field: &str, predicate: Predicate) -> Self {
        match self.query.filters.iter_mut().find(|f| f.field == field) {
            Some(existing) => existing.predicates.push(predicate),
            None => self.query.filters.push(FieldFilter {
                field: field.to_string(),
                predicates: vec![predicate],
            }),
        }
        self
    }

    /// Adds a sort key; a field already present keeps its original priority.
    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        if !self.query.ordination.iter().any(|k| k.field == field) {
            self.query.ordination.push(SortKey {
                field: field.to_string(),
                direction,
            });
        }
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.query.pagination = pagination;
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = projection;
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}
