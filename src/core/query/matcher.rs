//! In-memory evaluation of a [`Query`] over JSON documents.
//!
//! Arrays follow document-store semantics: a predicate on an array field
//! matches when any element matches.

use super::{FieldFilter, Predicate, Query, QueryValue, SortDirection};
use crate::utils::validation::parse_datetime;
use serde_json::Value;
use std::cmp::Ordering;

/// Query compiled for evaluation against in-memory documents.
#[derive(Debug, Clone)]
pub struct MemoryPlan<'q> {
    query: &'q Query,
}

pub fn compile(query: &Query) -> MemoryPlan<'_> {
    MemoryPlan { query }
}

impl<'q> MemoryPlan<'q> {
    pub fn matches(&self, document: &Value) -> bool {
        self.query
            .filters()
            .iter()
            .all(|filter| filter_matches(filter, lookup(document, &filter.field)))
    }

    /// Filters, orders and paginates `(document, item)` pairs, returning the
    /// items of the selected page.
    pub fn execute<T>(&self, rows: Vec<(Value, T)>) -> Vec<T> {
        let mut selected: Vec<(Value, T)> = rows
            .into_iter()
            .filter(|(document, _)| self.matches(document))
            .collect();

        let ordination = self.query.ordination();
        if !ordination.is_empty() {
            selected.sort_by(|(a, _), (b, _)| {
                ordination
                    .iter()
                    .map(|key| {
                        let ord = compare_values(lookup(a, &key.field), lookup(b, &key.field));
                        match key.direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let pagination = self.query.pagination();
        selected
            .into_iter()
            .skip(usize::try_from(pagination.skip()).unwrap_or(usize::MAX))
            .take(usize::try_from(pagination.limit()).unwrap_or(usize::MAX))
            .map(|(_, item)| item)
            .collect()
    }

    /// Number of documents matching the filters, ignoring pagination.
    pub fn count<'a>(&self, documents: impl IntoIterator<Item = &'a Value>) -> usize {
        documents.into_iter().filter(|d| self.matches(d)).count()
    }
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
        .filter(|value| !value.is_null())
}

fn filter_matches(filter: &FieldFilter, value: Option<&Value>) -> bool {
    let Some(value) = value else {
        return false;
    };
    filter
        .predicates
        .iter()
        .all(|predicate| predicate_matches(predicate, value))
}

fn predicate_matches(predicate: &Predicate, value: &Value) -> bool {
    if let Value::Array(items) = value {
        return items.iter().any(|item| predicate_matches(predicate, item));
    }
    match predicate {
        Predicate::Eq(expected) => compare_scalar(value, expected) == Some(Ordering::Equal),
        Predicate::Lt(bound) => compare_scalar(value, bound) == Some(Ordering::Less),
        Predicate::Lte(bound) => matches!(
            compare_scalar(value, bound),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Predicate::Gt(bound) => compare_scalar(value, bound) == Some(Ordering::Greater),
        Predicate::Gte(bound) => matches!(
            compare_scalar(value, bound),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Predicate::Pattern(pattern) => value.as_str().is_some_and(|s| pattern.matches(s)),
    }
}

fn compare_scalar(value: &Value, operand: &QueryValue) -> Option<Ordering> {
    match (value, operand) {
        (Value::Number(n), QueryValue::Int(i)) => n.as_f64()?.partial_cmp(&(*i as f64)),
        (Value::Number(n), QueryValue::Float(f)) => n.as_f64()?.partial_cmp(f),
        (Value::Number(n), QueryValue::Text(t)) => Some(n.to_string().as_str().cmp(t.as_str())),
        (Value::String(s), QueryValue::Int(i)) => s.parse::<f64>().ok()?.partial_cmp(&(*i as f64)),
        (Value::String(s), QueryValue::Float(f)) => s.parse::<f64>().ok()?.partial_cmp(f),
        (Value::String(s), QueryValue::Text(t)) => Some(s.as_str().cmp(t.as_str())),
        (Value::String(s), QueryValue::Date(d)) => parse_datetime(s).map(|v| v.cmp(d)),
        (Value::Bool(b), QueryValue::Bool(q)) => Some(b.cmp(q)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
