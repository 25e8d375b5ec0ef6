//! Compiles a [`Query`] into the filter/sort/projection documents understood
//! by document stores (`$eq`, `$lt`, `$regex`, ...).

use super::{PatternKind, Predicate, Projection, Query, QueryValue, SortDirection};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentQuery {
    pub filter: Value,
    pub sort: Value,
    pub projection: Value,
    pub skip: u64,
    pub limit: u64,
}

pub fn to_document(query: &Query) -> DocumentQuery {
    let mut filter = Map::new();
    let mut conjunction: Vec<Value> = Vec::new();

    for field_filter in query.filters() {
        let mut ops = Map::new();
        for predicate in &field_filter.predicates {
            let (op, operand) = operator(predicate);
            if ops.contains_key(op) {
                // two bounds with the same operator cannot share one object
                let mut bound = Map::new();
                bound.insert(op.to_string(), operand);
                let mut clause = Map::new();
                clause.insert(field_filter.field.clone(), Value::Object(bound));
                conjunction.push(Value::Object(clause));
            } else {
                ops.insert(op.to_string(), operand);
                if let Predicate::Pattern(pattern) = predicate {
                    if pattern.case_insensitive {
                        ops.insert("$options".to_string(), json!("i"));
                    }
                }
            }
        }
        filter.insert(field_filter.field.clone(), Value::Object(ops));
    }
    if !conjunction.is_empty() {
        filter.insert("$and".to_string(), Value::Array(conjunction));
    }

    let mut sort = Map::new();
    for key in query.ordination() {
        let direction = match key.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        sort.insert(key.field.clone(), json!(direction));
    }

    let mut projection = Map::new();
    match query.projection() {
        Projection::All => {}
        Projection::Include(fields) => {
            for field in fields {
                projection.insert(field.clone(), json!(1));
            }
        }
        Projection::Exclude(fields) => {
            for field in fields {
                projection.insert(field.clone(), json!(0));
            }
        }
    }

    let pagination = query.pagination();
    DocumentQuery {
        filter: Value::Object(filter),
        sort: Value::Object(sort),
        projection: Value::Object(projection),
        skip: pagination.skip(),
        limit: pagination.limit(),
    }
}

fn operator(predicate: &Predicate) -> (&'static str, Value) {
    match predicate {
        Predicate::Eq(v) => ("$eq", operand(v)),
        Predicate::Lt(v) => ("$lt", operand(v)),
        Predicate::Lte(v) => ("$lte", operand(v)),
        Predicate::Gt(v) => ("$gt", operand(v)),
        Predicate::Gte(v) => ("$gte", operand(v)),
        Predicate::Pattern(pattern) => {
            let escaped = regex::escape(&pattern.text);
            let expression = match pattern.kind {
                PatternKind::Prefix => format!("^{}", escaped),
                PatternKind::Suffix => format!("{}$", escaped),
                PatternKind::Substring => escaped,
                PatternKind::Exact => format!("^{}$", escaped),
            };
            ("$regex", Value::String(expression))
        }
    }
}

fn operand(value: &QueryValue) -> Value {
    match value {
        QueryValue::Bool(b) => json!(b),
        QueryValue::Int(n) => json!(n),
        QueryValue::Float(f) => json!(f),
        QueryValue::Date(_) => json!({ "$date": value.to_string() }),
        QueryValue::Text(s) => json!(s),
    }
}
