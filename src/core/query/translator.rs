//! Query-string grammar.
//!
//! ```text
//! key=value            equality (typed: bool, integer, float, text)
//! key=lt:value         lt | lte | gt | gte range bound, repeatable
//! key=abc* / *abc / *abc*   prefix / suffix / substring match
//! sort=a,-b            ordination, `-` descending
//! page=N&limit=N       pagination, positive integers
//! fields=a,b | -a,-b   inclusion | exclusion projection
//! start_at=DATE&period=N(d|w|m|y)   half-open range on the date field
//! ```

use super::{
    PatternKind, Predicate, Pagination, Projection, Query, QueryBuilder, QueryDefaults,
    QueryValue, SortDirection, TextPattern,
};
use crate::utils::error::{ValidationCode, ValidationFailure};
use crate::utils::validation::parse_datetime;
use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;
use std::sync::OnceLock;

pub const RESERVED_KEYS: [&str; 6] = ["sort", "page", "limit", "fields", "start_at", "period"];

const DATE_FORMAT_HINT: &str = "Date must be in the ISO 8601 format: yyyy-MM-dd'T'HH:mm:ss.SSSZ or yyyy-MM-dd.";

type TranslateResult<T> = std::result::Result<T, ValidationFailure>;

fn period_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9]+)([dwmy])$").expect("period pattern is valid"))
}

/// Translates a raw query string (with or without the leading `?`) into a
/// fully resolved [`Query`]. The first malformed token aborts translation.
pub fn translate(raw: &str, defaults: &QueryDefaults) -> TranslateResult<Query> {
    let raw = raw.trim().trim_start_matches('?');

    let mut builder = Query::builder();
    let mut page = defaults.page;
    let mut limit = defaults.limit;
    let mut start_at: Option<DateTime<Utc>> = None;
    let mut period: Option<String> = None;

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        match key {
            "sort" => builder = parse_sort(builder, &value)?,
            "page" => page = parse_positive("page", &value)?,
            "limit" => limit = parse_positive("limit", &value)?,
            "fields" => builder = builder.projection(parse_projection(&value)?),
            "start_at" => start_at = Some(parse_date_operand("start_at", &value)?),
            "period" => period = Some(value.trim().to_string()),
            field => builder = builder.filter(field, parse_predicate(field, &value, defaults)?),
        }
    }

    builder = expand_date_range(builder, start_at, period.as_deref(), defaults)?;

    tracing::trace!(page, limit, "translated query string");
    Ok(builder.pagination(Pagination::new(page, limit)?).build())
}

fn parse_predicate(field: &str, raw: &str, defaults: &QueryDefaults) -> TranslateResult<Predicate> {
    if let Some((op, operand)) = raw.split_once(':') {
        let constructor: Option<fn(QueryValue) -> Predicate> = match op {
            "lt" => Some(Predicate::Lt),
            "lte" => Some(Predicate::Lte),
            "gt" => Some(Predicate::Gt),
            "gte" => Some(Predicate::Gte),
            _ => None,
        };
        if let Some(constructor) = constructor {
            if operand.is_empty() {
                return Err(ValidationFailure::new(
                    ValidationCode::ValueInvalid,
                    format!("The '{}' operator on {} requires a value.", op, field),
                    format!("Received {}={}.", field, raw),
                ));
            }
            if operand.starts_with('*') || operand.ends_with('*') {
                return Err(ValidationFailure::new(
                    ValidationCode::OperatorInvalid,
                    format!("The '{}' operator on {} does not accept wildcards.", op, field),
                    format!("Received {}={}.", field, raw),
                ));
            }
            return Ok(constructor(typed_operand(field, operand, defaults)?));
        }
    }

    if defaults.is_date_field(field) {
        return Ok(Predicate::Eq(QueryValue::Date(parse_date_operand(field, raw)?)));
    }

    if let Some(pattern) = parse_wildcard(field, raw, defaults)? {
        return Ok(Predicate::Pattern(pattern));
    }

    match QueryValue::infer(raw) {
        QueryValue::Text(text) if defaults.case_insensitive_patterns => {
            Ok(Predicate::Pattern(TextPattern {
                text,
                kind: PatternKind::Exact,
                case_insensitive: true,
            }))
        }
        value => Ok(Predicate::Eq(value)),
    }
}

fn parse_wildcard(
    field: &str,
    raw: &str,
    defaults: &QueryDefaults,
) -> TranslateResult<Option<TextPattern>> {
    let leading = raw.starts_with('*');
    let trailing = raw.ends_with('*');
    let kind = match (leading, trailing) {
        (false, false) => return Ok(None),
        (true, true) => PatternKind::Substring,
        (true, false) => PatternKind::Suffix,
        (false, true) => PatternKind::Prefix,
    };
    let text = raw.trim_start_matches('*').trim_end_matches('*');
    if text.is_empty() {
        return Err(ValidationFailure::new(
            ValidationCode::ValueInvalid,
            format!("The wildcard filter on {} must contain text.", field),
            format!("Received {}={}.", field, raw),
        ));
    }
    Ok(Some(TextPattern {
        text: text.to_string(),
        kind,
        case_insensitive: defaults.case_insensitive_patterns,
    }))
}

fn typed_operand(field: &str, raw: &str, defaults: &QueryDefaults) -> TranslateResult<QueryValue> {
    if defaults.is_date_field(field) {
        return parse_date_operand(field, raw).map(QueryValue::Date);
    }
    Ok(QueryValue::infer(raw))
}

fn parse_date_operand(field: &str, raw: &str) -> TranslateResult<DateTime<Utc>> {
    parse_datetime(raw.trim()).ok_or_else(|| {
        ValidationFailure::new(
            ValidationCode::DateInvalid,
            format!(
                "Datetime: {}, for the parameter {}, is not in valid ISO 8601 format.",
                raw, field
            ),
            DATE_FORMAT_HINT,
        )
    })
}

fn parse_positive(name: &str, raw: &str) -> TranslateResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ValidationFailure::new(
            ValidationCode::PaginationInvalid,
            format!("The value of the {} parameter must be a positive integer.", name),
            format!("Received {}={}.", name, raw),
        )),
    }
}

fn parse_sort(mut builder: QueryBuilder, raw: &str) -> TranslateResult<QueryBuilder> {
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (field, direction) = match token.strip_prefix('-') {
            Some(field) => (field, SortDirection::Desc),
            None => (token.trim_start_matches('+'), SortDirection::Asc),
        };
        if field.is_empty() {
            return Err(ValidationFailure::new(
                ValidationCode::ValueInvalid,
                "Sort keys must name a field.",
                format!("Received sort={}.", raw),
            ));
        }
        builder = builder.sort(field, direction);
    }
    Ok(builder)
}

fn parse_projection(raw: &str) -> TranslateResult<Projection> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.strip_prefix('-') {
            Some(field) if !field.is_empty() => exclude.push(field.to_string()),
            Some(_) => {
                return Err(ValidationFailure::new(
                    ValidationCode::ProjectionInvalid,
                    "Projected fields must name a field.",
                    format!("Received fields={}.", raw),
                ))
            }
            None => include.push(token.to_string()),
        }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Ok(Projection::All),
        (false, true) => Ok(Projection::Include(include)),
        (true, false) => Ok(Projection::Exclude(exclude)),
        (false, false) => Err(ValidationFailure::new(
            ValidationCode::ProjectionInvalid,
            "Field projection cannot mix included and excluded fields.",
            format!("Received fields={}.", raw),
        )),
    }
}

fn expand_date_range(
    builder: QueryBuilder,
    start_at: Option<DateTime<Utc>>,
    period: Option<&str>,
    defaults: &QueryDefaults,
) -> TranslateResult<QueryBuilder> {
    let field = defaults.date_field.as_str();
    match (start_at, period) {
        (None, None) => Ok(builder),
        (None, Some(period)) => Err(ValidationFailure::new(
            ValidationCode::PeriodInvalid,
            "The period parameter requires a start_at date.",
            format!("Received period={} without start_at.", period),
        )),
        (Some(start), None) => Ok(builder.filter(field, Predicate::Gte(QueryValue::Date(start)))),
        (Some(start), Some(period)) => {
            let end = add_period(start, period)?;
            Ok(builder
                .filter(field, Predicate::Gte(QueryValue::Date(start)))
                .filter(field, Predicate::Lt(QueryValue::Date(end))))
        }
    }
}

fn add_period(start: DateTime<Utc>, period: &str) -> TranslateResult<DateTime<Utc>> {
    let invalid = || {
        ValidationFailure::new(
            ValidationCode::PeriodInvalid,
            format!("Period: {} is not in a valid format.", period),
            "Period must be a positive number followed by d (days), w (weeks), m (months) or y (years), e.g. 1m.",
        )
    };

    let caps = period_regex().captures(period).ok_or_else(invalid)?;
    let amount: u32 = caps[1].parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    let end = match &caps[2] {
        "d" => start.checked_add_signed(Duration::days(i64::from(amount))),
        "w" => start.checked_add_signed(Duration::weeks(i64::from(amount))),
        "m" => start.checked_add_months(Months::new(amount)),
        "y" => amount
            .checked_mul(12)
            .and_then(|months| start.checked_add_months(Months::new(months))),
        _ => None,
    };
    end.ok_or_else(invalid)
}
