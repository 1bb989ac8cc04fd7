//! In-memory filter evaluation.
//!
//! Evaluates predicates against already-fetched responses with the same
//! operator semantics as the two database compilers: case-insensitive
//! string comparison, guarded numeric and date coercions that return
//! `false` on malformed stored data, and the permissive missing-operand
//! policy (a filter without its required operand restricts nothing).
//!
//! The document-store orchestration path applies this evaluator to the
//! date predicates the document store cannot express.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use formhub_core::types::filter::{FilterOperator, ResponseFilter};
use formhub_entity::response::FormResponse;

/// Guard a stored value must match before numeric interpretation, kept in
/// sync with the relational compiler's SQL-side guard.
static NUMERIC_GUARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid pattern"));
/// ISO `YYYY-MM-DD...` stored date guard.
static ISO_DATE_GUARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid pattern"));
/// All-digit epoch-millisecond guard.
static EPOCH_GUARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid pattern"));

/// The memory-evaluation collaborator consumed by the filter orchestrator.
///
/// Implementations must be pure and synchronous, returning the subset of
/// `records` satisfying all given filters, and must return `false` rather
/// than erroring on malformed stored values.
pub trait ResponseFilterEvaluator: Send + Sync {
    /// Return the responses matching every filter.
    fn apply(&self, records: Vec<FormResponse>, filters: &[ResponseFilter]) -> Vec<FormResponse>;
}

/// The default evaluator, backed by [`apply_response_filters`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFilterEvaluator;

impl ResponseFilterEvaluator for MemoryFilterEvaluator {
    fn apply(&self, records: Vec<FormResponse>, filters: &[ResponseFilter]) -> Vec<FormResponse> {
        apply_response_filters(records, filters)
    }
}

/// Keep the responses whose answer blob satisfies every filter.
pub fn apply_response_filters(
    records: Vec<FormResponse>,
    filters: &[ResponseFilter],
) -> Vec<FormResponse> {
    if filters.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| filters.iter().all(|f| response_matches(&record.data, f)))
        .collect()
}

/// Evaluate one predicate against an answer blob.
///
/// A filter whose required operand is absent matches everything (it
/// compiles to no condition in both database strategies); a stored value
/// the predicate cannot coerce fails the predicate.
pub fn response_matches(data: &Value, filter: &ResponseFilter) -> bool {
    let stored = data.get(&filter.field_id);

    match filter.operator {
        FilterOperator::IsEmpty => is_empty(stored),
        FilterOperator::IsNotEmpty => !is_empty(stored),
        FilterOperator::Equals => {
            if let Some(expected) = non_empty_values(filter) {
                let Some(actual) = stored.and_then(array_texts) else {
                    return false;
                };
                array_equals_ci(&actual, expected)
            } else {
                let Some(value) = operand(filter) else {
                    return true;
                };
                match stored.and_then(value_text) {
                    Some(actual) => eq_ci(&actual, value),
                    None => false,
                }
            }
        }
        FilterOperator::NotEquals => {
            let Some(value) = operand(filter) else {
                return true;
            };
            // Absent fields pass, matching the COALESCE on the SQL side.
            let actual = stored.and_then(value_text).unwrap_or_default();
            !eq_ci(&actual, value)
        }
        FilterOperator::Contains => {
            let Some(value) = operand(filter) else {
                return true;
            };
            match stored {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(value_text_ref)
                    .any(|item| contains_ci(&item, value)),
                other => match other.and_then(value_text) {
                    Some(actual) => contains_ci(&actual, value),
                    None => false,
                },
            }
        }
        FilterOperator::NotContains => {
            let Some(value) = operand(filter) else {
                return true;
            };
            match stored {
                Some(Value::Array(items)) => !items
                    .iter()
                    .filter_map(value_text_ref)
                    .any(|item| contains_ci(&item, value)),
                other => {
                    let actual = other.and_then(value_text).unwrap_or_default();
                    !contains_ci(&actual, value)
                }
            }
        }
        FilterOperator::StartsWith => {
            let Some(value) = operand(filter) else {
                return true;
            };
            match stored.and_then(value_text) {
                Some(actual) => actual.to_lowercase().starts_with(&value.to_lowercase()),
                None => false,
            }
        }
        FilterOperator::EndsWith => {
            let Some(value) = operand(filter) else {
                return true;
            };
            match stored.and_then(value_text) {
                Some(actual) => actual.to_lowercase().ends_with(&value.to_lowercase()),
                None => false,
            }
        }
        FilterOperator::GreaterThan => {
            let Some(bound) = operand(filter).and_then(parse_operand_number) else {
                return true;
            };
            match stored.and_then(stored_number) {
                Some(actual) => actual > bound,
                None => false,
            }
        }
        FilterOperator::LessThan => {
            let Some(bound) = operand(filter).and_then(parse_operand_number) else {
                return true;
            };
            match stored.and_then(stored_number) {
                Some(actual) => actual < bound,
                None => false,
            }
        }
        FilterOperator::Between => {
            let Some(range) = filter.number_range.as_ref().filter(|r| !r.is_empty()) else {
                return true;
            };
            let Some(actual) = stored.and_then(stored_number) else {
                return false;
            };
            range.min.is_none_or(|min| actual >= min)
                && range.max.is_none_or(|max| actual <= max)
        }
        FilterOperator::In => {
            let Some(values) = non_empty_values(filter) else {
                return true;
            };
            match stored {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(value_text_ref)
                    .any(|item| values.iter().any(|v| eq_ci(&item, v))),
                other => match other.and_then(value_text) {
                    Some(actual) => values.iter().any(|v| eq_ci(&actual, v)),
                    None => false,
                },
            }
        }
        FilterOperator::NotIn => {
            let Some(values) = non_empty_values(filter) else {
                return true;
            };
            match stored {
                Some(Value::Array(items)) => !items
                    .iter()
                    .filter_map(value_text_ref)
                    .any(|item| values.iter().any(|v| eq_ci(&item, v))),
                other => {
                    let actual = other.and_then(value_text).unwrap_or_default();
                    !values.iter().any(|v| eq_ci(&actual, v))
                }
            }
        }
        FilterOperator::ContainsAll => {
            let Some(values) = non_empty_values(filter) else {
                return true;
            };
            let Some(actual) = stored.and_then(array_texts) else {
                return false;
            };
            values
                .iter()
                .all(|v| actual.iter().any(|item| eq_ci(item, v)))
        }
        FilterOperator::DateEquals => {
            let Some(bound) = operand(filter).and_then(parse_date_guarded) else {
                return true;
            };
            match stored_date(stored) {
                Some(actual) => actual.date_naive() == bound.date_naive(),
                None => false,
            }
        }
        FilterOperator::DateBefore => {
            let Some(bound) = operand(filter).and_then(parse_date_guarded) else {
                return true;
            };
            match stored_date(stored) {
                Some(actual) => actual < bound,
                None => false,
            }
        }
        FilterOperator::DateAfter => {
            let Some(bound) = operand(filter).and_then(parse_date_guarded) else {
                return true;
            };
            match stored_date(stored) {
                Some(actual) => actual > bound,
                None => false,
            }
        }
        FilterOperator::DateBetween => {
            let Some(range) = filter.date_range.as_ref().filter(|r| !r.is_empty()) else {
                return true;
            };
            let Some(actual) = stored_date(stored) else {
                return false;
            };
            let from = range.from.as_deref().and_then(parse_date_guarded);
            let to = range.to.as_deref().and_then(parse_date_guarded);
            from.is_none_or(|f| actual >= f) && to.is_none_or(|t| actual <= t)
        }
    }
}

/// Absent, JSON null, or the empty string.
fn is_empty(stored: Option<&Value>) -> bool {
    match stored {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Scalar operand, treating the empty string as absent.
fn operand(filter: &ResponseFilter) -> Option<&str> {
    filter.value.as_deref().filter(|v| !v.is_empty())
}

/// List operand, treating an empty list as absent.
fn non_empty_values(filter: &ResponseFilter) -> Option<&[String]> {
    filter.values.as_deref().filter(|v| !v.is_empty())
}

/// Text form of a stored scalar, matching how the storage engines render
/// JSON scalars as text.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_text_ref(value: &Value) -> Option<String> {
    value_text(value)
}

/// Text forms of a stored array's elements; `None` when not an array.
fn array_texts(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(value_text_ref).collect()),
        _ => None,
    }
}

/// Exact, order-independent array equality with case-insensitive elements.
fn array_equals_ci(actual: &[String], expected: &[String]) -> bool {
    actual.len() == expected.len()
        && expected
            .iter()
            .all(|e| actual.iter().any(|a| eq_ci(a, e)))
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Filter operands accept anything `f64` can parse.
fn parse_operand_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Stored values pass the same shape guard the SQL side applies before
/// its cast, so `"abc"` fails the predicate instead of erroring.
fn stored_number(value: &Value) -> Option<f64> {
    let text = value_text(value)?;
    if !NUMERIC_GUARD.is_match(&text) {
        return None;
    }
    text.parse::<f64>().ok()
}

fn stored_date(stored: Option<&Value>) -> Option<DateTime<Utc>> {
    stored.and_then(value_text).as_deref().and_then(parse_date_guarded)
}

/// Guarded date parsing: ISO `YYYY-MM-DD...` prefixes or all-digit epoch
/// milliseconds. Anything else is `None`, never an error.
fn parse_date_guarded(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if ISO_DATE_GUARD.is_match(raw) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Some(Utc.from_utc_datetime(&dt));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(Utc.from_utc_datetime(&dt));
        }
        return NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt));
    }
    if EPOCH_GUARD.is_match(raw) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    }
    None
}
