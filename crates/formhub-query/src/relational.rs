//! Relational-store filter compiler.
//!
//! Maps each predicate to a parameterized raw SQL fragment operating on the
//! JSON-typed `data` column. Every field access is rendered twice: as a
//! JSON accessor (`data->'id'`) for type and array inspection, and as a
//! text accessor (`data->>'id'`) for string comparison.
//!
//! Only the sanitized field identifier is ever spliced into SQL text; all
//! operand values are bound as ordinal `$n` parameters. Numeric and date
//! predicates wrap their casts in `CASE WHEN <pattern match> THEN <cast>
//! ELSE FALSE END` guards so that a malformed stored value fails the
//! predicate instead of aborting the request with a cast error. The guard
//! is what lets this path evaluate every operator with no memory fallback.

use tracing::debug;

use formhub_core::AppResult;
use formhub_core::types::filter::{FilterOperator, ResponseFilter};

use crate::ident::ensure_safe_field_id;

/// Pattern a stored value must match before a numeric cast is attempted.
const NUMERIC_GUARD: &str = r"^-?\d+(\.\d+)?$";
/// Pattern for ISO `YYYY-MM-DD...` stored dates.
const ISO_DATE_GUARD: &str = r"^\d{4}-\d{2}-\d{2}";
/// Pattern for all-digit epoch-millisecond stored dates.
const EPOCH_GUARD: &str = r"^\d+$";

/// A parameter value bound to an ordinal placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// A text value.
    Text(String),
    /// A `text[]` array value.
    TextArray(Vec<String>),
    /// A numeric value.
    Number(f64),
    /// An integer value.
    Int(i64),
}

/// Compiled relational filter: SQL fragments to be joined with `AND` by
/// the caller, and a parameter array whose ordinal positions match the
/// `$n` placeholders embedded in the fragments.
#[derive(Debug, Clone, Default)]
pub struct SqlConditions {
    /// One boolean SQL expression per compiled predicate.
    pub conditions: Vec<String>,
    /// Bind parameters, in placeholder order.
    pub params: Vec<SqlParam>,
}

impl SqlConditions {
    /// Whether no predicate produced a condition.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Compile a filter set into SQL conditions.
///
/// `start_index` is the first ordinal placeholder available to this
/// compilation; callers reserve `$1` for the form id. An unsafe field
/// identifier aborts the whole compilation; a missing operand or an
/// unrecognized case compiles to no condition.
pub fn compile(filters: &[ResponseFilter], start_index: usize) -> AppResult<SqlConditions> {
    let mut builder = ConditionBuilder::new(start_index);
    for filter in filters {
        let field = ensure_safe_field_id(&filter.field_id)?;
        match compile_filter(&mut builder, field, filter) {
            Some(condition) => builder.conditions.push(condition),
            None => debug!(
                field = %filter.field_id,
                operator = ?filter.operator,
                "filter produced no SQL condition"
            ),
        }
    }
    Ok(builder.finish())
}

/// Accumulates conditions and keeps placeholders aligned with parameters.
struct ConditionBuilder {
    conditions: Vec<String>,
    params: Vec<SqlParam>,
    next_index: usize,
}

impl ConditionBuilder {
    fn new(start_index: usize) -> Self {
        Self {
            conditions: Vec::new(),
            params: Vec::new(),
            next_index: start_index,
        }
    }

    /// Bind a parameter and return its placeholder.
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        let placeholder = format!("${}", self.next_index);
        self.next_index += 1;
        placeholder
    }

    fn finish(self) -> SqlConditions {
        SqlConditions {
            conditions: self.conditions,
            params: self.params,
        }
    }
}

/// Compile one predicate. Operand checks run before any parameter is
/// bound, so a predicate that contributes nothing never desyncs the
/// placeholder numbering.
fn compile_filter(
    builder: &mut ConditionBuilder,
    field: &str,
    filter: &ResponseFilter,
) -> Option<String> {
    let json = format!("data->'{field}'");
    let text = format!("data->>'{field}'");

    match filter.operator {
        FilterOperator::IsEmpty => Some(format!(
            "({json} IS NULL OR {text} IS NULL OR {text} = '')"
        )),
        FilterOperator::IsNotEmpty => Some(format!(
            "({json} IS NOT NULL AND {text} IS NOT NULL AND {text} <> '')"
        )),
        FilterOperator::Equals => {
            if let Some(values) = non_empty_values(filter) {
                // Exact, order-independent array equality: equal cardinality
                // plus an anti-join proving every expected element has a
                // case-insensitive match in the stored array.
                let length = builder.bind(SqlParam::Int(values.len() as i64));
                let expected = builder.bind(SqlParam::TextArray(values.to_vec()));
                Some(format!(
                    "(jsonb_typeof({json}) = 'array' \
                     AND jsonb_array_length({json}) = {length} \
                     AND NOT EXISTS (\
                     SELECT 1 FROM unnest({expected}::text[]) AS expected(value) \
                     WHERE NOT EXISTS (\
                     SELECT 1 FROM jsonb_array_elements_text({json}) AS stored(value) \
                     WHERE LOWER(stored.value) = LOWER(expected.value))))"
                ))
            } else {
                let value = operand(filter)?;
                let param = builder.bind(SqlParam::Text(value.to_string()));
                Some(format!("(LOWER({text}) = LOWER({param}))"))
            }
        }
        FilterOperator::NotEquals => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(format!(
                "(LOWER(COALESCE({text}, '')) <> LOWER({param}))"
            ))
        }
        FilterOperator::Contains => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(format!(
                "(CASE WHEN jsonb_typeof({json}) = 'array' \
                 THEN EXISTS (\
                 SELECT 1 FROM jsonb_array_elements_text({json}) AS elem(value) \
                 WHERE elem.value ILIKE '%' || {param} || '%') \
                 ELSE {text} ILIKE '%' || {param} || '%' END)"
            ))
        }
        FilterOperator::NotContains => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(format!(
                "(CASE WHEN jsonb_typeof({json}) = 'array' \
                 THEN NOT EXISTS (\
                 SELECT 1 FROM jsonb_array_elements_text({json}) AS elem(value) \
                 WHERE elem.value ILIKE '%' || {param} || '%') \
                 ELSE COALESCE({text}, '') NOT ILIKE '%' || {param} || '%' END)"
            ))
        }
        FilterOperator::StartsWith => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(format!("({text} ILIKE {param} || '%')"))
        }
        FilterOperator::EndsWith => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(format!("({text} ILIKE '%' || {param})"))
        }
        FilterOperator::GreaterThan => {
            let number = parse_number(operand(filter)?)?;
            let param = builder.bind(SqlParam::Number(number));
            Some(format!(
                "(CASE WHEN {text} ~ '{NUMERIC_GUARD}' \
                 THEN ({text})::numeric > {param} ELSE FALSE END)"
            ))
        }
        FilterOperator::LessThan => {
            let number = parse_number(operand(filter)?)?;
            let param = builder.bind(SqlParam::Number(number));
            Some(format!(
                "(CASE WHEN {text} ~ '{NUMERIC_GUARD}' \
                 THEN ({text})::numeric < {param} ELSE FALSE END)"
            ))
        }
        FilterOperator::Between => {
            let range = filter.number_range.as_ref().filter(|r| !r.is_empty())?;
            let mut bounds = Vec::new();
            if let Some(min) = range.min {
                let param = builder.bind(SqlParam::Number(min));
                bounds.push(format!("({text})::numeric >= {param}"));
            }
            if let Some(max) = range.max {
                let param = builder.bind(SqlParam::Number(max));
                bounds.push(format!("({text})::numeric <= {param}"));
            }
            Some(format!(
                "(CASE WHEN {text} ~ '{NUMERIC_GUARD}' THEN {} ELSE FALSE END)",
                bounds.join(" AND ")
            ))
        }
        FilterOperator::In => {
            let values = non_empty_values(filter)?;
            let lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
            let param = builder.bind(SqlParam::TextArray(lowered));
            Some(format!(
                "(CASE WHEN jsonb_typeof({json}) = 'array' \
                 THEN EXISTS (\
                 SELECT 1 FROM jsonb_array_elements_text({json}) AS elem(value) \
                 WHERE LOWER(elem.value) = ANY({param}::text[])) \
                 ELSE LOWER({text}) = ANY({param}::text[]) END)"
            ))
        }
        FilterOperator::NotIn => {
            let values = non_empty_values(filter)?;
            let lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
            let param = builder.bind(SqlParam::TextArray(lowered));
            Some(format!(
                "(CASE WHEN jsonb_typeof({json}) = 'array' \
                 THEN NOT EXISTS (\
                 SELECT 1 FROM jsonb_array_elements_text({json}) AS elem(value) \
                 WHERE LOWER(elem.value) = ANY({param}::text[])) \
                 ELSE NOT (LOWER(COALESCE({text}, '')) = ANY({param}::text[])) END)"
            ))
        }
        FilterOperator::ContainsAll => {
            let values = non_empty_values(filter)?;
            let expected = builder.bind(SqlParam::TextArray(values.to_vec()));
            Some(format!(
                "(jsonb_typeof({json}) = 'array' \
                 AND NOT EXISTS (\
                 SELECT 1 FROM unnest({expected}::text[]) AS expected(value) \
                 WHERE NOT EXISTS (\
                 SELECT 1 FROM jsonb_array_elements_text({json}) AS stored(value) \
                 WHERE LOWER(stored.value) = LOWER(expected.value))))"
            ))
        }
        FilterOperator::DateEquals => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(date_guarded(&text, "=", &param, "::date"))
        }
        FilterOperator::DateBefore => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(date_guarded(&text, "<", &param, ""))
        }
        FilterOperator::DateAfter => {
            let value = operand(filter)?;
            let param = builder.bind(SqlParam::Text(value.to_string()));
            Some(date_guarded(&text, ">", &param, ""))
        }
        FilterOperator::DateBetween => {
            let range = filter.date_range.as_ref().filter(|r| !r.is_empty())?;
            let mut iso = Vec::new();
            let mut epoch = Vec::new();
            if let Some(from) = range.from.as_deref().filter(|v| !v.is_empty()) {
                let param = builder.bind(SqlParam::Text(from.to_string()));
                iso.push(format!("({text})::timestamp >= ({param})::timestamp"));
                epoch.push(format!(
                    "to_timestamp(({text})::bigint / 1000) >= ({param})::timestamp"
                ));
            }
            if let Some(to) = range.to.as_deref().filter(|v| !v.is_empty()) {
                let param = builder.bind(SqlParam::Text(to.to_string()));
                iso.push(format!("({text})::timestamp <= ({param})::timestamp"));
                epoch.push(format!(
                    "to_timestamp(({text})::bigint / 1000) <= ({param})::timestamp"
                ));
            }
            if iso.is_empty() {
                return None;
            }
            Some(format!(
                "(CASE WHEN {text} ~ '{ISO_DATE_GUARD}' THEN {} \
                 WHEN {text} ~ '{EPOCH_GUARD}' THEN {} ELSE FALSE END)",
                iso.join(" AND "),
                epoch.join(" AND ")
            ))
        }
    }
}

/// A single guarded date comparison: ISO strings cast directly, all-digit
/// values are treated as epoch milliseconds, anything else is FALSE.
fn date_guarded(text: &str, op: &str, param: &str, cast: &str) -> String {
    format!(
        "(CASE WHEN {text} ~ '{ISO_DATE_GUARD}' \
         THEN (({text})::timestamp){cast} {op} (({param})::timestamp){cast} \
         WHEN {text} ~ '{EPOCH_GUARD}' \
         THEN (to_timestamp(({text})::bigint / 1000)){cast} {op} (({param})::timestamp){cast} \
         ELSE FALSE END)"
    )
}

/// Scalar operand, treating the empty string as absent.
fn operand(filter: &ResponseFilter) -> Option<&str> {
    filter.value.as_deref().filter(|v| !v.is_empty())
}

/// List operand, treating an empty list as absent.
fn non_empty_values(filter: &ResponseFilter) -> Option<&[String]> {
    filter.values.as_deref().filter(|v| !v.is_empty())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
