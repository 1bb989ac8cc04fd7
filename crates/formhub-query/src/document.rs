//! Document-store filter compiler.
//!
//! Maps each predicate to an equivalent document-query subtree against a
//! dynamic `data.<fieldId>` path. The compiled query always anchors on
//! `formId`; per-predicate subtrees combine under a single top-level
//! `$and`. There is no `OR` between user filters at this layer.
//!
//! String comparisons use case-insensitive regexes (anchored for equality,
//! unanchored for containment) because stored values may differ in case
//! from filter input. Operand regex metacharacters are escaped first, so
//! operands always match literally.

use bson::{Bson, Document, doc};
use tracing::debug;
use uuid::Uuid;

use formhub_core::types::filter::{FilterOperator, ResponseFilter};

use crate::ident::is_safe_field_id;

/// Compile a filter set into a single document-store query.
///
/// Filters whose operator cannot be expressed by the document store (the
/// date operators), whose operand is missing, or whose field identifier
/// fails the safe-character check contribute no condition.
pub fn compile(form_id: Uuid, filters: &[ResponseFilter]) -> Document {
    let mut query = doc! { "formId": form_id.to_string() };
    let mut clauses: Vec<Document> = Vec::new();
    for filter in filters {
        match compile_filter(filter) {
            Some(clause) => clauses.push(clause),
            None => debug!(
                field = %filter.field_id,
                operator = ?filter.operator,
                "filter produced no document-store condition"
            ),
        }
    }
    if !clauses.is_empty() {
        query.insert("$and", clauses);
    }
    query
}

/// Compile one predicate to a query subtree, or `None` when it cannot
/// contribute a condition.
pub fn compile_filter(filter: &ResponseFilter) -> Option<Document> {
    // Field paths become object keys here, not string-concatenated code,
    // but the same allowed-character discipline as the SQL side applies.
    if !is_safe_field_id(&filter.field_id) {
        return None;
    }
    let path = format!("data.{}", filter.field_id);

    match filter.operator {
        FilterOperator::IsEmpty => Some(doc! {
            "$or": [
                { path.clone(): { "$exists": false } },
                { path.clone(): Bson::Null },
                { path: "" },
            ]
        }),
        FilterOperator::IsNotEmpty => Some(doc! {
            "$and": [
                { path.clone(): { "$exists": true } },
                { path.clone(): { "$ne": Bson::Null } },
                { path: { "$ne": "" } },
            ]
        }),
        FilterOperator::Equals => {
            if let Some(values) = non_empty_values(filter) {
                // Exact, order-independent array equality: every expected
                // element present, cardinality equal.
                let regexes: Vec<Bson> =
                    values.iter().map(|v| ci_regex(anchored(v))).collect();
                Some(doc! {
                    path: { "$all": regexes, "$size": values.len() as i32 }
                })
            } else {
                let value = operand(filter)?;
                Some(doc! { path: ci_regex(anchored(value)) })
            }
        }
        FilterOperator::NotEquals => {
            let value = operand(filter)?;
            Some(doc! { path: { "$not": ci_regex(anchored(value)) } })
        }
        FilterOperator::Contains => {
            let value = operand(filter)?;
            Some(doc! { path: ci_regex(regex::escape(value)) })
        }
        FilterOperator::NotContains => {
            let value = operand(filter)?;
            Some(doc! { path: { "$not": ci_regex(regex::escape(value)) } })
        }
        FilterOperator::StartsWith => {
            let value = operand(filter)?;
            Some(doc! { path: ci_regex(format!("^{}", regex::escape(value))) })
        }
        FilterOperator::EndsWith => {
            let value = operand(filter)?;
            Some(doc! { path: ci_regex(format!("{}$", regex::escape(value))) })
        }
        FilterOperator::GreaterThan => {
            let number = parse_number(operand(filter)?)?;
            Some(doc! { path: { "$gt": number } })
        }
        FilterOperator::LessThan => {
            let number = parse_number(operand(filter)?)?;
            Some(doc! { path: { "$lt": number } })
        }
        FilterOperator::Between => {
            let range = filter.number_range.as_ref().filter(|r| !r.is_empty())?;
            let mut bounds = Document::new();
            if let Some(min) = range.min {
                bounds.insert("$gte", min);
            }
            if let Some(max) = range.max {
                bounds.insert("$lte", max);
            }
            Some(doc! { path: bounds })
        }
        FilterOperator::In => {
            let values = non_empty_values(filter)?;
            let clauses: Vec<Document> = values
                .iter()
                .map(|v| {
                    let mut clause = Document::new();
                    clause.insert(path.clone(), ci_regex(anchored(v)));
                    clause
                })
                .collect();
            Some(doc! { "$or": clauses })
        }
        FilterOperator::NotIn => {
            let values = non_empty_values(filter)?;
            let clauses: Vec<Document> = values
                .iter()
                .map(|v| {
                    let mut clause = Document::new();
                    clause.insert(
                        path.clone(),
                        doc! { "$not": ci_regex(anchored(v)) },
                    );
                    clause
                })
                .collect();
            Some(doc! { "$and": clauses })
        }
        FilterOperator::ContainsAll => {
            let values = non_empty_values(filter)?;
            let regexes: Vec<Bson> = values.iter().map(|v| ci_regex(anchored(v))).collect();
            Some(doc! { path: { "$all": regexes } })
        }
        // Date predicates fall back to the memory evaluator; the classifier
        // keeps them out of the pushable set, so reaching here means a
        // caller skipped classification.
        FilterOperator::DateEquals
        | FilterOperator::DateBefore
        | FilterOperator::DateAfter
        | FilterOperator::DateBetween => None,
    }
}

/// A case-insensitive regex condition value.
fn ci_regex(pattern: String) -> Bson {
    Bson::RegularExpression(bson::Regex {
        pattern,
        options: "i".to_string(),
    })
}

/// Anchor an operand for whole-value equality matching.
fn anchored(value: &str) -> String {
    format!("^{}$", regex::escape(value))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn form_id() -> Uuid {
        Uuid::nil()
    }

    #[test]
    fn test_anchors_on_form_id() {
        let query = compile(form_id(), &[]);
        assert_eq!(
            query.get_str("formId").expect("formId"),
            form_id().to_string()
        );
        assert!(!query.contains_key("$and"));
    }

    #[test]
    fn test_equals_is_anchored_case_insensitive_regex() {
        let filter = ResponseFilter::with_value("color", FilterOperator::Equals, "Yes");
        let clause = compile_filter(&filter).expect("condition");
        assert_eq!(
            clause,
            doc! { "data.color": Bson::RegularExpression(bson::Regex {
                pattern: "^Yes$".to_string(),
                options: "i".to_string(),
            })}
        );
    }

    #[test]
    fn test_contains_escapes_metacharacters() {
        let filter = ResponseFilter::with_value("note", FilterOperator::Contains, "a.b*");
        let clause = compile_filter(&filter).expect("condition");
        let Bson::RegularExpression(re) = clause.get("data.note").expect("path") else {
            panic!("expected regex condition");
        };
        assert_eq!(re.pattern, r"a\.b\*");
        assert_eq!(re.options, "i");
    }

    #[test]
    fn test_is_empty_covers_absent_null_and_blank() {
        let filter = ResponseFilter::new("note", FilterOperator::IsEmpty);
        let clause = compile_filter(&filter).expect("condition");
        let alternatives = clause.get_array("$or").expect("$or");
        assert_eq!(alternatives.len(), 3);
    }

    #[test]
    fn test_array_equals_uses_all_and_size() {
        let filter = ResponseFilter::with_values(
            "toppings",
            FilterOperator::Equals,
            ["cheese", "olives"],
        );
        let clause = compile_filter(&filter).expect("condition");
        let condition = clause.get_document("data.toppings").expect("path");
        assert_eq!(condition.get_i32("$size").expect("$size"), 2);
        assert_eq!(condition.get_array("$all").expect("$all").len(), 2);
    }

    #[test]
    fn test_between_with_single_bound() {
        let filter = ResponseFilter::between("age", Some(18.0), None);
        let clause = compile_filter(&filter).expect("condition");
        let bounds = clause.get_document("data.age").expect("path");
        assert_eq!(bounds.get_f64("$gte").expect("$gte"), 18.0);
        assert!(!bounds.contains_key("$lte"));
    }

    #[test]
    fn test_between_without_bounds_is_noop() {
        let filter = ResponseFilter::between("age", None, None);
        assert!(compile_filter(&filter).is_none());
    }

    #[test]
    fn test_missing_operand_is_noop() {
        let filter = ResponseFilter::new("color", FilterOperator::Equals);
        assert!(compile_filter(&filter).is_none());
        let filter = ResponseFilter::with_value("color", FilterOperator::Contains, "");
        assert!(compile_filter(&filter).is_none());
        let filter = ResponseFilter::with_values("color", FilterOperator::In, Vec::<String>::new());
        assert!(compile_filter(&filter).is_none());
    }

    #[test]
    fn test_date_operators_are_noop() {
        let filter = ResponseFilter::with_value("due", FilterOperator::DateBefore, "2026-01-01");
        assert!(compile_filter(&filter).is_none());
    }

    #[test]
    fn test_unsafe_field_is_noop() {
        let filter = ResponseFilter::with_value("a.b", FilterOperator::Equals, "x");
        assert!(compile_filter(&filter).is_none());
    }

    #[test]
    fn test_compile_combines_under_and() {
        let filters = vec![
            ResponseFilter::with_value("color", FilterOperator::Equals, "red"),
            ResponseFilter::with_value("size", FilterOperator::Contains, "L"),
            ResponseFilter::with_value("due", FilterOperator::DateAfter, "2026-01-01"),
        ];
        let query = compile(form_id(), &filters);
        // The date filter contributes nothing.
        assert_eq!(query.get_array("$and").expect("$and").len(), 2);
    }
}
