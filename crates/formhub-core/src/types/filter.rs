//! The response filter model.
//!
//! A [`ResponseFilter`] is the backend-agnostic predicate a caller attaches
//! to a response listing request: a dynamic field identifier, an operator,
//! and at most one operand (scalar value, value list, numeric range, or date
//! range). The filter carries no behavior; the compilers in `formhub-query`
//! turn it into backend queries.

use serde::{Deserialize, Serialize};

/// Comparison operator of a [`ResponseFilter`].
///
/// The wire form matches the API layer's SCREAMING_SNAKE_CASE names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    /// Field is absent, null, or the empty string.
    IsEmpty,
    /// Field is present, non-null, and not the empty string.
    IsNotEmpty,
    /// Case-insensitive equality; with `values` set, exact array equality.
    Equals,
    /// Case-insensitive inequality.
    NotEquals,
    /// Case-insensitive substring (or array element) match.
    Contains,
    /// Negation of [`FilterOperator::Contains`].
    NotContains,
    /// Case-insensitive prefix match.
    StartsWith,
    /// Case-insensitive suffix match.
    EndsWith,
    /// Numeric greater-than.
    GreaterThan,
    /// Numeric less-than.
    LessThan,
    /// Numeric range with optional bounds.
    Between,
    /// Case-insensitive membership in `values`.
    In,
    /// Negation of [`FilterOperator::In`].
    NotIn,
    /// Stored array contains a match for every entry of `values`.
    ContainsAll,
    /// Calendar-date equality.
    DateEquals,
    /// Strictly before the given date.
    DateBefore,
    /// Strictly after the given date.
    DateAfter,
    /// Date range with optional bounds.
    DateBetween,
}

impl FilterOperator {
    /// Whether this is one of the four date operators.
    ///
    /// Date predicates cannot be pushed down to the document store and are
    /// evaluated in memory there; the relational compiler expresses them
    /// with guarded casts.
    pub fn is_date_operator(&self) -> bool {
        matches!(
            self,
            Self::DateEquals | Self::DateBefore | Self::DateAfter | Self::DateBetween
        )
    }
}

/// Optional numeric bounds for [`FilterOperator::Between`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NumberRange {
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
}

impl NumberRange {
    /// Whether neither bound is set.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Optional date bounds for [`FilterOperator::DateBetween`].
///
/// Bounds are carried as strings exactly as received from the caller; the
/// compilers and the memory evaluator apply their own guarded parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateRange {
    /// Inclusive start date.
    pub from: Option<String>,
    /// Inclusive end date.
    pub to: Option<String>,
}

impl DateRange {
    /// Whether neither bound is set.
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// A single predicate against a dynamic response field.
///
/// At most one of `value` / `values` / `number_range` / `date_range` is
/// meaningful for a given operator. A filter whose required operand is
/// absent compiles to no condition rather than an error, so partially
/// filled filter UI states never break a listing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFilter {
    /// Identifier of a dynamic key inside the response's answer blob.
    pub field_id: String,
    /// The comparison operator.
    pub operator: FilterOperator,
    /// Operand for single-value operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Operand for multi-value operators (`IN`, `NOT_IN`, `CONTAINS_ALL`,
    /// array-exact `EQUALS`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// Operand for `BETWEEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_range: Option<NumberRange>,
    /// Operand for `DATE_BETWEEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl ResponseFilter {
    /// Create a filter with no operand (for `IS_EMPTY` / `IS_NOT_EMPTY`).
    pub fn new(field_id: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            field_id: field_id.into(),
            operator,
            value: None,
            values: None,
            number_range: None,
            date_range: None,
        }
    }

    /// Create a filter with a single scalar operand.
    pub fn with_value(
        field_id: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(field_id, operator)
        }
    }

    /// Create a filter with a value-list operand.
    pub fn with_values<I, S>(field_id: impl Into<String>, operator: FilterOperator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: Some(values.into_iter().map(Into::into).collect()),
            ..Self::new(field_id, operator)
        }
    }

    /// Create a `BETWEEN` filter.
    pub fn between(field_id: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            number_range: Some(NumberRange { min, max }),
            ..Self::new(field_id, FilterOperator::Between)
        }
    }

    /// Create a `DATE_BETWEEN` filter.
    pub fn date_between(
        field_id: impl Into<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Self {
        Self {
            date_range: Some(DateRange { from, to }),
            ..Self::new(field_id, FilterOperator::DateBetween)
        }
    }
}
