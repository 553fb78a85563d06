//! Basic attribute filters: `[property, operator, value]` conditions joined by
//! `all` or `any`.
//!
//! Both the object form `{"all": [[...], ...]}` and the array form
//! `["all", [[...], ...]]` are accepted. All validation happens while parsing,
//! so a `BasicFilter` that exists is always safe to evaluate.
//!
//! A property missing from a feature never satisfies a condition, whatever the
//! operator or combinator. Mismatched types (a number against a string or
//! boolean property, a boolean against a numeric property) never satisfy
//! either, and booleans only support `=` and `!=`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::FilterError;
use crate::value::PropertyValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn parse(op: &str) -> Result<Self, FilterError> {
        Ok(match op {
            "=" => Comparison::Eq,
            "!=" => Comparison::Ne,
            "<" => Comparison::Lt,
            "<=" => Comparison::Le,
            ">" => Comparison::Gt,
            ">=" => Comparison::Ge,
            _ => return Err(FilterError::Condition),
        })
    }

    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Eq => ordering == Equal,
            Comparison::Ne => ordering != Equal,
            Comparison::Lt => ordering == Less,
            Comparison::Le => ordering != Greater,
            Comparison::Gt => ordering == Greater,
            Comparison::Ge => ordering != Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub property: String,
    pub comparison: Comparison,
    pub value: FilterValue,
}

impl Condition {
    fn parse(raw: &Value) -> Result<Self, FilterError> {
        let parts = match raw.as_array() {
            Some(parts) if parts.len() == 3 => parts,
            _ => return Err(FilterError::Shape),
        };

        let property = parts[0].as_str().ok_or(FilterError::Parameter)?;
        let comparison = parts[1]
            .as_str()
            .ok_or(FilterError::Condition)
            .and_then(Comparison::parse)?;
        let value = match &parts[2] {
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Number(n) => FilterValue::Number(n.as_f64().ok_or(FilterError::Value)?),
            _ => return Err(FilterError::Value),
        };

        Ok(Condition {
            property: property.to_string(),
            comparison,
            value,
        })
    }

    /// Test the condition against a property value, or its absence.
    pub fn matches(&self, value: Option<&PropertyValue>) -> bool {
        let Some(value) = value else {
            return false;
        };

        match self.value {
            FilterValue::Number(expected) => match value.as_f64() {
                Some(actual) => actual
                    .partial_cmp(&expected)
                    .map_or(false, |ordering| self.comparison.holds(ordering)),
                None => false,
            },
            FilterValue::Bool(expected) => match (value.as_bool(), self.comparison) {
                (Some(actual), Comparison::Eq) => actual == expected,
                (Some(actual), Comparison::Ne) => actual != expected,
                _ => false,
            },
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct BasicFilter {
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
}

impl BasicFilter {
    pub fn from_json(raw: &Value) -> Result<Self, FilterError> {
        let (combinator, conditions) = match raw {
            Value::Object(map) if map.len() == 1 => {
                let (key, conditions) = map.iter().next().ok_or(FilterError::Combinator)?;
                (key.as_str(), conditions)
            }
            Value::Array(parts) if parts.len() == 2 => {
                (parts[0].as_str().ok_or(FilterError::Combinator)?, &parts[1])
            }
            _ => return Err(FilterError::Combinator),
        };

        let combinator = match combinator {
            "all" => Combinator::All,
            "any" => Combinator::Any,
            _ => return Err(FilterError::Combinator),
        };

        let conditions = conditions
            .as_array()
            .ok_or(FilterError::Combinator)?
            .iter()
            .map(Condition::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BasicFilter {
            combinator,
            conditions,
        })
    }

    /// Evaluate against a feature's properties using `lookup` to fetch values.
    ///
    /// An empty condition list admits every feature.
    pub fn evaluate<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a PropertyValue>,
    {
        if self.conditions.is_empty() {
            return true;
        }

        let mut results = self
            .conditions
            .iter()
            .map(|condition| condition.matches(lookup(&condition.property)));

        match self.combinator {
            Combinator::All => results.all(|ok| ok),
            Combinator::Any => results.any(|ok| ok),
        }
    }

    /// Evaluate against an ordered key/value property list.
    pub fn evaluate_properties(&self, properties: &[(String, PropertyValue)]) -> bool {
        self.evaluate(|key| properties.iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }
}

impl TryFrom<Value> for BasicFilter {
    type Error = FilterError;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        BasicFilter::from_json(&raw)
    }
}
