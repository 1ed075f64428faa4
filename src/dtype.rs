/// Semantic column types
///
/// The grid never branches on raw value variants to decide how a column is
/// filtered, enumerated or displayed. It infers one `ColumnType` per column
/// and asks the type.

use serde::{Deserialize, Serialize};

use crate::column::{datetime_from_millis, parse_datetime, Value};
use crate::error::{GridError, Result};

/// Semantic type tag of a column, as reported to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Number,
    Boolean,
    Datetime,
    Interval,
    Period,
    /// Categorical: the value domain is the category list.
    Any,
    String,
}

/// Which filter control drives a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Slider,
    Date,
    Boolean,
    Text,
}

/// How the filter dropdown obtains the values it offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueStrategy {
    /// Numeric bounds only (`slider_min`/`slider_max`).
    MinMax,
    /// Date bounds only (`filter_min`/`filter_max`).
    DateBounds,
    /// Which of true/false occur.
    Presence,
    /// Sorted unique values, cached per column.
    Enumerate,
    /// The category list, no scan.
    Categories,
}

impl ColumnType {
    /// Infer the type of a column from its values.
    ///
    /// Nulls are ignored. A column whose non-null values do not share one
    /// type, or that has no non-null values at all, is a string column.
    pub fn infer(values: &[Value], categories: Option<&[Value]>) -> ColumnType {
        if categories.is_some() {
            return ColumnType::Any;
        }

        let mut inferred: Option<ColumnType> = None;
        for value in values {
            let this = match value {
                Value::Null => continue,
                Value::Int(_) => ColumnType::Integer,
                Value::Float(_) => ColumnType::Number,
                Value::Bool(_) => ColumnType::Boolean,
                Value::Str(_) => ColumnType::String,
                Value::DateTime(_) => ColumnType::Datetime,
                Value::Interval(_) => ColumnType::Interval,
                Value::Period(_) => ColumnType::Period,
            };
            inferred = match (inferred, this) {
                (None, t) => Some(t),
                (Some(a), b) if a == b => Some(a),
                (Some(ColumnType::Integer), ColumnType::Number)
                | (Some(ColumnType::Number), ColumnType::Integer) => Some(ColumnType::Number),
                _ => return ColumnType::String,
            };
        }
        inferred.unwrap_or(ColumnType::String)
    }

    pub fn filter_kind(&self) -> FilterKind {
        match self {
            ColumnType::Integer | ColumnType::Number => FilterKind::Slider,
            ColumnType::Datetime | ColumnType::Period => FilterKind::Date,
            ColumnType::Boolean => FilterKind::Boolean,
            ColumnType::Interval | ColumnType::Any | ColumnType::String => FilterKind::Text,
        }
    }

    pub fn unique_strategy(&self) -> UniqueStrategy {
        match self {
            ColumnType::Integer | ColumnType::Number => UniqueStrategy::MinMax,
            ColumnType::Datetime | ColumnType::Period => UniqueStrategy::DateBounds,
            ColumnType::Boolean => UniqueStrategy::Presence,
            ColumnType::Any => UniqueStrategy::Categories,
            ColumnType::Interval | ColumnType::String => UniqueStrategy::Enumerate,
        }
    }

    /// Whether cells of this type take edits from the view.
    pub fn is_editable(&self) -> bool {
        !matches!(self, ColumnType::Interval | ColumnType::Period)
    }

    /// Transmissible form of a cell. Intervals become their display string,
    /// periods the timestamp their span starts at.
    pub fn display_value(&self, value: &Value) -> Value {
        match value {
            Value::Interval(i) => Value::Str(i.to_string()),
            Value::Period(p) => Value::DateTime(p.to_timestamp()),
            other => other.clone(),
        }
    }

    /// Coerce an edit for a column of this type.
    pub fn coerce(&self, column: &str, value: Value, categories: Option<&[Value]>) -> Result<Value> {
        let reject = |value: &Value, reason: &str| GridError::InvalidEdit {
            column: column.to_string(),
            value: value.to_json_lossy(None).to_string(),
            reason: reason.to_string(),
        };

        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            ColumnType::Integer => match &value {
                Value::Int(_) => Ok(value),
                Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(Value::Int(*f as i64)),
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| reject(&value, "expected an integer")),
                _ => Err(reject(&value, "expected an integer")),
            },
            ColumnType::Number => match &value {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(_) => Ok(value),
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| reject(&value, "expected a number")),
                _ => Err(reject(&value, "expected a number")),
            },
            ColumnType::Boolean => match &value {
                Value::Bool(_) => Ok(value),
                Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(reject(&value, "expected a boolean")),
                },
                _ => Err(reject(&value, "expected a boolean")),
            },
            ColumnType::Datetime => match &value {
                Value::DateTime(_) => Ok(value),
                Value::Str(s) => parse_datetime(s)
                    .map(Value::DateTime)
                    .ok_or_else(|| reject(&value, "expected a datetime")),
                Value::Int(ms) => datetime_from_millis(*ms)
                    .map(Value::DateTime)
                    .ok_or_else(|| reject(&value, "timestamp out of range")),
                _ => Err(reject(&value, "expected a datetime")),
            },
            ColumnType::Any => match categories {
                Some(domain) if !domain.contains(&value) => {
                    Err(reject(&value, "value is not one of the column's categories"))
                }
                _ => Ok(value),
            },
            ColumnType::String => Ok(value),
            ColumnType::Interval | ColumnType::Period => Err(GridError::NotEditable(column.to_string())),
        }
    }
}
