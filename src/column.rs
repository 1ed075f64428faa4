/// LiveGrid Column Implementation
///
/// A Column is a named vector of `Value`s. Every cell in the grid, including
/// index levels, is a `Value`; the semantic type of a column is derived from
/// its values by `dtype::ColumnType::infer`.
///
/// # Helper columns
///
/// Columns with a non-`Data` role are derived from another field (a
/// stringified sort key for mixed-type columns, or absolute timestamps for
/// period columns). They travel with the dataset but are never returned to
/// callers or serialized to the view.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{GridError, Result};

/// Which side(s) of an interval are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntervalClosed {
    Left,
    #[default]
    Right,
    Both,
    Neither,
}

/// A bucket such as the bins produced when cutting a numeric or time column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    pub left: Box<Value>,
    pub right: Box<Value>,
    pub closed: IntervalClosed,
}

impl Interval {
    pub fn new(left: impl Into<Value>, right: impl Into<Value>, closed: IntervalClosed) -> Self {
        Interval {
            left: Box::new(left.into()),
            right: Box::new(right.into()),
            closed,
        }
    }

    fn try_cmp(&self, other: &Interval) -> Option<Ordering> {
        match self.left.try_cmp(&other.left)? {
            Ordering::Equal => self.right.try_cmp(&other.right),
            ord => Some(ord),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.closed {
            IntervalClosed::Left => ('[', ')'),
            IntervalClosed::Right => ('(', ']'),
            IntervalClosed::Both => ('[', ']'),
            IntervalClosed::Neither => ('(', ')'),
        };
        write!(f, "{}{}, {}{}", open, self.left, self.right, close)
    }
}

/// Calendar frequency of a period value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodFreq {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    BusinessDay,
    Hour,
    Minute,
    Second,
}

/// A span of calendar time identified by its start and frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    start: NaiveDateTime,
    freq: PeriodFreq,
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN)
}

fn roll_to_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

impl Period {
    /// The period of frequency `freq` containing `at`. Business-day periods
    /// landing on a weekend roll forward to the next Monday.
    pub fn new(at: NaiveDateTime, freq: PeriodFreq) -> Self {
        let date = at.date();
        let start = match freq {
            PeriodFreq::Year => midnight(first_of_month(date.year(), 1)),
            PeriodFreq::Quarter => {
                midnight(first_of_month(date.year(), (date.month() - 1) / 3 * 3 + 1))
            }
            PeriodFreq::Month => midnight(first_of_month(date.year(), date.month())),
            PeriodFreq::Week => {
                midnight(date - Duration::days(date.weekday().num_days_from_monday() as i64))
            }
            PeriodFreq::Day => midnight(date),
            PeriodFreq::BusinessDay => midnight(roll_to_weekday(date)),
            PeriodFreq::Hour => date.and_hms_opt(at.hour(), 0, 0).unwrap_or(at),
            PeriodFreq::Minute => date.and_hms_opt(at.hour(), at.minute(), 0).unwrap_or(at),
            PeriodFreq::Second => at.with_nanosecond(0).unwrap_or(at),
        };
        Period { start, freq }
    }

    /// `count` consecutive periods starting with the one containing `start`.
    pub fn range(start: NaiveDateTime, count: usize, freq: PeriodFreq) -> Vec<Period> {
        let mut periods = Vec::with_capacity(count);
        let mut current = Period::new(start, freq);
        for _ in 0..count {
            periods.push(current);
            current = current.succ();
        }
        periods
    }

    /// The following period of the same frequency.
    pub fn succ(&self) -> Period {
        let start = match self.freq {
            PeriodFreq::Year => self.start.checked_add_months(Months::new(12)),
            PeriodFreq::Quarter => self.start.checked_add_months(Months::new(3)),
            PeriodFreq::Month => self.start.checked_add_months(Months::new(1)),
            PeriodFreq::Week => Some(self.start + Duration::days(7)),
            PeriodFreq::Day => Some(self.start + Duration::days(1)),
            PeriodFreq::BusinessDay => {
                Some(midnight(roll_to_weekday(self.start.date() + Duration::days(1))))
            }
            PeriodFreq::Hour => Some(self.start + Duration::hours(1)),
            PeriodFreq::Minute => Some(self.start + Duration::minutes(1)),
            PeriodFreq::Second => Some(self.start + Duration::seconds(1)),
        };
        Period {
            start: start.unwrap_or(self.start),
            freq: self.freq,
        }
    }

    pub fn freq(&self) -> PeriodFreq {
        self.freq
    }

    /// Absolute timestamp of the start of the period.
    pub fn to_timestamp(&self) -> NaiveDateTime {
        self.start
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.start;
        match self.freq {
            PeriodFreq::Year => write!(f, "{}", s.format("%Y")),
            PeriodFreq::Quarter => write!(f, "{}Q{}", s.year(), (s.month() - 1) / 3 + 1),
            PeriodFreq::Month => write!(f, "{}", s.format("%Y-%m")),
            PeriodFreq::Week => {
                let end = s + Duration::days(6);
                write!(f, "{}/{}", s.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            PeriodFreq::Day | PeriodFreq::BusinessDay => write!(f, "{}", s.format("%Y-%m-%d")),
            PeriodFreq::Hour => write!(f, "{}", s.format("%Y-%m-%d %H:00")),
            PeriodFreq::Minute => write!(f, "{}", s.format("%Y-%m-%d %H:%M")),
            PeriodFreq::Second => write!(f, "{}", s.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    DateTime(NaiveDateTime),
    Interval(Interval),
    Period(Period),
}

/// Canonical bit pattern so that `0.0 == -0.0` and all NaNs are equal.
fn float_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

fn round_to(v: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision.min(15) as i32);
    let rounded = (v * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        v
    }
}

/// Format a datetime the way the view expects: ISO-8601, milliseconds, UTC.
pub fn format_iso(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Datetime from milliseconds since the Unix epoch.
pub fn datetime_from_millis(ms: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Parse an ISO-8601 style datetime string. A bare date means midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    let trimmed = s.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok().map(midnight)
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(v) => Some(*v),
            Value::Period(p) => Some(p.to_timestamp()),
            _ => None,
        }
    }

    /// Milliseconds since the epoch for datetime and period values.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.as_datetime().map(|dt| dt.and_utc().timestamp_millis())
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Interval(_) => "interval",
            Value::Period(_) => "period",
        }
    }

    /// Native ordering between two non-null values.
    ///
    /// Returns `None` when the values have no meaningful order (a string
    /// against a number, periods of different frequencies, NaN).
    pub fn try_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_))
            | (Value::Float(_), Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Period(a), Value::Period(b)) if a.freq == b.freq => Some(a.start.cmp(&b.start)),
            (Value::Interval(a), Value::Interval(b)) => a.try_cmp(b),
            _ => None,
        }
    }

    /// Convert an inbound JSON value without any column context.
    pub fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        }
    }

    /// Convert to JSON for the view. Non-finite floats cannot be
    /// represented and are reported as a serialization error.
    pub fn to_json(&self, precision: Option<usize>) -> Result<JsonValue> {
        match self {
            Value::Float(v) => {
                let v = precision.map_or(*v, |p| round_to(*v, p));
                serde_json::Number::from_f64(v)
                    .map(JsonValue::Number)
                    .ok_or_else(|| GridError::Serialization(self.to_string()))
            }
            other => Ok(other.to_json_lossy(precision)),
        }
    }

    /// Like `to_json`, but anything unrepresentable becomes its string form.
    pub fn to_json_lossy(&self, precision: Option<usize>) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Int(v) => JsonValue::Number((*v).into()),
            Value::Float(v) => {
                let v = precision.map_or(*v, |p| round_to(*v, p));
                serde_json::Number::from_f64(v)
                    .map(JsonValue::Number)
                    .unwrap_or_else(|| JsonValue::String(self.to_string()))
            }
            Value::Bool(v) => JsonValue::Bool(*v),
            Value::Str(v) => JsonValue::String(v.clone()),
            Value::DateTime(v) => JsonValue::String(format_iso(v)),
            Value::Interval(v) => JsonValue::String(v.to_string()),
            Value::Period(v) => JsonValue::String(v.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "nan"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Interval(v) => write!(f, "{}", v),
            Value::Period(v) => write!(f, "{}", v),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_bits(*a) == float_bits(*b),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Interval(a), Value::Interval(b)) => a == b,
            (Value::Period(a), Value::Period(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(v) => v.hash(state),
            Value::Float(v) => float_bits(*v).hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Str(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
            Value::Interval(v) => v.hash(state),
            Value::Period(v) => v.hash(state),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json_lossy(None).serialize(serializer)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Period> for Value {
    fn from(v: Period) -> Self {
        Value::Period(v)
    }
}

impl From<Interval> for Value {
    fn from(v: Interval) -> Self {
        Value::Interval(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// What a column holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    Data,
    /// Stringified copy of `source`, sorted on when native ordering fails.
    SortHelper { source: String },
    /// Start timestamps of the periods in `source`.
    TimestampHelper { source: String },
}

impl ColumnRole {
    /// Derive this helper's cell from the source cell.
    pub(crate) fn derive(&self, value: &Value) -> Value {
        match self {
            ColumnRole::Data => value.clone(),
            ColumnRole::SortHelper { .. } => Value::Str(value.to_string()),
            ColumnRole::TimestampHelper { .. } => match value.as_datetime() {
                Some(dt) => Value::DateTime(dt),
                None => Value::Null,
            },
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            ColumnRole::Data => None,
            ColumnRole::SortHelper { source } | ColumnRole::TimestampHelper { source } => Some(source),
        }
    }
}

/// A named column of values.
///
/// Categorical columns carry their category list, which is the constrained
/// value domain offered by the filter dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Value>,
    categories: Option<Vec<Value>>,
    role: ColumnRole,
}

impl Column {
    /// Create a data column. Integers mixed with floats are promoted to floats.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values: promote_numeric(values),
            categories: None,
            role: ColumnRole::Data,
        }
    }

    /// Create a categorical column with an explicit category list.
    pub fn categorical(name: impl Into<String>, values: Vec<Value>, categories: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values,
            categories: Some(categories),
            role: ColumnRole::Data,
        }
    }

    pub(crate) fn helper(name: String, role: ColumnRole, source: &[Value]) -> Self {
        let values = source.iter().map(|v| role.derive(v)).collect();
        Column {
            name,
            values,
            categories: None,
            role,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }

    pub fn categories(&self) -> Option<&[Value]> {
        self.categories.as_deref()
    }

    pub fn role(&self) -> &ColumnRole {
        &self.role
    }

    pub fn is_helper(&self) -> bool {
        self.role != ColumnRole::Data
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// New column holding the values at `positions`, in that order.
    pub(crate) fn take(&self, positions: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            values: positions.iter().map(|&p| self.values[p].clone()).collect(),
            categories: self.categories.clone(),
            role: self.role.clone(),
        }
    }
}

fn promote_numeric(values: Vec<Value>) -> Vec<Value> {
    let has_float = values.iter().any(|v| matches!(v, Value::Float(_)));
    let all_numeric = values
        .iter()
        .all(|v| matches!(v, Value::Null | Value::Int(_) | Value::Float(_)));
    if !(has_float && all_numeric) {
        return values;
    }
    values
        .into_iter()
        .map(|v| match v {
            Value::Int(i) => Value::Float(i as f64),
            other => other,
        })
        .collect()
}
