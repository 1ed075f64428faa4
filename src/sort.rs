/// Sort engine
///
/// Sorting produces a permutation of row positions. Nulls (and NaN) always
/// sort last. When a key column holds values with no native order between
/// them, sorting reports `Incomparable` and the caller falls back to a
/// stringified helper column.

use serde::Serialize;
use std::cmp::Ordering;

use crate::column::Value;

/// Current sort criteria. No field means no sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub field: Option<String>,
    pub ascending: bool,
}

impl Default for SortState {
    fn default() -> Self {
        SortState {
            field: None,
            ascending: true,
        }
    }
}

impl SortState {
    pub fn new(field: impl Into<String>, ascending: bool) -> Self {
        SortState {
            field: Some(field.into()),
            ascending,
        }
    }

    pub fn is_active(&self) -> bool {
        self.field.as_deref().is_some_and(|f| !f.is_empty())
    }
}

/// A key column contains values that cannot be ordered against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incomparable;

fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Float(f) => f.is_nan(),
        _ => false,
    }
}

/// Whether every non-null value can be compared with every other.
pub fn is_comparable(values: &[Value]) -> bool {
    let mut present = values.iter().filter(|v| !is_null_like(v));
    let Some(first) = present.next() else {
        return true;
    };
    present.all(|v| first.try_cmp(v).is_some())
}

fn compare_values(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (is_null_like(a), is_null_like(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.try_cmp(b).unwrap_or(Ordering::Equal);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
    }
}

/// Stable sort of row positions by `keys`, primary key first.
pub fn sort_positions(keys: &[&[Value]], ascending: bool) -> Result<Vec<usize>, Incomparable> {
    if !keys.iter().all(|k| is_comparable(k)) {
        return Err(Incomparable);
    }
    let rows = keys.first().map_or(0, |k| k.len());
    let mut positions: Vec<usize> = (0..rows).collect();
    positions.sort_by(|&a, &b| {
        for key in keys {
            let ord = compare_values(&key[a], &key[b], ascending);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(positions)
}
