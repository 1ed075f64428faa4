/// Filter engine
///
/// Per-column filter states are turned into row masks by a pure function of
/// (values, state, value table); the view ANDs the masks of all active
/// columns over the unfiltered dataset. Text selections arrive from the view
/// as indices into the value table last sent for that column, so that table
/// must be supplied to resolve them.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::column::{datetime_from_millis, Value};
use crate::sort::is_comparable;

/// The literal `"all"` in a text selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllKeyword {
    All,
}

/// Which entries of a text column's value table are selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextSelection {
    /// Everything, minus the `excluded` indices.
    All(AllKeyword),
    /// Only these indices.
    Indices(Vec<usize>),
}

/// Filter state of one column, as sent by the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterState {
    Slider {
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Bounds in milliseconds since the epoch.
    Date {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean {
        selected: Option<bool>,
    },
    Text {
        selected: Option<TextSelection>,
        excluded: Option<Vec<usize>>,
    },
}

impl FilterState {
    /// Whether the state carries a `selected` entry. Such columns list their
    /// dropdown values from the unfiltered dataset.
    pub fn has_selection(&self) -> bool {
        match self {
            FilterState::Boolean { selected } => selected.is_some(),
            FilterState::Text { selected, .. } => selected.is_some(),
            _ => false,
        }
    }

    /// Whether neither bound of a range filter is set.
    pub fn is_unbounded(&self) -> bool {
        match self {
            FilterState::Slider { min, max } => min.is_none() && max.is_none(),
            FilterState::Date { min, max } => min.is_none() && max.is_none(),
            _ => false,
        }
    }

    pub fn excluded(&self) -> &[usize] {
        match self {
            FilterState::Text { excluded: Some(excluded), .. } => excluded,
            _ => &[],
        }
    }
}

fn resolve(table: &[Value], indices: &[usize]) -> HashSet<Value> {
    indices
        .iter()
        .filter_map(|&i| {
            let value = table.get(i);
            if value.is_none() {
                warn!("Ignoring filter index {} outside a value table of {}", i, table.len());
            }
            value.cloned()
        })
        .collect()
}

/// Row mask for one column. `None` means the state places no constraint.
pub fn column_mask(values: &[Value], state: &FilterState, table: Option<&[Value]>) -> Option<Vec<bool>> {
    match state {
        FilterState::Slider { min, max } => {
            if min.is_none() && max.is_none() {
                return None;
            }
            Some(
                values
                    .iter()
                    .map(|v| match v.as_f64() {
                        Some(x) => min.map_or(true, |m| x >= m) && max.map_or(true, |m| x <= m),
                        None => false,
                    })
                    .collect(),
            )
        }
        FilterState::Date { min, max } => {
            if min.is_none() && max.is_none() {
                return None;
            }
            let min = min.and_then(datetime_from_millis);
            let max = max.and_then(datetime_from_millis);
            Some(
                values
                    .iter()
                    .map(|v| match v.as_datetime() {
                        Some(dt) => min.map_or(true, |m| dt >= m) && max.map_or(true, |m| dt <= m),
                        None => false,
                    })
                    .collect(),
            )
        }
        FilterState::Boolean { selected } => {
            let selected = (*selected)?;
            Some(values.iter().map(|v| v.as_bool() == Some(selected)).collect())
        }
        FilterState::Text { selected, excluded } => {
            let table = table?;
            match selected {
                Some(TextSelection::All(_)) => {
                    let excluded = excluded.as_deref().unwrap_or_default();
                    if excluded.is_empty() {
                        return None;
                    }
                    let drop = resolve(table, excluded);
                    Some(values.iter().map(|v| !drop.contains(v)).collect())
                }
                Some(TextSelection::Indices(indices)) if !indices.is_empty() => {
                    let keep = resolve(table, indices);
                    Some(values.iter().map(|v| keep.contains(v)).collect())
                }
                _ => None,
            }
        }
    }
}

/// AND masks together. No masks means every row passes.
pub fn combine_masks(masks: &[Vec<bool>], rows: usize) -> Vec<bool> {
    let mut combined = vec![true; rows];
    for mask in masks {
        for (keep, &m) in combined.iter_mut().zip(mask.iter()) {
            *keep &= m;
        }
    }
    combined
}

/// Distinct non-null values, sorted natively or by string form when the
/// values have no common order.
pub fn sorted_unique(values: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Value> = values
        .iter()
        .filter(|v| !v.is_null() && seen.insert(*v))
        .cloned()
        .collect();
    if is_comparable(&unique) {
        unique.sort_by(|a, b| a.try_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    } else {
        unique.sort_by_cached_key(|v| v.to_string());
    }
    unique
}

/// Values whose string form contains `needle`, ignoring case.
pub fn search_values(values: &[Value], needle: &str) -> Vec<Value> {
    let needle = needle.to_lowercase();
    values
        .iter()
        .filter(|v| v.to_string().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Reorder dropdown values so that the current selection comes first.
///
/// `table` is the value table the selection indices refer to. Returns the
/// ordered values and how many of them are selected.
pub fn order_for_selection(unique: &[Value], table: &[Value], state: &FilterState) -> (Vec<Value>, usize) {
    let FilterState::Text { selected, excluded } = state else {
        return (unique.to_vec(), 0);
    };
    match selected {
        Some(TextSelection::All(_)) => {
            let excluded_values: Vec<Value> = excluded
                .as_deref()
                .unwrap_or_default()
                .iter()
                .filter_map(|&i| table.get(i).cloned())
                .collect();
            let mut ordered: Vec<Value> = unique
                .iter()
                .filter(|v| !excluded_values.contains(v))
                .cloned()
                .collect();
            let selected_length = ordered.len();
            ordered.extend(excluded_values);
            (ordered, selected_length)
        }
        Some(TextSelection::Indices(indices)) if !indices.is_empty() => {
            let mut ordered: Vec<Value> = indices.iter().filter_map(|&i| table.get(i).cloned()).collect();
            let selected_length = ordered.len();
            let chosen: HashSet<Value> = ordered.iter().cloned().collect();
            let rest: Vec<Value> = unique.iter().filter(|v| !chosen.contains(*v)).cloned().collect();
            ordered.extend(sorted_unique(&rest));
            (ordered, selected_length)
        }
        _ => (unique.to_vec(), 0),
    }
}

/// The selection of `state` re-expressed against a value table laid out by
/// `order_for_selection`: the first `selected_length` of `length` entries
/// are the selected ones.
pub fn rebase_selection(state: &FilterState, selected_length: usize, length: usize) -> FilterState {
    match state {
        FilterState::Text {
            selected: Some(TextSelection::All(keyword)),
            ..
        } => FilterState::Text {
            selected: Some(TextSelection::All(*keyword)),
            excluded: Some((selected_length..length).collect()),
        },
        FilterState::Text {
            selected: Some(TextSelection::Indices(_)),
            excluded,
        } => FilterState::Text {
            selected: Some(TextSelection::Indices((0..selected_length).collect())),
            excluded: excluded.clone(),
        },
        other => other.clone(),
    }
}
