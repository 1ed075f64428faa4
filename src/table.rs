/// LiveGrid Dataset Implementation
///
/// A Dataset is a column-oriented table with one or more index levels, any
/// number of data columns, and a correlation id per row. The correlation id
/// is assigned once when the row enters the unfiltered dataset and follows
/// the row through every filtered or sorted copy, so edits made against a
/// copy can be applied to the canonical rows by id rather than by position.

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;

use crate::column::{Column, ColumnRole, Value};
use crate::error::{GridError, Result};

/// Stable row identifier, independent of the logical index.
pub type RowId = u64;

/// Name under which the correlation id travels in serialized rows.
pub const ROW_ID_FIELD: &str = "__row_id";

/// The index value(s) identifying a row, one entry per index level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    pub fn new(levels: Vec<Value>) -> Self {
        IndexKey(levels)
    }

    pub fn single(value: impl Into<Value>) -> Self {
        IndexKey(vec![value.into()])
    }

    pub fn levels(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An array is a multi-level key, anything else a single level.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Array(items) => IndexKey(items.iter().map(Value::from_json).collect()),
            other => IndexKey(vec![Value::from_json(other)]),
        }
    }
}

impl From<Value> for IndexKey {
    fn from(value: Value) -> Self {
        IndexKey(vec![value])
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            return write!(f, "{}", self.0[0]);
        }
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

impl Serialize for IndexKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            self.0[0].serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

/// Builder for datasets.
///
/// # Example
///
/// ```
/// use livegrid::{Column, Dataset, Value};
///
/// let dataset = Dataset::builder()
///     .column(Column::new("A", vec![Value::Int(1), Value::Int(2)]))
///     .column(Column::new("E", vec![Value::from("test"), Value::from("train")]))
///     .build()
///     .unwrap();
/// assert_eq!(dataset.len(), 2);
/// assert_eq!(dataset.index_names(), vec!["index"]);
/// ```
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    index: Vec<Column>,
    columns: Vec<Column>,
}

impl DatasetBuilder {
    /// Add an index level. Levels are added outermost first.
    pub fn index(mut self, level: Column) -> Self {
        self.index.push(level);
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn build(self) -> Result<Dataset> {
        let rows = self
            .index
            .first()
            .or_else(|| self.columns.first())
            .map_or(0, |c| c.len());

        let mut index = self.index;
        if index.is_empty() {
            index.push(Column::new("", (0..rows as i64).map(Value::Int).collect()));
        }
        let multi = index.len() > 1;
        for (level, column) in index.iter_mut().enumerate() {
            if column.name().is_empty() {
                let name = if multi { format!("level_{}", level) } else { "index".to_string() };
                column.rename(name);
            }
        }

        let mut seen = HashSet::new();
        for column in index.iter().chain(self.columns.iter()) {
            if column.len() != rows {
                return Err(GridError::InvalidDataset(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    rows
                )));
            }
            if column.name() == ROW_ID_FIELD {
                return Err(GridError::InvalidDataset(format!("'{}' is a reserved name", ROW_ID_FIELD)));
            }
            if !seen.insert(column.name().to_string()) {
                return Err(GridError::InvalidDataset(format!("duplicate field '{}'", column.name())));
            }
        }

        Ok(Dataset {
            index,
            columns: self.columns,
            row_ids: (0..rows as RowId).collect(),
            next_row_id: rows as RowId,
        })
    }
}

/// Column-oriented table with index levels and correlation ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    index: Vec<Column>,
    columns: Vec<Column>,
    row_ids: Vec<RowId>,
    next_row_id: RowId,
}

impl Dataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    pub fn index_levels(&self) -> &[Column] {
        &self.index
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.index.iter().map(|c| c.name()).collect()
    }

    pub fn is_multi_index(&self) -> bool {
        self.index.len() > 1
    }

    /// Level number of an index field.
    pub fn index_level(&self, name: &str) -> Option<usize> {
        self.index.iter().position(|c| c.name() == name)
    }

    /// Data columns, helpers excluded.
    pub fn data_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_helper())
    }

    pub fn data_column_names(&self) -> Vec<&str> {
        self.data_columns().map(|c| c.name()).collect()
    }

    /// Index level or column, helpers included.
    pub fn field(&self, name: &str) -> Option<&Column> {
        self.index
            .iter()
            .chain(self.columns.iter())
            .find(|c| c.name() == name)
    }

    pub fn values(&self, name: &str) -> Result<&[Value]> {
        self.field(name)
            .map(|c| c.values())
            .ok_or_else(|| GridError::ColumnNotFound(name.to_string()))
    }

    pub fn row_ids(&self) -> &[RowId] {
        &self.row_ids
    }

    pub fn index_key(&self, position: usize) -> IndexKey {
        IndexKey(self.index.iter().map(|c| c.values()[position].clone()).collect())
    }

    pub fn position_of(&self, id: RowId) -> Option<usize> {
        self.row_ids.iter().position(|&r| r == id)
    }

    /// Positions of every row whose index equals `key` on all levels.
    pub fn positions_for_key(&self, key: &IndexKey) -> Vec<usize> {
        if key.len() != self.index.len() {
            return Vec::new();
        }
        (0..self.len())
            .filter(|&pos| {
                self.index
                    .iter()
                    .zip(key.levels())
                    .all(|(level, v)| &level.values()[pos] == v)
            })
            .collect()
    }

    /// Data values of a row in column order, helpers excluded.
    pub fn row_values(&self, position: usize) -> Vec<Value> {
        self.data_columns().map(|c| c.values()[position].clone()).collect()
    }

    /// New dataset holding the rows at `positions`, in that order.
    pub fn take(&self, positions: &[usize]) -> Dataset {
        Dataset {
            index: self.index.iter().map(|c| c.take(positions)).collect(),
            columns: self.columns.iter().map(|c| c.take(positions)).collect(),
            row_ids: positions.iter().map(|&p| self.row_ids[p]).collect(),
            next_row_id: self.next_row_id,
        }
    }

    /// Set one cell. Helper columns derived from the field follow.
    pub fn set_value(&mut self, position: usize, field: &str, value: Value) -> Result<()> {
        if position >= self.len() {
            return Err(GridError::InvalidDataset(format!(
                "row {} out of range [0, {})",
                position,
                self.len()
            )));
        }
        let target = self
            .index
            .iter_mut()
            .chain(self.columns.iter_mut())
            .find(|c| c.name() == field && !c.is_helper())
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        target.values_mut()[position] = value.clone();

        for helper in self.columns.iter_mut().filter(|c| c.role().source() == Some(field)) {
            let derived = helper.role().derive(&value);
            helper.values_mut()[position] = derived;
        }
        Ok(())
    }

    /// Reserve the next correlation id.
    pub(crate) fn allocate_row_id(&mut self) -> RowId {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    /// Append a row. `values` are the data column values in column order.
    pub(crate) fn push_row(&mut self, id: RowId, key: &IndexKey, values: &[Value]) -> Result<()> {
        if key.len() != self.index.len() {
            return Err(GridError::ColumnMismatch(format!(
                "expected {} index level(s), got {}",
                self.index.len(),
                key.len()
            )));
        }
        let data_count = self.data_columns().count();
        if values.len() != data_count {
            return Err(GridError::ColumnMismatch(format!(
                "expected {} value(s), got {}",
                data_count,
                values.len()
            )));
        }

        for (level, v) in self.index.iter_mut().zip(key.levels()) {
            level.values_mut().push(v.clone());
        }
        let mut data = values.iter();
        let mut pushed: Vec<(String, Value)> = Vec::new();
        for column in self.columns.iter_mut().filter(|c| !c.is_helper()) {
            let v = data.next().cloned().unwrap_or(Value::Null);
            pushed.push((column.name().to_string(), v.clone()));
            column.values_mut().push(v);
        }
        for helper in self.columns.iter_mut().filter(|c| c.is_helper()) {
            let source = helper.role().source().unwrap_or_default().to_string();
            let source_value = key
                .levels()
                .iter()
                .zip(self.index.iter())
                .find(|(_, level)| level.name() == source)
                .map(|(v, _)| v.clone())
                .or_else(|| pushed.iter().find(|(n, _)| *n == source).map(|(_, v)| v.clone()))
                .unwrap_or(Value::Null);
            let derived = helper.role().derive(&source_value);
            helper.values_mut().push(derived);
        }

        self.row_ids.push(id);
        self.next_row_id = self.next_row_id.max(id + 1);
        Ok(())
    }

    /// Remove every row whose id is in `ids`. Returns how many were removed.
    pub(crate) fn remove_ids(&mut self, ids: &[RowId]) -> usize {
        let drop: HashSet<RowId> = ids.iter().copied().collect();
        let keep: Vec<usize> = (0..self.len())
            .filter(|&p| !drop.contains(&self.row_ids[p]))
            .collect();
        let removed = self.len() - keep.len();
        if removed > 0 {
            let next = self.next_row_id;
            *self = self.take(&keep);
            self.next_row_id = next;
        }
        removed
    }

    pub(crate) fn helper(&self, role: &ColumnRole) -> Option<&Column> {
        self.columns.iter().find(|c| c.role() == role)
    }

    /// Name of the helper column with `role`, created if missing.
    pub(crate) fn ensure_helper(&mut self, role: ColumnRole) -> Result<String> {
        if let Some(existing) = self.columns.iter().find(|c| *c.role() == role) {
            return Ok(existing.name().to_string());
        }
        let source = role.source().unwrap_or_default().to_string();
        let suffix = match role {
            ColumnRole::SortHelper { .. } => "str",
            ColumnRole::TimestampHelper { .. } => "ts",
            ColumnRole::Data => return Err(GridError::ColumnNotFound(source)),
        };
        let mut name = format!("__{}_{}", source, suffix);
        while self.field(&name).is_some() {
            name.push('_');
        }
        let values = self.values(&source)?.to_vec();
        self.columns.push(Column::helper(name.clone(), role, &values));
        Ok(name)
    }

    /// Copy with helper columns stripped, as handed back to callers.
    pub fn without_helpers(&self) -> Dataset {
        Dataset {
            index: self.index.clone(),
            columns: self.data_columns().cloned().collect(),
            row_ids: self.row_ids.clone(),
            next_row_id: self.next_row_id,
        }
    }

    /// Single-level index holding only integers.
    pub fn is_integer_index(&self) -> bool {
        self.index.len() == 1 && self.index[0].values().iter().all(|v| matches!(v, Value::Int(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::builder()
            .column(Column::new("A", vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
            .column(Column::new("E", vec![Value::from("a"), Value::Int(5), Value::from("c")]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_generates_range_index() {
        let ds = sample();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.index_names(), vec!["index"]);
        assert_eq!(ds.values("index").unwrap(), &[Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert_eq!(ds.row_ids(), &[0, 1, 2]);
        assert!(ds.is_integer_index());
    }

    #[test]
    fn test_builder_names_multi_levels() {
        let ds = Dataset::builder()
            .index(Column::new("", vec![Value::from("bar"), Value::from("bar")]))
            .index(Column::new("", vec![Value::from("one"), Value::from("two")]))
            .column(Column::new("x", vec![Value::Int(1), Value::Int(2)]))
            .build()
            .unwrap();
        assert_eq!(ds.index_names(), vec!["level_0", "level_1"]);
        assert!(ds.is_multi_index());
        assert!(!ds.is_integer_index());
    }

    #[test]
    fn test_builder_rejects_bad_shapes() {
        let err = Dataset::builder()
            .column(Column::new("A", vec![Value::Int(1)]))
            .column(Column::new("B", vec![]))
            .build();
        assert!(matches!(err, Err(GridError::InvalidDataset(_))));

        let err = Dataset::builder()
            .column(Column::new("A", vec![Value::Int(1)]))
            .column(Column::new("A", vec![Value::Int(1)]))
            .build();
        assert!(matches!(err, Err(GridError::InvalidDataset(_))));
    }

    #[test]
    fn test_take_preserves_row_ids() {
        let ds = sample();
        let taken = ds.take(&[2, 0]);
        assert_eq!(taken.row_ids(), &[2, 0]);
        assert_eq!(taken.values("A").unwrap(), &[Value::Int(3), Value::Int(1)]);
        assert_eq!(taken.position_of(0), Some(1));
    }

    #[test]
    fn test_helper_name_avoids_user_columns() {
        let mut ds = Dataset::builder()
            .column(Column::new("E", vec![Value::Int(5), Value::from("b")]))
            .column(Column::new("__E_str", vec![Value::from("keep"), Value::from("keep")]))
            .build()
            .unwrap();
        let helper = ds.ensure_helper(ColumnRole::SortHelper { source: "E".to_string() }).unwrap();
        assert_ne!(helper, "__E_str");
        assert_eq!(ds.values(&helper).unwrap(), &[Value::from("5"), Value::from("b")]);
        assert_eq!(ds.values("__E_str").unwrap()[0], Value::from("keep"));
    }

    #[test]
    fn test_helpers_follow_edits_and_pushes() {
        let mut ds = sample();
        let helper = ds.ensure_helper(ColumnRole::SortHelper { source: "E".to_string() }).unwrap();
        assert_eq!(ds.values(&helper).unwrap()[1], Value::from("5"));
        // second call reuses the existing helper
        let again = ds.ensure_helper(ColumnRole::SortHelper { source: "E".to_string() }).unwrap();
        assert_eq!(helper, again);

        ds.set_value(1, "E", Value::Int(7)).unwrap();
        assert_eq!(ds.values(&helper).unwrap()[1], Value::from("7"));

        let id = ds.allocate_row_id();
        ds.push_row(id, &IndexKey::single(3i64), &[Value::Int(4), Value::from("d")]).unwrap();
        assert_eq!(ds.values(&helper).unwrap()[3], Value::from("d"));
        assert_eq!(ds.data_column_names(), vec!["A", "E"]);
        assert_eq!(ds.without_helpers().field(&helper), None);
    }

    #[test]
    fn test_remove_ids_keeps_counter() {
        let mut ds = sample();
        assert_eq!(ds.remove_ids(&[2]), 1);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.allocate_row_id(), 3);
    }

    #[test]
    fn test_positions_for_key() {
        let ds = Dataset::builder()
            .index(Column::new("first", vec![Value::from("bar"), Value::from("bar"), Value::from("baz")]))
            .index(Column::new("second", vec![Value::from("one"), Value::from("two"), Value::from("one")]))
            .column(Column::new("x", vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
            .build()
            .unwrap();
        let key = IndexKey::new(vec![Value::from("bar"), Value::from("two")]);
        assert_eq!(ds.positions_for_key(&key), vec![1]);
        assert!(ds.positions_for_key(&IndexKey::single("bar")).is_empty());
        assert_eq!(serde_json::to_value(&key).unwrap(), serde_json::json!(["bar", "two"]));
        assert_eq!(serde_json::to_value(IndexKey::single(4i64)).unwrap(), serde_json::json!(4));
    }
}
