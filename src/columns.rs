/// Column metadata store
///
/// One `ColumnDescriptor` per index level and data column, in display order.
/// The descriptor doubles as the `col_info` object the view consumes, so the
/// filter dropdown fields (`values`, `length`, `value_range`, bounds) live
/// here too and are updated in place as a single column's filter control is
/// used.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::column::Value;
use crate::dtype::ColumnType;
use crate::filter::FilterState;
use crate::table::Dataset;
use crate::viewport::RowRange;

/// Value-domain constraint of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraints {
    #[serde(rename = "enum")]
    pub enum_values: Vec<Value>,
}

/// Derived description of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub field: String,
    pub id: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub position: usize,
    pub is_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_display_text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub first_index: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub last_index: bool,
    pub editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_info: Option<FilterState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slider_min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slider_max: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_max: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_range: Option<RowRange>,
    /// Display options passed through to the view untouched.
    #[serde(flatten)]
    pub options: Map<String, JsonValue>,
}

impl ColumnDescriptor {
    fn new(name: &str, column_type: ColumnType, position: usize) -> Self {
        ColumnDescriptor {
            name: name.to_string(),
            field: name.to_string(),
            id: name.to_string(),
            column_type,
            position,
            is_index: false,
            level: None,
            index_display_text: None,
            first_index: false,
            last_index: false,
            editable: column_type.is_editable(),
            constraints: None,
            filter_info: None,
            slider_min: None,
            slider_max: None,
            filter_min: None,
            filter_max: None,
            values: None,
            selected_length: None,
            length: None,
            value_range: None,
            options: Map::new(),
        }
    }

    /// Apply display options. An `editable` key is consumed rather than
    /// passed through.
    fn apply_options(&mut self, options: &Map<String, JsonValue>) {
        for (key, value) in options {
            if key == "editable" {
                if let Some(editable) = value.as_bool() {
                    self.editable = editable && !self.is_index;
                }
            } else {
                self.options.insert(key.clone(), value.clone());
            }
        }
    }

    /// Categories of an `any` column.
    pub fn categories(&self) -> Option<&[Value]> {
        self.constraints.as_ref().map(|c| c.enum_values.as_slice())
    }

    /// Drop all dropdown and filter state.
    pub fn reset_filter(&mut self) {
        self.filter_info = None;
        self.slider_min = None;
        self.slider_max = None;
        self.filter_min = None;
        self.filter_max = None;
        self.values = None;
        self.selected_length = None;
        self.length = None;
        self.value_range = None;
    }
}

/// Descriptors for every visible field, in position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStore {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnStore {
    /// Build descriptors for `dataset`.
    ///
    /// `column_options` apply to every column, `column_definitions` are
    /// keyed by field name and win over the shared options.
    pub fn build(
        dataset: &Dataset,
        column_options: &Map<String, JsonValue>,
        column_definitions: &Map<String, JsonValue>,
    ) -> Self {
        let mut columns = Vec::new();
        let levels = dataset.index_levels();
        let multi = levels.len() > 1;

        for (level, column) in levels.iter().enumerate() {
            let column_type = ColumnType::infer(column.values(), column.categories());
            let mut desc = ColumnDescriptor::new(column.name(), column_type, columns.len());
            desc.is_index = true;
            desc.editable = false;
            desc.level = multi.then_some(level);
            desc.index_display_text = Some(column.name().to_string());
            desc.first_index = level == 0;
            desc.last_index = level == levels.len() - 1;
            columns.push(desc);
        }

        for column in dataset.data_columns() {
            let column_type = ColumnType::infer(column.values(), column.categories());
            let mut desc = ColumnDescriptor::new(column.name(), column_type, columns.len());
            if let Some(categories) = column.categories() {
                desc.constraints = Some(Constraints {
                    enum_values: categories.to_vec(),
                });
            }
            columns.push(desc);
        }

        for desc in columns.iter_mut() {
            desc.apply_options(column_options);
            if let Some(JsonValue::Object(definition)) = column_definitions.get(&desc.name) {
                desc.apply_options(definition);
            }
        }

        ColumnStore { columns }
    }

    /// Carry filter state over from a previous store for fields that kept
    /// their name and type.
    pub fn carry_filters(&mut self, previous: &ColumnStore) {
        for desc in self.columns.iter_mut() {
            if let Some(old) = previous.get(&desc.name) {
                if old.column_type == desc.column_type {
                    desc.filter_info = old.filter_info.clone();
                    desc.values = old.values.clone();
                    desc.selected_length = old.selected_length;
                    desc.length = old.length;
                    desc.value_range = old.value_range;
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ColumnDescriptor> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for ColumnStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for desc in &self.columns {
            map.serialize_entry(&desc.name, desc)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::builder()
            .index(Column::new("first", vec![Value::from("bar"), Value::from("baz")]))
            .index(Column::new("second", vec![Value::from("one"), Value::from("two")]))
            .column(Column::new("A", vec![Value::Float(1.0), Value::Float(2.0)]))
            .column(Column::categorical(
                "E",
                vec![Value::from("test"), Value::from("train")],
                vec![Value::from("test"), Value::from("train")],
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_descriptors() {
        let store = ColumnStore::build(&dataset(), &Map::new(), &Map::new());
        assert_eq!(store.names(), vec!["first", "second", "A", "E"]);

        let first = store.get("first").unwrap();
        assert!(first.is_index && first.first_index && !first.last_index);
        assert_eq!(first.level, Some(0));
        assert!(!first.editable);

        let a = store.get("A").unwrap();
        assert_eq!(a.column_type, ColumnType::Number);
        assert_eq!(a.position, 2);
        assert!(a.editable);

        let e = store.get("E").unwrap();
        assert_eq!(e.column_type, ColumnType::Any);
        assert_eq!(e.categories().unwrap().len(), 2);
    }

    #[test]
    fn test_options_and_definitions() {
        let options = json!({"width": 100}).as_object().cloned().unwrap();
        let definitions = json!({"A": {"editable": false, "width": 50}})
            .as_object()
            .cloned()
            .unwrap();
        let store = ColumnStore::build(&dataset(), &options, &definitions);

        let a = store.get("A").unwrap();
        assert!(!a.editable);
        assert_eq!(a.options.get("width"), Some(&json!(50)));
        assert!(!a.options.contains_key("editable"));
        assert_eq!(store.get("E").unwrap().options.get("width"), Some(&json!(100)));
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let store = ColumnStore::build(&dataset(), &Map::new(), &Map::new());
        let json = serde_json::to_string(&store).unwrap();
        let first = json.find("\"first\"").unwrap();
        let e = json.find("\"E\"").unwrap();
        assert!(first < e);

        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["E"]["constraints"]["enum"], json!(["test", "train"]));
        assert_eq!(value["A"]["type"], json!("number"));
        assert!(value["A"].get("filter_info").is_none());
    }
}
