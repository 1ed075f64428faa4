/// Messages exchanged between a grid widget and its view
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, Mutex, PoisonError};

use crate::columns::{ColumnDescriptor, ColumnStore};
use crate::filter::FilterState;
use crate::table::RowId;
use crate::viewport::RowRange;

/// Field names may arrive as numbers when a dataset has integer column labels.
fn field_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid field name {}", other))),
    }
}

fn optional_field_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s)),
        JsonValue::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("invalid field name {}", other))),
    }
}

/// Messages sent from the view to the widget
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewMessage {
    /// A cell was edited. `unfiltered_index` is the row's correlation id.
    EditCell {
        #[serde(deserialize_with = "field_name")]
        column: String,
        row_index: JsonValue,
        unfiltered_index: RowId,
        value: JsonValue,
    },

    /// Rows selected in the view, as working positions
    ChangeSelection { rows: Vec<usize> },

    ChangeViewport { top: i64, bottom: i64 },

    /// Duplicate the last row
    AddRow {},

    /// Remove the selected rows
    RemoveRow {},

    /// The filter dropdown of `field` scrolled
    ChangeFilterViewport {
        #[serde(deserialize_with = "field_name")]
        field: String,
        top: i64,
        bottom: i64,
    },

    ChangeSort {
        #[serde(default, deserialize_with = "optional_field_name")]
        sort_field: Option<String>,
        sort_ascending: bool,
    },

    ShowFilterDropdown {
        #[serde(deserialize_with = "field_name")]
        field: String,
        #[serde(default)]
        search_val: Option<String>,
    },

    ChangeFilter {
        #[serde(deserialize_with = "field_name")]
        field: String,
        #[serde(default)]
        filter_info: Option<FilterState>,
    },
}

impl ViewMessage {
    /// Every `type` tag the widget understands.
    pub const TYPES: [&'static str; 9] = [
        "edit_cell",
        "change_selection",
        "change_viewport",
        "add_row",
        "remove_row",
        "change_filter_viewport",
        "change_sort",
        "show_filter_dropdown",
        "change_filter",
    ];

    pub fn is_known_type(kind: &str) -> bool {
        Self::TYPES.contains(&kind)
    }
}

/// Widget state mirrored to the view after every push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncedState {
    /// Table-orient serialization of the pushed row window
    pub df_json: JsonValue,
    pub df_range: RowRange,
    pub row_count: usize,
    pub viewport_range: RowRange,
    pub multi_index: bool,
    pub disable_grouping: bool,
    pub sort_field: Option<String>,
    pub sort_ascending: bool,
    pub grid_options: Map<String, JsonValue>,
    pub precision: usize,
    pub show_toolbar: bool,
}

/// Messages sent from the widget to the view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetMessage {
    /// Rebuild the grid from the synced state
    DrawTable,

    UpdateDataView {
        columns: ColumnStore,
        triggered_by: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        scroll_to_row: Option<usize>,
    },

    /// New page or search result for a text filter dropdown
    UpdateDataViewFilter {
        field: String,
        col_info: ColumnDescriptor,
    },

    ColumnMinMaxUpdated {
        field: String,
        col_info: ColumnDescriptor,
    },

    ShowError {
        error_msg: String,
        triggered_by: String,
    },

    ChangeSelection { rows: Vec<usize> },

    ChangeGridOption {
        option_name: String,
        option_value: JsonValue,
    },

    SyncState(SyncedState),
}

impl WidgetMessage {
    /// The `type` tag this message serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetMessage::DrawTable => "draw_table",
            WidgetMessage::UpdateDataView { .. } => "update_data_view",
            WidgetMessage::UpdateDataViewFilter { .. } => "update_data_view_filter",
            WidgetMessage::ColumnMinMaxUpdated { .. } => "column_min_max_updated",
            WidgetMessage::ShowError { .. } => "show_error",
            WidgetMessage::ChangeSelection { .. } => "change_selection",
            WidgetMessage::ChangeGridOption { .. } => "change_grid_option",
            WidgetMessage::SyncState(_) => "sync_state",
        }
    }
}

/// Outbound side of the widget/view connection.
pub trait Channel: Send {
    fn send(&mut self, message: WidgetMessage);
}

impl<F> Channel for F
where
    F: FnMut(WidgetMessage) + Send,
{
    fn send(&mut self, message: WidgetMessage) {
        self(message)
    }
}

/// Channel that keeps every message it is given. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    messages: Arc<Mutex<Vec<WidgetMessage>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    pub fn messages(&self) -> Vec<WidgetMessage> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take all buffered messages.
    pub fn drain(&self) -> Vec<WidgetMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Buffered messages with the given `type` tag.
    pub fn of_kind(&self, kind: &str) -> Vec<WidgetMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.kind() == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Channel for Outbox {
    fn send(&mut self, message: WidgetMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}
