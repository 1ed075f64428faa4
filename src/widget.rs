/// Grid widget: host API and message dispatch
///
/// A `GridWidget` wraps a `DataView` with a configuration, an outbound
/// channel to its view and its event listeners. Host-side callers use the
/// methods below; messages from the view go through `handle_message`, which
/// routes them to the same operations.
///
/// Operations run to completion one at a time (`&mut self`). To share a
/// widget across threads, put it behind a `Mutex`.

use log::{debug, error};
use serde_json::{Map, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::column::Value;
use crate::columns::{ColumnDescriptor, ColumnStore};
use crate::config::{self, GridConfig, GridOverrides};
use crate::error::Result;
use crate::events::{self, Event, EventHandler, EventSelector, ListenerRegistry, Source};
use crate::filter::FilterState;
use crate::messages::{Channel, SyncedState, ViewMessage, WidgetMessage};
use crate::serialize::serialize_window;
use crate::sort::SortState;
use crate::table::{Dataset, IndexKey, RowId};
use crate::view::DataView;
use crate::viewport::{RowRange, Viewport};

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

/// An interactive grid over one dataset.
pub struct GridWidget {
    id: u64,
    config: GridConfig,
    view: DataView,
    /// The dataset as it was before the first mutation.
    unchanged: Dataset,
    listeners: ListenerRegistry,
    channel: Box<dyn Channel>,
}

impl std::fmt::Debug for GridWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridWidget")
            .field("id", &self.id)
            .field("rows", &self.view.working().len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl GridWidget {
    /// Create a widget using the process-wide default config.
    pub fn new(dataset: Dataset, channel: impl Channel + 'static) -> Result<Self> {
        Self::with_config(dataset, config::defaults(), channel)
    }

    /// Create a widget with the process-wide defaults and `overrides` on top.
    pub fn show_grid(dataset: Dataset, overrides: &GridOverrides, channel: impl Channel + 'static) -> Result<Self> {
        Self::with_config(dataset, config::defaults().with_overrides(overrides), channel)
    }

    /// Create a widget with an explicit config.
    pub fn with_config(dataset: Dataset, config: GridConfig, channel: impl Channel + 'static) -> Result<Self> {
        let view = DataView::new(dataset.clone(), &config)?;
        let mut widget = GridWidget {
            id: NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed),
            config,
            view,
            unchanged: dataset,
            listeners: ListenerRegistry::new(),
            channel: Box::new(channel),
        };
        widget.redraw("init")?;
        widget.notify(Event::InstanceCreated);
        Ok(widget)
    }

    /// Process-unique id of this widget.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The underlying data view.
    pub fn view(&self) -> &DataView {
        &self.view
    }

    pub fn columns(&self) -> &ColumnStore {
        self.view.columns()
    }

    pub fn sort_state(&self) -> &SortState {
        self.view.sort_state()
    }

    pub fn viewport(&self) -> Viewport {
        self.view.viewport()
    }

    pub fn df_range(&self) -> Option<RowRange> {
        self.view.df_range()
    }

    /// The filtered, sorted and edited data, as the view shows it.
    pub fn get_changed_df(&self) -> Dataset {
        self.view.working().without_helpers()
    }

    /// The dataset the widget was created with, before any edit.
    pub fn get_unchanged_df(&self) -> &Dataset {
        &self.unchanged
    }

    pub fn get_selected_df(&self) -> Dataset {
        self.view.selected()
    }

    /// Selected rows as positions in the working data.
    pub fn get_selected_rows(&self) -> Vec<usize> {
        self.view.selection().to_vec()
    }

    pub fn on(&mut self, selector: EventSelector, handler: EventHandler) {
        self.listeners.on(selector, handler);
    }

    pub fn off(&mut self, selector: EventSelector, handler: Option<&EventHandler>) {
        self.listeners.off(selector, handler);
    }

    fn send(&mut self, message: WidgetMessage) {
        self.channel.send(message);
    }

    /// Dispatch to instance listeners, then process-wide ones.
    fn notify(&mut self, event: Event) {
        let kind = event.kind();
        let local = self.listeners.handlers_for(kind);
        let global = events::global_handlers(kind);
        for handler in local.iter().chain(global.iter()) {
            handler(&event, self);
        }
    }

    /// Send `show_error` for rejected user input and hand the result back.
    fn report<T>(&mut self, triggered_by: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_user_error() {
                self.send(WidgetMessage::ShowError {
                    error_msg: err.to_string(),
                    triggered_by: triggered_by.to_string(),
                });
            }
        }
        result
    }

    fn synced_state(&self, df_json: JsonValue, range: RowRange) -> SyncedState {
        let sort = self.view.sort_state();
        let viewport = self.view.viewport();
        SyncedState {
            df_json,
            df_range: range,
            row_count: self.view.working().len(),
            viewport_range: RowRange(viewport.top, viewport.bottom),
            multi_index: self.view.working().is_multi_index(),
            disable_grouping: self.view.disable_grouping(),
            sort_field: sort.field.clone(),
            sort_ascending: sort.ascending,
            grid_options: self.config.grid_options.clone(),
            precision: self.config.precision,
            show_toolbar: self.config.show_toolbar,
        }
    }

    /// Push the current row window. Without `force`, nothing is sent when
    /// the window is the one already pushed.
    fn update_table(&mut self, force: bool, triggered_by: &str, scroll_to_row: Option<usize>) -> Result<()> {
        let Some(range) = self.view.next_range(force) else {
            return Ok(());
        };
        let df_json = serialize_window(self.view.working(), self.view.columns(), range, self.config.precision)?;
        self.view.mark_pushed(range);

        let state = self.synced_state(df_json, range);
        self.send(WidgetMessage::SyncState(state));
        self.notify(Event::JsonUpdated {
            triggered_by: triggered_by.to_string(),
            range,
        });
        self.send(WidgetMessage::UpdateDataView {
            columns: self.view.columns().clone(),
            triggered_by: triggered_by.to_string(),
            scroll_to_row,
        });
        Ok(())
    }

    /// Rebuild column metadata and have the view redraw from scratch.
    fn redraw(&mut self, triggered_by: &str) -> Result<()> {
        self.view.rebuild_columns(&self.config);
        self.update_table(true, triggered_by, None)?;
        self.send(WidgetMessage::DrawTable);
        Ok(())
    }

    /// Replace the dataset. Filters, sort, selection and caches are reset.
    pub fn set_dataset(&mut self, dataset: Dataset) -> Result<()> {
        self.view = DataView::new(dataset.clone(), &self.config)?;
        self.unchanged = dataset;
        self.redraw("set_dataset")
    }

    pub fn set_precision(&mut self, precision: usize) -> Result<()> {
        self.config.precision = precision;
        self.redraw("set_precision")
    }

    pub fn set_show_toolbar(&mut self, show_toolbar: bool) -> Result<()> {
        self.config.show_toolbar = show_toolbar;
        self.redraw("set_show_toolbar")
    }

    pub fn set_column_options(&mut self, column_options: Map<String, JsonValue>) -> Result<()> {
        self.config.column_options = column_options;
        self.redraw("set_column_options")
    }

    pub fn set_column_definitions(&mut self, column_definitions: Map<String, JsonValue>) -> Result<()> {
        self.config.column_definitions = column_definitions;
        self.redraw("set_column_definitions")
    }

    /// Change one grid option in place, without rebuilding the grid.
    pub fn change_grid_option(&mut self, name: &str, value: JsonValue) {
        self.config.grid_options.insert(name.to_string(), value.clone());
        self.send(WidgetMessage::ChangeGridOption {
            option_name: name.to_string(),
            option_value: value,
        });
    }

    /// Add a row. Without fields the last row is duplicated (integer
    /// indexes only); with fields, the row keyed by the given index values
    /// is inserted or overwritten. Returns the row's index key.
    pub fn add_row(&mut self, fields: Option<Vec<(String, Value)>>) -> Result<IndexKey> {
        self.add_row_from(fields, Source::Api)
    }

    fn add_row_from(&mut self, fields: Option<Vec<(String, Value)>>, source: Source) -> Result<IndexKey> {
        let result = match &fields {
            None => self.view.duplicate_last_row(),
            Some(fields) => self.view.add_row(fields),
        };
        let added = self.report("add_row", result)?;
        self.update_table(true, "add_row", Some(added.position))?;
        self.notify(Event::RowAdded {
            index: added.key.clone(),
            source,
        });
        Ok(added.key)
    }

    /// Remove rows by index key, or the selected rows when `keys` is `None`.
    /// Returns the keys removed.
    pub fn remove_rows(&mut self, keys: Option<Vec<IndexKey>>) -> Result<Vec<IndexKey>> {
        self.remove_rows_from(keys, Source::Api)
    }

    fn remove_rows_from(&mut self, keys: Option<Vec<IndexKey>>, source: Source) -> Result<Vec<IndexKey>> {
        let result = self.view.remove_rows(keys.as_deref());
        let removed = self.report("remove_row", result)?;
        if removed.keys.is_empty() {
            debug!("No rows to remove");
            return Ok(removed.keys);
        }
        self.update_table(true, "remove_row", None)?;
        self.notify(Event::RowRemoved {
            indices: removed.keys.clone(),
            source,
        });
        Ok(removed.keys)
    }

    /// Set `column` on every row indexed by `key`.
    pub fn edit_cell(&mut self, key: &IndexKey, column: &str, value: Value) -> Result<()> {
        let result = self.view.edit_cell_by_key(key, column, value);
        let edit = self.report("edit_cell", result)?;
        self.update_table(true, "edit_cell", None)?;
        self.notify(Event::CellEdited {
            index: edit.index,
            column: edit.column,
            old: edit.old,
            new: edit.new,
            source: Source::Api,
        });
        Ok(())
    }

    fn edit_cell_by_id(&mut self, id: RowId, column: &str, value: Value) -> Result<()> {
        let result = self.view.edit_cell(id, column, value);
        let edit = self.report("edit_cell", result)?;
        self.update_table(true, "edit_cell", None)?;
        self.notify(Event::CellEdited {
            index: edit.index,
            column: edit.column,
            old: edit.old,
            new: edit.new,
            source: Source::Gui,
        });
        Ok(())
    }

    /// Select the rows with the given index keys and tell the view.
    pub fn change_selection(&mut self, keys: &[IndexKey]) -> Result<()> {
        let result = self.view.positions_for_keys(keys);
        let rows = self.report("change_selection", result)?;
        self.select(rows.clone(), Source::Api);
        self.send(WidgetMessage::ChangeSelection { rows });
        Ok(())
    }

    fn select(&mut self, rows: Vec<usize>, source: Source) {
        let (old, new) = self.view.set_selection(rows);
        self.notify(Event::SelectionChanged { old, new, source });
    }

    pub fn change_sort(&mut self, field: Option<&str>, ascending: bool) -> Result<()> {
        let old = self.view.set_sort(field.map(str::to_string), ascending)?;
        self.update_table(true, "change_sort", None)?;
        let new = self.view.sort_state().clone();
        self.notify(Event::SortChanged { old, new });
        Ok(())
    }

    /// Set a column's filter. `None` clears it.
    pub fn change_filter(&mut self, field: &str, state: Option<FilterState>) -> Result<()> {
        self.view.set_filter(field, state)?;
        self.update_table(true, "change_filter", None)?;
        self.notify(Event::FilterChanged {
            column: field.to_string(),
        });
        Ok(())
    }

    pub fn clear_filter(&mut self, field: &str) -> Result<()> {
        self.change_filter(field, None)
    }

    /// List a column's filter values and send them to the view. Returns
    /// the updated descriptor.
    pub fn show_filter_dropdown(&mut self, field: &str, search: Option<&str>) -> Result<ColumnDescriptor> {
        let listing = self.view.list_unique_values(field, search)?;
        let message = if listing.searched {
            WidgetMessage::UpdateDataViewFilter {
                field: field.to_string(),
                col_info: listing.descriptor.clone(),
            }
        } else {
            WidgetMessage::ColumnMinMaxUpdated {
                field: field.to_string(),
                col_info: listing.descriptor.clone(),
            }
        };
        self.send(message);
        self.notify(Event::FilterDropdownShown {
            column: field.to_string(),
        });
        Ok(listing.descriptor)
    }

    pub fn change_viewport(&mut self, top: i64, bottom: i64) -> Result<()> {
        let Some((old, new)) = self.view.set_viewport(top, bottom) else {
            debug!("Viewport ({}, {}) unchanged", top, bottom);
            return Ok(());
        };
        self.update_table(false, "change_viewport", None)?;
        self.notify(Event::ViewportChanged {
            old: RowRange(old.top, old.bottom),
            new: RowRange(new.top, new.bottom),
        });
        Ok(())
    }

    pub fn change_filter_viewport(&mut self, field: &str, top: i64, bottom: i64) -> Result<()> {
        let Some(page) = self.view.set_filter_viewport(field, top, bottom)? else {
            return Ok(());
        };
        self.send(WidgetMessage::UpdateDataViewFilter {
            field: field.to_string(),
            col_info: page.descriptor,
        });
        self.notify(Event::TextFilterViewportChanged {
            column: field.to_string(),
            old: page.old,
            new: page.new,
        });
        Ok(())
    }

    /// Handle a raw text frame from the view.
    pub fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<JsonValue>(text) {
            Ok(message) => self.handle_message(&message),
            Err(e) => error!("Failed to parse view message: {}", e),
        }
    }

    /// Handle a message from the view. Messages without a known `type` are
    /// ignored; failures are logged and never leave the widget unusable.
    pub fn handle_message(&mut self, message: &JsonValue) {
        let Some(kind) = message.get("type").and_then(JsonValue::as_str) else {
            debug!("Ignoring view message without a type");
            return;
        };
        if !ViewMessage::is_known_type(kind) {
            debug!("Ignoring view message of unknown type '{}'", kind);
            return;
        }
        let parsed = match serde_json::from_value::<ViewMessage>(message.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Malformed '{}' message: {}", kind, e);
                return;
            }
        };
        if let Err(e) = self.dispatch(parsed) {
            if e.is_user_error() {
                debug!("Rejected '{}' message: {}", kind, e);
            } else {
                error!("Error handling '{}' message: {}", kind, e);
            }
        }
    }

    fn dispatch(&mut self, message: ViewMessage) -> Result<()> {
        match message {
            ViewMessage::EditCell {
                column,
                unfiltered_index,
                value,
                ..
            } => self.edit_cell_by_id(unfiltered_index, &column, Value::from_json(&value)),
            ViewMessage::ChangeSelection { rows } => {
                self.select(rows, Source::Gui);
                Ok(())
            }
            ViewMessage::ChangeViewport { top, bottom } => self.change_viewport(top, bottom),
            ViewMessage::AddRow {} => self.add_row_from(None, Source::Gui).map(|_| ()),
            ViewMessage::RemoveRow {} => self.remove_rows_from(None, Source::Gui).map(|_| ()),
            ViewMessage::ChangeFilterViewport { field, top, bottom } => {
                self.change_filter_viewport(&field, top, bottom)
            }
            ViewMessage::ChangeSort {
                sort_field,
                sort_ascending,
            } => self.change_sort(sort_field.as_deref(), sort_ascending),
            ViewMessage::ShowFilterDropdown { field, search_val } => {
                self.show_filter_dropdown(&field, search_val.as_deref()).map(|_| ())
            }
            ViewMessage::ChangeFilter { field, filter_info } => self.change_filter(&field, filter_info),
        }
    }
}
