/// LiveGrid - Viewport-paged Data Grid Engine
///
/// The host side of an interactive data grid: a dataset is viewed through
/// sort and per-column filters, paged to the view one window of rows at a
/// time, edited in place, and every state change is reported as an event.
///
/// ```
/// use livegrid::{Column, Dataset, GridConfig, GridWidget, Outbox, Value};
///
/// let dataset = Dataset::builder()
///     .column(Column::new("A", vec![Value::Int(3), Value::Int(1), Value::Int(2)]))
///     .build()
///     .unwrap();
/// let outbox = Outbox::new();
/// let mut grid = GridWidget::with_config(dataset, GridConfig::default(), outbox.clone()).unwrap();
/// grid.change_sort(Some("A"), true).unwrap();
/// assert_eq!(grid.get_changed_df().values("A").unwrap()[0], Value::Int(1));
/// ```

pub mod column;
pub mod dtype;
pub mod table;
pub mod columns;
pub mod sort;
pub mod filter;
pub mod viewport;
pub mod view;
pub mod events;
pub mod config;
pub mod messages;
pub mod serialize;
pub mod widget;
pub mod error;

pub use column::{Column, ColumnRole, Interval, IntervalClosed, Period, PeriodFreq, Value};
pub use dtype::{ColumnType, FilterKind, UniqueStrategy};
pub use table::{Dataset, DatasetBuilder, IndexKey, RowId, ROW_ID_FIELD};
pub use columns::{ColumnDescriptor, ColumnStore, Constraints};
pub use sort::SortState;
pub use filter::{FilterState, TextSelection};
pub use viewport::{Pager, RowRange, Viewport};
pub use view::DataView;
pub use events::{Event, EventHandler, EventKind, EventSelector, ListenerRegistry, Source};
pub use config::{GridConfig, GridOverrides};
pub use messages::{Channel, Outbox, SyncedState, ViewMessage, WidgetMessage};
pub use widget::GridWidget;
pub use error::{GridError, Result};

// WebSocket server modules - only when server feature is enabled
#[cfg(feature = "server")]
pub mod websocket;
#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    fn grid(dataset: Dataset) -> (GridWidget, Outbox) {
        let outbox = Outbox::new();
        let widget = GridWidget::with_config(dataset, GridConfig::default(), outbox.clone()).unwrap();
        outbox.drain();
        (widget, outbox)
    }

    fn sample() -> Dataset {
        Dataset::builder()
            .column(Column::new("A", ints(&[1, 2, 3, 4])))
            .column(Column::new("D", ints(&[3, 3, 3, 3])))
            .column(Column::new(
                "E",
                ["test", "train", "foo", "bar"].into_iter().map(Value::from).collect(),
            ))
            .build()
            .unwrap()
    }

    fn last_sync(outbox: &Outbox) -> SyncedState {
        outbox
            .messages()
            .into_iter()
            .rev()
            .find_map(|m| match m {
                WidgetMessage::SyncState(state) => Some(state),
                _ => None,
            })
            .unwrap()
    }

    /// Every working row maps to exactly one unfiltered row with equal values.
    fn assert_correlated(widget: &GridWidget) {
        let working = widget.view().working();
        let unfiltered = widget.view().unfiltered();
        for (position, id) in working.row_ids().iter().enumerate() {
            let matches: Vec<usize> = unfiltered
                .row_ids()
                .iter()
                .enumerate()
                .filter(|(_, r)| *r == id)
                .map(|(p, _)| p)
                .collect();
            assert_eq!(matches.len(), 1);
            assert_eq!(working.row_values(position), unfiltered.row_values(matches[0]));
        }
    }

    #[test]
    fn test_duplicate_last_row() {
        let (mut widget, _outbox) = grid(sample());
        let key = widget.add_row(None).unwrap();
        let df = widget.get_changed_df();
        assert_eq!(df.len(), 5);
        assert_eq!(key, IndexKey::single(4i64));
        assert_eq!(df.index_key(4), IndexKey::single(4i64));
        assert_eq!(df.row_values(4), df.row_values(3));
        assert_correlated(&widget);
    }

    #[test]
    fn test_text_filter_selection() {
        let (mut widget, _outbox) = grid(sample());
        let desc = widget.show_filter_dropdown("E", None).unwrap();
        assert_eq!(
            desc.values,
            Some(vec![Value::from("bar"), Value::from("foo"), Value::from("test"), Value::from("train")])
        );
        let state: FilterState = serde_json::from_value(json!({"type": "text", "selected": [2, 3]})).unwrap();
        widget.change_filter("E", Some(state)).unwrap();

        let df = widget.get_changed_df();
        assert_eq!(df.len(), 2);
        assert_eq!(df.values("E").unwrap(), &[Value::from("test"), Value::from("train")]);
    }

    #[test]
    fn test_filter_round_trip() {
        let (mut widget, _outbox) = grid(sample());
        widget.change_filter("A", Some(FilterState::Slider { min: Some(2.0), max: Some(3.0) })).unwrap();
        assert_eq!(widget.get_changed_df().len(), 2);
        widget.clear_filter("A").unwrap();
        let df = widget.get_changed_df();
        assert_eq!(df.row_ids(), widget.get_unchanged_df().row_ids());
        assert_correlated(&widget);
    }

    #[test]
    fn test_slider_filter_independent_of_sort() {
        let (mut widget, _outbox) = grid(sample());
        widget.change_sort(Some("A"), false).unwrap();
        widget.change_filter("A", Some(FilterState::Slider { min: Some(2.0), max: Some(3.0) })).unwrap();
        let df = widget.get_changed_df();
        assert_eq!(df.values("A").unwrap(), &[Value::Int(3), Value::Int(2)]);

        let (mut unsorted, _outbox) = grid(sample());
        unsorted.change_filter("A", Some(FilterState::Slider { min: Some(2.0), max: Some(3.0) })).unwrap();
        assert_eq!(unsorted.get_changed_df().len(), 2);
    }

    #[test]
    fn test_multi_index_inner_sort_disables_grouping() {
        let dataset = Dataset::builder()
            .index(Column::new("first", ["bar", "bar", "baz", "baz"].into_iter().map(Value::from).collect()))
            .index(Column::new("second", ["one", "two", "one", "two"].into_iter().map(Value::from).collect()))
            .column(Column::new("x", ints(&[1, 2, 3, 4])))
            .build()
            .unwrap();
        let (mut widget, outbox) = grid(dataset);

        widget.change_sort(Some("second"), true).unwrap();
        assert!(last_sync(&outbox).disable_grouping);
        assert!(last_sync(&outbox).multi_index);

        widget.change_sort(Some("first"), true).unwrap();
        assert!(!last_sync(&outbox).disable_grouping);
    }

    #[test]
    fn test_edit_cell_by_row_id() {
        let (mut widget, outbox) = grid(sample());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        widget.on(
            EventKind::CellEdited.into(),
            Arc::new(move |event: &Event, _: &GridWidget| sink.lock().unwrap().push(event.clone())),
        );

        widget.handle_message(&json!({
            "type": "edit_cell", "column": "D", "row_index": 2, "unfiltered_index": 2, "value": -5
        }));

        assert_eq!(widget.get_changed_df().values("D").unwrap()[2], Value::Int(-5));
        assert_correlated(&widget);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::CellEdited { old, new, .. } => {
                assert_eq!(old, &Value::Int(3));
                assert_eq!(new, &Value::Int(-5));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(outbox.of_kind("show_error").is_empty());
    }

    #[test]
    fn test_edit_reaches_filtered_out_rows() {
        let (mut widget, _outbox) = grid(sample());
        widget.change_filter("A", Some(FilterState::Slider { min: Some(3.0), max: None })).unwrap();
        widget.edit_cell(&IndexKey::single(0i64), "D", Value::Int(-5)).unwrap();
        assert_correlated(&widget);
        widget.clear_filter("A").unwrap();
        assert_eq!(widget.get_changed_df().values("D").unwrap()[0], Value::Int(-5));
    }

    #[test]
    fn test_sort_reverses() {
        let dataset = Dataset::builder()
            .column(Column::new("n", ints(&[5, 1, 4, 2, 3])))
            .build()
            .unwrap();
        let (mut widget, _outbox) = grid(dataset);
        widget.change_sort(Some("n"), true).unwrap();
        let mut ascending = widget.get_changed_df().row_ids().to_vec();
        widget.change_sort(Some("n"), false).unwrap();
        ascending.reverse();
        assert_eq!(widget.get_changed_df().row_ids(), ascending.as_slice());
    }

    #[test]
    fn test_viewport_clamp() {
        let (mut widget, _outbox) = grid(sample());
        widget.change_viewport(-10, 2).unwrap();
        assert_eq!(widget.viewport(), Viewport { top: 0, bottom: 2 });
        widget.change_viewport(50, 80).unwrap();
        let viewport = widget.viewport();
        assert!(viewport.top <= 4 && viewport.bottom <= 4);
        let range = widget.df_range().unwrap();
        assert!(range.end() <= 4);
    }

    #[test]
    fn test_repeated_viewport_pushes_once() {
        let dataset = Dataset::builder()
            .column(Column::new("n", (0..2000).map(Value::Int).collect()))
            .build()
            .unwrap();
        let (mut widget, outbox) = grid(dataset);
        widget.change_viewport(900, 950).unwrap();
        widget.change_viewport(900, 950).unwrap();
        assert_eq!(outbox.of_kind("sync_state").len(), 1);
        assert_eq!(widget.df_range(), Some(RowRange(800, 1000)));
    }

    #[test]
    fn test_events_are_serializable_for_listeners() {
        let (mut widget, _outbox) = grid(sample());
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = names.clone();
        widget.on(
            EventSelector::All,
            Arc::new(move |event: &Event, _: &GridWidget| {
                sink.lock().unwrap().push(serde_json::to_value(event).unwrap()["name"].clone());
            }),
        );
        widget.remove_rows(Some(vec![IndexKey::single(0i64)])).unwrap();
        let names = names.lock().unwrap();
        assert_eq!(names.as_slice(), &[json!("json_updated"), json!("row_removed")]);
    }
}
