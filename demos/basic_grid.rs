/// Basic Grid Example
///
/// This example demonstrates:
/// - Building a dataset and opening a grid widget over it
/// - Sorting, scrolling and editing through the host API
/// - Listening to the events the widget emits

use livegrid::{Column, Dataset, Event, EventSelector, GridConfig, GridWidget, IndexKey, Value};
use std::sync::Arc;

fn main() {
    println!("=== LiveGrid Basic Grid Example ===\n");

    // 1. Build a dataset
    println!("1. Building dataset...");
    let dataset = Dataset::builder()
        .column(Column::new(
            "name",
            ["Alice", "Bob", "Charlie", "Dana"].into_iter().map(Value::from).collect(),
        ))
        .column(Column::new("age", vec![Value::Int(30), Value::Null, Value::Int(25), Value::Int(41)]))
        .column(Column::new(
            "score",
            vec![Value::Float(88.5), Value::Float(92.25), Value::Float(79.0), Value::Float(95.125)],
        ))
        .build()
        .unwrap();
    println!("   Dataset has {} rows\n", dataset.len());

    // 2. Open a widget; messages for the view are printed
    println!("2. Opening grid...");
    let channel = |message: livegrid::WidgetMessage| println!("   -> {}", message.kind());
    let mut grid = GridWidget::with_config(dataset, GridConfig::default(), channel).unwrap();
    grid.on(
        EventSelector::All,
        Arc::new(|event: &Event, _: &GridWidget| {
            println!("   event: {}", serde_json::to_string(event).unwrap());
        }),
    );
    println!();

    // 3. Sort by score, descending
    println!("3. Sorting by score...");
    grid.change_sort(Some("score"), false).unwrap();
    let df = grid.get_changed_df();
    for (position, name) in df.values("name").unwrap().iter().enumerate() {
        println!("   {}: {} ({})", position, name, df.values("score").unwrap()[position]);
    }
    println!();

    // 4. Edit a cell
    println!("4. Editing Bob's age...");
    grid.edit_cell(&IndexKey::single(1i64), "age", Value::Int(35)).unwrap();
    println!();

    // 5. Rejected edits are reported, not applied
    println!("5. Trying a non-numeric age...");
    if let Err(e) = grid.edit_cell(&IndexKey::single(1i64), "age", Value::from("old")) {
        println!("   rejected: {}\n", e);
    }

    // 6. Add and remove rows
    println!("6. Duplicating the last row, then removing it...");
    let key = grid.add_row(None).unwrap();
    println!("   added row {}", key);
    grid.remove_rows(Some(vec![key])).unwrap();
    println!("   {} rows remain\n", grid.get_changed_df().len());

    println!("=== Example Complete ===");
}
