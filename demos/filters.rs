/// Filter Example
///
/// This example demonstrates:
/// - Slider, boolean and text filters
/// - Listing filter dropdown values and searching them
/// - Paging through a long text filter list

use livegrid::{Column, Dataset, FilterState, GridConfig, GridWidget, Outbox, Value};
use serde_json::json;

fn main() {
    println!("=== LiveGrid Filter Example ===\n");

    let cities = ["Berlin", "Lisbon", "Oslo", "Paris", "Rome", "Vienna"];
    let rows = 600;
    let dataset = Dataset::builder()
        .column(Column::new("city", (0..rows).map(|i| Value::from(cities[i % cities.len()])).collect()))
        .column(Column::new("sku", (0..rows).map(|i| Value::from(format!("SKU-{:04}", i))).collect()))
        .column(Column::new("qty", (0..rows as i64).map(|i| Value::Int(i % 50)).collect()))
        .column(Column::new("in_stock", (0..rows).map(|i| Value::Bool(i % 3 != 0)).collect()))
        .build()
        .unwrap();

    let outbox = Outbox::new();
    let mut grid = GridWidget::with_config(dataset, GridConfig::default(), outbox.clone()).unwrap();

    // 1. Slider filter
    println!("1. Quantity between 10 and 19...");
    let desc = grid.show_filter_dropdown("qty", None).unwrap();
    println!("   slider bounds: {:?} .. {:?}", desc.slider_min, desc.slider_max);
    grid.change_filter("qty", Some(FilterState::Slider { min: Some(10.0), max: Some(19.0) })).unwrap();
    println!("   {} rows\n", grid.get_changed_df().len());

    // 2. Boolean filter
    println!("2. In stock only...");
    grid.change_filter("in_stock", Some(FilterState::Boolean { selected: Some(true) })).unwrap();
    println!("   {} rows\n", grid.get_changed_df().len());

    // 3. Text filter by selection
    println!("3. Cities...");
    let desc = grid.show_filter_dropdown("city", None).unwrap();
    println!("   choices: {:?}", desc.values.unwrap_or_default());
    let state: FilterState = serde_json::from_value(json!({"type": "text", "selected": [2, 3]})).unwrap();
    grid.change_filter("city", Some(state)).unwrap();
    println!("   {} rows\n", grid.get_changed_df().len());

    // 4. Search a long list and page through it
    println!("4. Searching SKUs...");
    let desc = grid.show_filter_dropdown("sku", Some("SKU-01")).unwrap();
    println!("   {} matches", desc.length.unwrap_or(0));
    let desc = grid.show_filter_dropdown("sku", None).unwrap();
    println!("   {} SKUs, showing {:?}", desc.length.unwrap_or(0), desc.value_range);
    grid.change_filter_viewport("sku", 350, 380).unwrap();
    println!("   scrolled to {:?}\n", grid.columns().get("sku").and_then(|d| d.value_range));

    // 5. Clear everything
    println!("5. Clearing filters...");
    for field in ["qty", "in_stock", "city"] {
        grid.clear_filter(field).unwrap();
    }
    println!("   {} rows", grid.get_changed_df().len());
    println!("   {} messages sent to the view\n", outbox.len());

    println!("=== Example Complete ===");
}
