/// Table-orient serialization of a row window
///
/// The view receives rows as `{"schema": {...}, "data": [...]}`. Each row
/// object carries its index level(s), its data columns and the correlation
/// id under `__row_id`. Values go out in display form: intervals as strings,
/// periods and datetimes as ISO-8601 timestamps, floats rounded to the
/// configured precision.

use log::warn;
use serde_json::{json, Map, Value as JsonValue};

use crate::column::Value;
use crate::columns::{ColumnDescriptor, ColumnStore};
use crate::error::{GridError, Result};
use crate::table::{Dataset, ROW_ID_FIELD};
use crate::viewport::RowRange;

fn schema(dataset: &Dataset, columns: &ColumnStore) -> JsonValue {
    let fields: Vec<JsonValue> = columns
        .iter()
        .map(|desc| {
            let mut field = json!({"name": desc.name, "type": desc.column_type});
            if let Some(constraints) = &desc.constraints {
                field["constraints"] = json!(constraints);
            }
            field
        })
        .collect();
    json!({
        "fields": fields,
        "primaryKey": dataset.index_names(),
    })
}

fn row(
    dataset: &Dataset,
    fields: &[(&ColumnDescriptor, &[Value])],
    position: usize,
    precision: usize,
    strict: bool,
) -> Result<JsonValue> {
    let mut object = Map::new();
    for (desc, values) in fields {
        let display = desc.column_type.display_value(&values[position]);
        let json = if strict {
            display.to_json(Some(precision))?
        } else {
            display.to_json_lossy(Some(precision))
        };
        object.insert(desc.name.clone(), json);
    }
    object.insert(ROW_ID_FIELD.to_string(), json!(dataset.row_ids()[position]));
    Ok(JsonValue::Object(object))
}

fn build(dataset: &Dataset, columns: &ColumnStore, range: RowRange, precision: usize, strict: bool) -> Result<JsonValue> {
    let fields = columns
        .iter()
        .map(|desc| dataset.values(&desc.name).map(|values| (desc, values)))
        .collect::<Result<Vec<_>>>()?;

    let end = range.end().min(dataset.len());
    let start = range.start().min(end);
    let data = (start..end)
        .map(|position| row(dataset, &fields, position, precision, strict))
        .collect::<Result<Vec<_>>>()?;

    Ok(json!({
        "schema": schema(dataset, columns),
        "data": data,
    }))
}

/// Serialize rows `range` of `dataset`.
///
/// Values that cannot be represented (non-finite floats) make the strict
/// pass fail; the window is then serialized again with those values in
/// their string form.
pub fn serialize_window(dataset: &Dataset, columns: &ColumnStore, range: RowRange, precision: usize) -> Result<JsonValue> {
    match build(dataset, columns, range, precision, true) {
        Err(GridError::Serialization(value)) => {
            warn!("Value {} is not representable, retrying with string forms", value);
            build(dataset, columns, range, precision, false)
        }
        other => other,
    }
}
