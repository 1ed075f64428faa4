/// Grid configuration
///
/// `GridConfig` is a plain value: every widget owns its own copy. A
/// process-wide default instance backs `GridWidget::new` and `show_grid`;
/// changing it affects widgets constructed afterwards, never existing ones.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::error::Result;

/// Rows on each side of the viewport top that are serialized.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default decimal precision of serialized floats.
pub const DEFAULT_PRECISION: usize = 5;

/// Options passed to the grid renderer when none are configured.
pub fn default_grid_options() -> Map<String, JsonValue> {
    let options = json!({
        "fullWidthRows": true,
        "syncColumnCellResize": true,
        "forceFitColumns": true,
        "defaultColumnWidth": 150,
        "rowHeight": 28,
        "enableColumnReorder": false,
        "enableTextSelectionOnCells": true,
        "editable": true,
        "autoEdit": false,
        "explicitInitialization": true,
        "maxVisibleRows": 15,
        "minVisibleRows": 8,
        "sortable": true,
        "filterable": true,
        "highlightSelectedCell": false,
        "highlightSelectedRow": true,
    });
    match options {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

/// Complete configuration of one grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub show_toolbar: bool,
    pub precision: usize,
    pub grid_options: Map<String, JsonValue>,
    /// Applied to every column descriptor.
    pub column_options: Map<String, JsonValue>,
    /// Per-field options, keyed by field name.
    pub column_definitions: Map<String, JsonValue>,
    pub page_size: usize,
    pub filter_page_size: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            show_toolbar: false,
            precision: DEFAULT_PRECISION,
            grid_options: default_grid_options(),
            column_options: Map::new(),
            column_definitions: Map::new(),
            page_size: DEFAULT_PAGE_SIZE,
            filter_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Optional per-instance settings layered over a base config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOverrides {
    pub show_toolbar: Option<bool>,
    pub precision: Option<usize>,
    pub grid_options: Option<Map<String, JsonValue>>,
    pub column_options: Option<Map<String, JsonValue>>,
    pub column_definitions: Option<Map<String, JsonValue>>,
}

impl GridConfig {
    /// Parse a config document. Missing keys take their defaults.
    pub fn from_json_str(text: &str) -> Result<GridConfig> {
        Ok(serde_json::from_str(text)?)
    }

    /// Copy of `self` with `overrides` applied. Grid options are merged key
    /// by key; every other field is replaced.
    pub fn with_overrides(&self, overrides: &GridOverrides) -> GridConfig {
        let mut config = self.clone();
        if let Some(show_toolbar) = overrides.show_toolbar {
            config.show_toolbar = show_toolbar;
        }
        if let Some(precision) = overrides.precision {
            config.precision = precision;
        }
        if let Some(grid_options) = &overrides.grid_options {
            for (name, value) in grid_options {
                config.grid_options.insert(name.clone(), value.clone());
            }
        }
        if let Some(column_options) = &overrides.column_options {
            config.column_options = column_options.clone();
        }
        if let Some(column_definitions) = &overrides.column_definitions {
            config.column_definitions = column_definitions.clone();
        }
        config
    }
}

fn process_defaults() -> &'static RwLock<GridConfig> {
    static DEFAULTS: OnceLock<RwLock<GridConfig>> = OnceLock::new();
    DEFAULTS.get_or_init(|| RwLock::new(GridConfig::default()))
}

/// Snapshot of the process-wide defaults.
pub fn defaults() -> GridConfig {
    process_defaults()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the given fields of the process-wide defaults. Unlike
/// `with_overrides`, grid options given here replace the whole set.
pub fn set_defaults(overrides: &GridOverrides) {
    let mut defaults = process_defaults().write().unwrap_or_else(PoisonError::into_inner);
    if let Some(grid_options) = &overrides.grid_options {
        defaults.grid_options = grid_options.clone();
    }
    let without_grid = GridOverrides {
        grid_options: None,
        ..overrides.clone()
    };
    *defaults = defaults.with_overrides(&without_grid);
}

/// Set a single default grid option.
pub fn set_grid_option(name: &str, value: JsonValue) {
    process_defaults()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .grid_options
        .insert(name.to_string(), value);
}

/// Restore the built-in defaults.
pub fn reset_defaults() {
    *process_defaults().write().unwrap_or_else(PoisonError::into_inner) = GridConfig::default();
}
