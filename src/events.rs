/// Event notification
///
/// Every state change a widget makes is described by one `Event`. Handlers
/// subscribe either on a single widget or process-wide, for one kind, a set
/// of kinds, or everything. A handler runs at most once per registry for a
/// given event, however many of its subscriptions match.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::column::Value;
use crate::sort::SortState;
use crate::table::IndexKey;
use crate::viewport::RowRange;
use crate::widget::GridWidget;

/// Whether a change came from the host API or the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Api,
    Gui,
}

/// A state change, serialized with its kind under `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Event {
    InstanceCreated,
    CellEdited {
        index: IndexKey,
        column: String,
        old: Value,
        new: Value,
        source: Source,
    },
    RowAdded {
        index: IndexKey,
        source: Source,
    },
    RowRemoved {
        indices: Vec<IndexKey>,
        source: Source,
    },
    SelectionChanged {
        old: Vec<usize>,
        new: Vec<usize>,
        source: Source,
    },
    ViewportChanged {
        old: RowRange,
        new: RowRange,
    },
    SortChanged {
        old: SortState,
        new: SortState,
    },
    FilterChanged {
        column: String,
    },
    FilterDropdownShown {
        column: String,
    },
    TextFilterViewportChanged {
        column: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        old: Option<RowRange>,
        new: RowRange,
    },
    JsonUpdated {
        triggered_by: String,
        range: RowRange,
    },
}

/// Kind of an event, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InstanceCreated,
    CellEdited,
    RowAdded,
    RowRemoved,
    SelectionChanged,
    ViewportChanged,
    SortChanged,
    FilterChanged,
    FilterDropdownShown,
    TextFilterViewportChanged,
    JsonUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InstanceCreated => "instance_created",
            EventKind::CellEdited => "cell_edited",
            EventKind::RowAdded => "row_added",
            EventKind::RowRemoved => "row_removed",
            EventKind::SelectionChanged => "selection_changed",
            EventKind::ViewportChanged => "viewport_changed",
            EventKind::SortChanged => "sort_changed",
            EventKind::FilterChanged => "filter_changed",
            EventKind::FilterDropdownShown => "filter_dropdown_shown",
            EventKind::TextFilterViewportChanged => "text_filter_viewport_changed",
            EventKind::JsonUpdated => "json_updated",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InstanceCreated => EventKind::InstanceCreated,
            Event::CellEdited { .. } => EventKind::CellEdited,
            Event::RowAdded { .. } => EventKind::RowAdded,
            Event::RowRemoved { .. } => EventKind::RowRemoved,
            Event::SelectionChanged { .. } => EventKind::SelectionChanged,
            Event::ViewportChanged { .. } => EventKind::ViewportChanged,
            Event::SortChanged { .. } => EventKind::SortChanged,
            Event::FilterChanged { .. } => EventKind::FilterChanged,
            Event::FilterDropdownShown { .. } => EventKind::FilterDropdownShown,
            Event::TextFilterViewportChanged { .. } => EventKind::TextFilterViewportChanged,
            Event::JsonUpdated { .. } => EventKind::JsonUpdated,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelector {
    /// Every event.
    All,
    Kind(EventKind),
    Kinds(Vec<EventKind>),
}

impl From<EventKind> for EventSelector {
    fn from(kind: EventKind) -> Self {
        EventSelector::Kind(kind)
    }
}

impl From<Vec<EventKind>> for EventSelector {
    fn from(kinds: Vec<EventKind>) -> Self {
        EventSelector::Kinds(kinds)
    }
}

/// Event callback. Receives the event and the widget that emitted it.
pub type EventHandler = Arc<dyn Fn(&Event, &GridWidget) + Send + Sync>;

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Subscriptions of one scope.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    wildcard: Vec<EventHandler>,
    by_kind: HashMap<EventKind, Vec<EventHandler>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("wildcard", &self.wildcard.len())
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn push_unique(list: &mut Vec<EventHandler>, handler: &EventHandler) {
    if !list.iter().any(|h| same_handler(h, handler)) {
        list.push(handler.clone());
    }
}

fn remove_from(list: &mut Vec<EventHandler>, handler: Option<&EventHandler>) {
    match handler {
        Some(handler) => list.retain(|h| !same_handler(h, handler)),
        None => list.clear(),
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        ListenerRegistry::default()
    }

    /// Subscribe `handler`. Subscribing the same handler twice to the same
    /// kind is a no-op.
    pub fn on(&mut self, selector: EventSelector, handler: EventHandler) {
        match selector {
            EventSelector::All => push_unique(&mut self.wildcard, &handler),
            EventSelector::Kind(kind) => push_unique(self.by_kind.entry(kind).or_default(), &handler),
            EventSelector::Kinds(kinds) => {
                for kind in kinds {
                    push_unique(self.by_kind.entry(kind).or_default(), &handler);
                }
            }
        }
    }

    /// Unsubscribe `handler`, or every handler of the selected kinds when
    /// `handler` is `None`. Unknown pairs are ignored.
    pub fn off(&mut self, selector: EventSelector, handler: Option<&EventHandler>) {
        match selector {
            EventSelector::All => remove_from(&mut self.wildcard, handler),
            EventSelector::Kind(kind) => {
                if let Some(list) = self.by_kind.get_mut(&kind) {
                    remove_from(list, handler);
                }
            }
            EventSelector::Kinds(kinds) => {
                for kind in kinds {
                    if let Some(list) = self.by_kind.get_mut(&kind) {
                        remove_from(list, handler);
                    }
                }
            }
        }
        self.by_kind.retain(|_, list| !list.is_empty());
    }

    /// Handlers for `kind`: wildcard subscriptions first, each handler once.
    pub fn handlers_for(&self, kind: EventKind) -> Vec<EventHandler> {
        let mut handlers: Vec<EventHandler> = Vec::new();
        let named = self.by_kind.get(&kind).map(|l| l.as_slice()).unwrap_or_default();
        for handler in self.wildcard.iter().chain(named.iter()) {
            push_unique(&mut handlers, handler);
        }
        handlers
    }

    pub fn is_empty(&self) -> bool {
        self.wildcard.is_empty() && self.by_kind.is_empty()
    }
}

fn global_registry() -> &'static RwLock<ListenerRegistry> {
    static GLOBAL: OnceLock<RwLock<ListenerRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(ListenerRegistry::new()))
}

/// Subscribe to events from every widget in the process.
pub fn on(selector: EventSelector, handler: EventHandler) {
    global_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .on(selector, handler);
}

/// Remove process-wide subscriptions.
pub fn off(selector: EventSelector, handler: Option<&EventHandler>) {
    global_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .off(selector, handler);
}

/// Process-wide handlers for `kind`. The lock is released before any
/// handler runs, so handlers may subscribe or unsubscribe.
pub(crate) fn global_handlers(kind: EventKind) -> Vec<EventHandler> {
    global_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .handlers_for(kind)
}
