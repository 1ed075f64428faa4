/// Viewport paging
///
/// The view reports the rows it shows as a `(top, bottom)` viewport. What is
/// actually serialized is a wider window around `top`, so small scrolls are
/// served from what the view already holds.

use serde::{Deserialize, Serialize};

/// Half-open row interval `[start, end)`, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowRange(pub usize, pub usize);

impl RowRange {
    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> usize {
        self.1
    }

    pub fn len(&self) -> usize {
        self.1.saturating_sub(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rows visible in the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Viewport {
    pub top: usize,
    pub bottom: usize,
}

impl Viewport {
    /// Viewport with both ends clamped into `[0, rows]`.
    pub fn clamped(top: i64, bottom: i64, rows: usize) -> Self {
        let clamp = |v: i64| v.clamp(0, rows as i64) as usize;
        let top = clamp(top);
        let bottom = clamp(bottom).max(top);
        Viewport { top, bottom }
    }

    pub fn width(&self) -> usize {
        self.bottom - self.top
    }

    /// After the dataset shrinks below `top`, move the viewport so it ends
    /// at the last row, keeping its width where possible.
    pub fn shift_into(&self, rows: usize) -> Viewport {
        if rows >= self.top {
            return *self;
        }
        let top = rows.saturating_sub(self.width());
        Viewport {
            top,
            bottom: top + self.width().min(rows),
        }
    }
}

/// Margin arithmetic for serialized windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Pager { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// `[top - page, top + page)`, saturating and clamped into `[0, rows]`.
    pub fn expand(&self, top: i64, rows: usize) -> RowRange {
        let page = self.page_size as i64;
        let rows = rows as i64;
        let start = top.saturating_sub(page).clamp(0, rows);
        let end = top.saturating_add(page).clamp(start, rows);
        RowRange(start as usize, end as usize)
    }
}
