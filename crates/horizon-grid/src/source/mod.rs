//! The data source boundary.
//!
//! The grid core never stores row data. It reads rows through the
//! [`DataSource`] trait and learns about mutations from the [`SourceEvent`]s
//! the source queues. The owner of a source mutates it, then drains the
//! queued events into the row manager (see
//! [`RowManager::mutate`](crate::manager::RowManager::mutate)).
//!
//! Adds and edits are two-phase on the source side: a pending add is a
//! detached row that only becomes visible to [`DataSource::children`] on
//! `end_add`, and an open edit buffers values until `end_edit`.

mod memory;
mod value;

pub use memory::MemorySource;
pub use value::CellValue;

use slotmap::new_key_type;

use crate::error::SourceError;

new_key_type! {
    /// Stable identity of a data row.
    pub struct RowId;
}

/// Index of a column in a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub usize);

impl ColumnId {
    /// Create a column id.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The column index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A change notification queued by a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A row is about to be attached.
    RowInserting { row: RowId },
    /// A row (and any descendants it carries) was attached.
    RowInserted { row: RowId },
    /// A row and its subtree were removed. `last_index` is its ordinal among
    /// the siblings of `parent` just before removal.
    RowRemoved {
        row: RowId,
        parent: Option<RowId>,
        last_index: usize,
    },
    /// Cell values of an attached row changed.
    ValueChanged { row: RowId, columns: Vec<ColumnId> },
}

/// A flat or hierarchical collection of rows.
///
/// Reads must reflect the state after every event queued so far has been
/// applied, and [`drain_events`](DataSource::drain_events) hands queued
/// events over in the order they happened.
pub trait DataSource {
    /// Whether rows may have children.
    fn is_hierarchical(&self) -> bool;

    /// Number of columns per row.
    fn column_count(&self) -> usize;

    /// Attached children of `parent` in ordinal order; `None` lists top-level rows.
    fn children(&self, parent: Option<RowId>) -> &[RowId];

    /// Number of attached children of `parent`.
    fn child_count(&self, parent: Option<RowId>) -> usize {
        self.children(parent).len()
    }

    /// Parent of an attached row.
    fn parent(&self, row: RowId) -> Option<RowId>;

    /// Position of an attached row among its siblings.
    fn ordinal(&self, row: RowId) -> Option<usize>;

    /// Whether the row exists and is attached.
    fn contains(&self, row: RowId) -> bool;

    /// Value of one cell. Open edits and pending adds read their buffered values.
    fn value(&self, row: RowId, column: ColumnId) -> CellValue;

    /// Nesting depth of an attached row, 0 for top-level rows.
    fn depth(&self, row: RowId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(row);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.parent(parent);
        }
        depth
    }

    /// Start an append-style insert, returning the detached pending row.
    fn begin_add(&mut self) -> Result<RowId, SourceError>;

    /// Attach the pending row under `parent` at `index`.
    fn end_add(&mut self, parent: Option<RowId>, index: usize) -> Result<RowId, SourceError>;

    /// Discard the pending row.
    fn cancel_add(&mut self) -> Result<(), SourceError>;

    /// Open an in-place edit of an attached row.
    fn begin_edit(&mut self, row: RowId) -> Result<(), SourceError>;

    /// Apply the buffered edit, queueing a `ValueChanged` if anything changed.
    fn end_edit(&mut self) -> Result<(), SourceError>;

    /// Discard the buffered edit.
    fn cancel_edit(&mut self) -> Result<(), SourceError>;

    /// Write one cell. Routed into the pending add or open edit when `row`
    /// is the row under transaction; applied immediately otherwise.
    fn set_value(&mut self, row: RowId, column: ColumnId, value: CellValue) -> Result<(), SourceError>;

    /// Take all queued events.
    fn drain_events(&mut self) -> Vec<SourceEvent>;
}
