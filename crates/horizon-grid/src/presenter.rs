//! Row presenters.
//!
//! A [`RowPresenter`] is the lightweight presentation object for one data
//! row. Presenters live in an arena owned by the
//! [`RowMapper`](crate::mapper::RowMapper) and refer to each other through
//! [`PresenterId`] handles: `parent` is a plain back-reference and `children`
//! lists the handles in sibling order.
//!
//! A presenter is *virtual* when it stands in for a row that has not been
//! committed to the data source yet. Virtual presenters are never in the
//! identity map and are skipped by position searches.

use slotmap::new_key_type;

use crate::source::RowId;

new_key_type! {
    /// Handle of a presenter in the mapper's arena.
    ///
    /// Handles go stale when their presenter is disposed; every lookup
    /// through a stale handle fails cleanly.
    pub struct PresenterId;
}

/// Per-row presentation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPresenter {
    row: RowId,
    raw_index: Option<usize>,
    depth: usize,
    parent: Option<PresenterId>,
    children: Vec<PresenterId>,
    is_expanded: bool,
    is_selected: bool,
    is_virtual: bool,
    passes_filter: bool,
    match_hash: Option<u64>,
}

impl RowPresenter {
    pub(crate) fn new(row: RowId, parent: Option<PresenterId>, depth: usize) -> Self {
        Self {
            row,
            raw_index: None,
            depth,
            parent,
            children: Vec::new(),
            is_expanded: false,
            is_selected: false,
            is_virtual: false,
            passes_filter: true,
            match_hash: None,
        }
    }

    pub(crate) fn new_virtual(row: RowId, parent: Option<PresenterId>, depth: usize) -> Self {
        Self {
            is_virtual: true,
            ..Self::new(row, parent, depth)
        }
    }

    /// The data row. For a virtual presenter this is the source's pending row.
    pub fn row(&self) -> RowId {
        self.row
    }

    /// Position in the normalized sequence, `None` when not placed.
    pub fn raw_index(&self) -> Option<usize> {
        self.raw_index
    }

    /// Whether the presenter is in the normalized sequence.
    pub fn is_placed(&self) -> bool {
        self.raw_index.is_some()
    }

    /// Nesting depth, 0 for top-level rows.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<PresenterId> {
        self.parent
    }

    pub fn children(&self) -> &[PresenterId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    /// Whether this presenter stands in for an uncommitted insertion.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Whether the row itself satisfies the active filter. Presenters that
    /// fail it are only kept as ancestors of rows that pass.
    pub fn passes_filter(&self) -> bool {
        self.passes_filter
    }

    /// Precomputed hash of the match column values.
    pub fn match_hash(&self) -> Option<u64> {
        self.match_hash
    }

    pub(crate) fn set_raw_index(&mut self, raw_index: Option<usize>) {
        self.raw_index = raw_index;
    }

    pub(crate) fn set_expanded(&mut self, expanded: bool) {
        self.is_expanded = expanded;
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.is_selected = selected;
    }

    pub(crate) fn set_passes_filter(&mut self, passes: bool) {
        self.passes_filter = passes;
    }

    pub(crate) fn set_match_hash(&mut self, hash: Option<u64>) {
        self.match_hash = hash;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<PresenterId>, depth: usize) {
        self.parent = parent;
        self.depth = depth;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<PresenterId> {
        &mut self.children
    }

    /// Turn a virtual presenter into the presenter of a committed row.
    pub(crate) fn commit(&mut self, row: RowId) {
        self.row = row;
        self.is_virtual = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_new_presenter_is_unplaced_and_collapsed() {
        let mut rows: SlotMap<RowId, ()> = SlotMap::with_key();
        let row = rows.insert(());
        let presenter = RowPresenter::new(row, None, 0);
        assert!(!presenter.is_placed());
        assert!(!presenter.is_expanded());
        assert!(!presenter.is_virtual());
        assert!(presenter.passes_filter());
    }

    #[test]
    fn test_commit_clears_virtual_flag() {
        let mut rows: SlotMap<RowId, ()> = SlotMap::with_key();
        let pending = rows.insert(());
        let committed = rows.insert(());
        let mut presenter = RowPresenter::new_virtual(pending, None, 0);
        assert!(presenter.is_virtual());
        presenter.commit(committed);
        assert!(!presenter.is_virtual());
        assert_eq!(presenter.row(), committed);
    }
}
