//! Flattening the presenter tree into the visible row sequence.
//!
//! [`RowNormalizer`] keeps the depth-first, expansion-aware list of placed
//! presenters and their raw indices. A presenter is placed iff every
//! ancestor is expanded (and placed). Expanding splices a row's visible
//! descendants in right after it; collapsing removes the contiguous run of
//! deeper rows that follows it.

use horizon_grid_core::logging::targets;

use crate::error::{GridError, Result};
use crate::mapper::{CompareFn, FilterFn, RowChange, RowMapper};
use crate::presenter::PresenterId;
use crate::source::{DataSource, SourceEvent};

/// The visible, flattened row sequence.
#[derive(Debug)]
pub struct RowNormalizer<S> {
    mapper: RowMapper<S>,
    rows: Vec<PresenterId>,
    initial_expand_depth: usize,
}

impl<S: DataSource> RowNormalizer<S> {
    /// Flatten `mapper`, expanding rows shallower than `initial_expand_depth`.
    pub fn new(mapper: RowMapper<S>, initial_expand_depth: usize) -> Self {
        let mut normalizer = Self {
            mapper,
            rows: Vec::new(),
            initial_expand_depth,
        };
        normalizer.rebuild();
        normalizer
    }

    pub fn mapper(&self) -> &RowMapper<S> {
        &self.mapper
    }

    pub(crate) fn mapper_mut(&mut self) -> &mut RowMapper<S> {
        &mut self.mapper
    }

    /// Placed presenters in display order.
    pub fn rows(&self) -> &[PresenterId] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_at(&self, index: usize) -> Option<PresenterId> {
        self.rows.get(index).copied()
    }

    /// Raw index of a placed presenter.
    pub fn raw_index(&self, id: PresenterId) -> Option<usize> {
        self.mapper.presenter(id).and_then(|p| p.raw_index())
    }

    /// Replace filter and sort, then rebuild.
    pub fn apply(&mut self, filter: Option<FilterFn<S>>, sort: Option<CompareFn<S>>) {
        self.mapper.apply(filter, sort);
        self.rebuild();
    }

    /// Reload the mapper and rebuild.
    pub fn reload(&mut self) {
        self.mapper.reload();
        self.rebuild();
    }

    /// Reset expansion to the initial depth and flatten everything.
    pub fn rebuild(&mut self) {
        let depth = self.initial_expand_depth;
        for id in self.mapper.rows() {
            if let Some(p) = self.mapper.presenter_mut(id) {
                let expand = p.depth() < depth;
                p.set_expanded(expand);
            }
        }
        self.reflatten();
    }

    /// Flatten again from the current expansion flags.
    pub(crate) fn reflatten(&mut self) {
        for id in std::mem::take(&mut self.rows) {
            if let Some(p) = self.mapper.presenter_mut(id) {
                p.set_raw_index(None);
            }
        }
        let mut rows = Vec::new();
        for &root in self.mapper.roots() {
            self.collect_visible(root, &mut rows);
        }
        self.rows = rows;
        self.reindex(0);
        tracing::debug!(target: targets::NORMALIZER, rows = self.rows.len(), "flattened");
    }

    /// Expand a row. Returns `false` if it already was.
    pub fn expand(&mut self, id: PresenterId) -> Result<bool> {
        let p = self.mapper.presenter(id).ok_or(GridError::InvalidPresenter(id))?;
        if p.is_expanded() {
            return Ok(false);
        }
        let raw = p.raw_index();
        let children = p.children().to_vec();
        if let Some(p) = self.mapper.presenter_mut(id) {
            p.set_expanded(true);
        }

        if let Some(raw) = raw {
            let mut descendants = Vec::new();
            for child in children {
                self.collect_visible(child, &mut descendants);
            }
            let at = raw + 1;
            let count = descendants.len();
            self.rows.splice(at..at, descendants);
            self.reindex(at);
            tracing::trace!(target: targets::NORMALIZER, ?id, at, count, "expanded");
        }
        Ok(true)
    }

    /// Collapse a row. Returns `false` if it already was collapsed.
    pub fn collapse(&mut self, id: PresenterId) -> Result<bool> {
        let p = self.mapper.presenter(id).ok_or(GridError::InvalidPresenter(id))?;
        if !p.is_expanded() {
            return Ok(false);
        }
        let placed = p.raw_index().map(|raw| (raw, p.depth()));
        if let Some(p) = self.mapper.presenter_mut(id) {
            p.set_expanded(false);
        }

        if let Some((raw, depth)) = placed {
            let end = self.subtree_end(raw, depth);
            self.unplace_range(raw + 1, end);
            tracing::trace!(target: targets::NORMALIZER, ?id, removed = end - raw - 1, "collapsed");
        }
        Ok(true)
    }

    /// Flip the expansion of a row, returning the new state.
    pub fn toggle_expanded(&mut self, id: PresenterId) -> Result<bool> {
        let expanded = self
            .mapper
            .presenter(id)
            .ok_or(GridError::InvalidPresenter(id))?
            .is_expanded();
        if expanded {
            self.collapse(id)?;
        } else {
            self.expand(id)?;
        }
        Ok(!expanded)
    }

    /// Expand every row that has children.
    pub fn expand_all(&mut self) {
        for id in self.mapper.rows() {
            if let Some(p) = self.mapper.presenter_mut(id)
                && p.has_children()
            {
                p.set_expanded(true);
            }
        }
        self.reflatten();
    }

    /// Collapse every row.
    pub fn collapse_all(&mut self) {
        for id in self.mapper.rows() {
            if let Some(p) = self.mapper.presenter_mut(id) {
                p.set_expanded(false);
            }
        }
        self.reflatten();
    }

    /// Expand all ancestors of `id` so it becomes placed. Returns the rows
    /// that were collapsed before, outermost first.
    pub fn expand_to(&mut self, id: PresenterId) -> Result<Vec<PresenterId>> {
        let mut ancestors = Vec::new();
        let mut cursor = self
            .mapper
            .presenter(id)
            .ok_or(GridError::InvalidPresenter(id))?
            .parent();
        while let Some(ancestor) = cursor {
            ancestors.push(ancestor);
            cursor = self.mapper.presenter(ancestor).and_then(|p| p.parent());
        }
        let mut expanded = Vec::new();
        for ancestor in ancestors.into_iter().rev() {
            if self.expand(ancestor)? {
                expanded.push(ancestor);
            }
        }
        Ok(expanded)
    }

    /// Run one source event through the mapper and apply the resulting changes.
    pub fn handle_event(&mut self, event: SourceEvent) -> Vec<RowChange> {
        let changes = self.mapper.handle_event(event);
        self.apply_changes(&changes);
        changes
    }

    /// Translate mapper changes into edits of the flat sequence.
    pub fn apply_changes(&mut self, changes: &[RowChange]) {
        for change in changes {
            match change {
                RowChange::Inserted { presenter } => {
                    self.apply_initial_expansion(*presenter);
                    self.place(*presenter);
                }
                RowChange::Removed { presenter, .. } => self.unplace(*presenter),
                RowChange::Moved { presenter, .. } => {
                    self.unplace(*presenter);
                    self.place(*presenter);
                }
                RowChange::Updated { .. } => {}
                RowChange::Reset => self.rebuild(),
            }
        }
    }

    /// Free presenters the mapper detached.
    pub(crate) fn purge(&mut self) -> Vec<PresenterId> {
        self.mapper.purge()
    }

    /// Insert a presenter and its visible descendants at the slot its tree
    /// position implies. No-op when an ancestor is collapsed.
    pub(crate) fn place(&mut self, id: PresenterId) {
        let Some(p) = self.mapper.presenter(id) else {
            return;
        };
        if p.is_placed() {
            return;
        }
        let parent = p.parent();
        let first_slot = match parent {
            None => 0,
            Some(parent_id) => match self.mapper.presenter(parent_id) {
                Some(pp) if pp.is_expanded() => match pp.raw_index() {
                    Some(raw) => raw + 1,
                    None => return,
                },
                _ => return,
            },
        };
        let at = self.slot_after_previous_sibling(parent, id).unwrap_or(first_slot);

        let mut placed = Vec::new();
        self.collect_visible(id, &mut placed);
        let count = placed.len();
        self.rows.splice(at..at, placed);
        self.reindex(at);
        tracing::trace!(target: targets::NORMALIZER, ?id, at, count, "placed");
    }

    /// Remove a presenter and its visible descendants from the sequence.
    pub(crate) fn unplace(&mut self, id: PresenterId) {
        let Some((raw, depth)) = self
            .mapper
            .presenter(id)
            .and_then(|p| p.raw_index().map(|raw| (raw, p.depth())))
        else {
            return;
        };
        let end = self.subtree_end(raw, depth);
        self.unplace_range(raw, end);
        tracing::trace!(target: targets::NORMALIZER, ?id, raw, count = end - raw, "unplaced");
    }

    fn apply_initial_expansion(&mut self, id: PresenterId) {
        if self.initial_expand_depth == 0 {
            return;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(p) = self.mapper.presenter_mut(current) {
                let expand = p.depth() < self.initial_expand_depth;
                p.set_expanded(expand);
                stack.extend(p.children().iter().copied());
            }
        }
    }

    fn slot_after_previous_sibling(&self, parent: Option<PresenterId>, id: PresenterId) -> Option<usize> {
        let siblings = self.mapper.siblings(parent);
        let pos = siblings.iter().position(|&s| s == id)?;
        siblings[..pos].iter().rev().find_map(|&s| {
            let p = self.mapper.presenter(s)?;
            let raw = p.raw_index()?;
            Some(self.subtree_end(raw, p.depth()))
        })
    }

    /// One past the last row of the visible subtree starting at `raw`.
    fn subtree_end(&self, raw: usize, depth: usize) -> usize {
        let mut end = raw + 1;
        while let Some(&id) = self.rows.get(end) {
            if self.mapper.presenter(id).is_none_or(|p| p.depth() <= depth) {
                break;
            }
            end += 1;
        }
        end
    }

    fn unplace_range(&mut self, start: usize, end: usize) {
        let removed: Vec<PresenterId> = self.rows.drain(start..end).collect();
        for id in removed {
            if let Some(p) = self.mapper.presenter_mut(id) {
                p.set_raw_index(None);
            }
        }
        self.reindex(start);
    }

    fn collect_visible(&self, id: PresenterId, out: &mut Vec<PresenterId>) {
        out.push(id);
        if let Some(p) = self.mapper.presenter(id)
            && p.is_expanded()
        {
            for &child in p.children() {
                self.collect_visible(child, out);
            }
        }
    }

    fn reindex(&mut self, from: usize) {
        for index in from..self.rows.len() {
            let id = self.rows[index];
            if let Some(p) = self.mapper.presenter_mut(id) {
                p.set_raw_index(Some(index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ColumnId, MemorySource, RowId};

    /// Root -> {A -> {A1, A2}, B -> {B1}}, C
    fn tree() -> (MemorySource, Vec<RowId>) {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["Root".into()]).unwrap();
        let a = source.push_row(Some(root), ["A".into()]).unwrap();
        let a1 = source.push_row(Some(a), ["A1".into()]).unwrap();
        let a2 = source.push_row(Some(a), ["A2".into()]).unwrap();
        let b = source.push_row(Some(root), ["B".into()]).unwrap();
        let b1 = source.push_row(Some(b), ["B1".into()]).unwrap();
        let c = source.push_row(None, ["C".into()]).unwrap();
        source.drain_events();
        (source, vec![root, a, a1, a2, b, b1, c])
    }

    fn names(n: &RowNormalizer<MemorySource>) -> Vec<String> {
        n.rows()
            .iter()
            .map(|&id| n.mapper().value(id, ColumnId(0)).to_string())
            .collect()
    }

    fn assert_indices(n: &RowNormalizer<MemorySource>) {
        for (i, &id) in n.rows().iter().enumerate() {
            assert_eq!(n.raw_index(id), Some(i));
        }
        let placed = n
            .mapper()
            .rows()
            .into_iter()
            .filter(|&id| n.raw_index(id).is_some())
            .count();
        assert_eq!(placed, n.len());
    }

    fn presenter(n: &RowNormalizer<MemorySource>, row: RowId) -> PresenterId {
        n.mapper().presenter_of(row).unwrap()
    }

    #[test]
    fn test_initially_collapsed() {
        let (source, _) = tree();
        let n = RowNormalizer::new(RowMapper::new(source), 0);
        assert_eq!(names(&n), ["Root", "C"]);
        assert_indices(&n);
    }

    #[test]
    fn test_initial_expand_depth() {
        let (source, _) = tree();
        let n = RowNormalizer::new(RowMapper::new(source), 1);
        assert_eq!(names(&n), ["Root", "A", "B", "C"]);
        assert_indices(&n);
    }

    #[test]
    fn test_expand_collapse_round_trip() {
        let (source, rows) = tree();
        let mut n = RowNormalizer::new(RowMapper::new(source), 0);
        let root = presenter(&n, rows[0]);
        let a = presenter(&n, rows[1]);

        assert!(n.expand(root).unwrap());
        assert!(!n.expand(root).unwrap());
        assert!(n.expand(a).unwrap());
        assert_eq!(names(&n), ["Root", "A", "A1", "A2", "B", "C"]);
        assert_indices(&n);
        let before: Vec<PresenterId> = n.rows().to_vec();

        assert!(n.collapse(root).unwrap());
        assert_eq!(names(&n), ["Root", "C"]);
        assert_indices(&n);

        // nested expansion state survives the collapse
        n.expand(root).unwrap();
        assert_eq!(n.rows(), &before[..]);
        assert_indices(&n);
    }

    #[test]
    fn test_expand_to_and_all() {
        let (source, rows) = tree();
        let mut n = RowNormalizer::new(RowMapper::new(source), 0);
        let b1 = presenter(&n, rows[5]);
        let root = presenter(&n, rows[0]);
        let b = presenter(&n, rows[4]);
        assert_eq!(n.expand_to(b1).unwrap(), [root, b]);
        assert_eq!(names(&n), ["Root", "A", "B", "B1", "C"]);
        assert!(n.expand_to(b1).unwrap().is_empty());

        n.expand_all();
        assert_eq!(n.len(), 7);
        n.collapse_all();
        assert_eq!(names(&n), ["Root", "C"]);
        assert_indices(&n);
    }

    #[test]
    fn test_insert_under_collapsed_parent_is_hidden() {
        let (source, rows) = tree();
        let mut n = RowNormalizer::new(RowMapper::new(source), 0);
        let root = presenter(&n, rows[0]);
        n.expand(root).unwrap();

        n.mapper_mut()
            .source_mut()
            .push_row(Some(rows[1]), ["A3".into()])
            .unwrap();
        let events = n.mapper_mut().source_mut().drain_events();
        for event in events {
            n.handle_event(event);
        }
        assert_eq!(names(&n), ["Root", "A", "B", "C"]);

        n.expand(presenter(&n, rows[1])).unwrap();
        assert_eq!(names(&n), ["Root", "A", "A1", "A2", "A3", "B", "C"]);
        assert_indices(&n);
    }

    #[test]
    fn test_insert_and_remove_in_expanded_tree() {
        let (source, rows) = tree();
        let mut n = RowNormalizer::new(RowMapper::new(source), 0);
        n.expand_all();

        n.mapper_mut()
            .source_mut()
            .insert_row(Some(rows[0]), 1, ["AB".into()])
            .unwrap();
        n.mapper_mut().source_mut().remove_row(rows[1]).unwrap();
        let events = n.mapper_mut().source_mut().drain_events();
        for event in events {
            n.handle_event(event);
        }
        n.purge();
        assert_eq!(names(&n), ["Root", "AB", "B", "B1", "C"]);
        assert_indices(&n);
    }

    #[test]
    fn test_invalid_presenter() {
        let (source, rows) = tree();
        let mut n = RowNormalizer::new(RowMapper::new(source), 0);
        let c = presenter(&n, rows[6]);
        n.mapper_mut().source_mut().remove_row(rows[6]).unwrap();
        let events = n.mapper_mut().source_mut().drain_events();
        for event in events {
            n.handle_event(event);
        }
        n.purge();
        assert_eq!(n.expand(c), Err(GridError::InvalidPresenter(c)));
    }
}
