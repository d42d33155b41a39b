//! Row mapping: data rows to presenters.
//!
//! [`RowMapper`] owns the data source and the presenter arena. It keeps one
//! presenter per visible data row, applies an optional filter and sort, and
//! turns [`SourceEvent`]s into [`RowChange`]s for the normalizer.
//!
//! # Identity
//!
//! For a flat, unfiltered, unsorted source a row's position is its identity:
//! the presenter of the row at ordinal `n` is `roots()[n]`. As soon as the
//! source is hierarchical, a filter or sort is active, or an uncommitted
//! insertion holds a slot in the list, the mapper switches to an explicit
//! row-to-presenter map.
//!
//! # Hierarchies
//!
//! A row that fails the filter is still mapped when one of its descendants
//! passes, so every mapped row keeps its full ancestor chain. When the last
//! qualifying descendant goes away the ancestor is pruned, recursively.
//!
//! # Example
//!
//! ```
//! use horizon_grid::mapper::{RowMapper, SortKey, sort_by_columns};
//! use horizon_grid::source::{ColumnId, MemorySource};
//!
//! let mut source = MemorySource::new(1);
//! for name in ["b", "c", "a"] {
//!     source.push_row(None, [name.into()]).unwrap();
//! }
//!
//! let mut mapper = RowMapper::new(source);
//! mapper.apply(None, Some(sort_by_columns([SortKey::ascending(ColumnId(0))])));
//!
//! let names: Vec<String> = mapper
//!     .rows()
//!     .into_iter()
//!     .map(|p| mapper.value(p, ColumnId(0)).to_string())
//!     .collect();
//! assert_eq!(names, ["a", "b", "c"]);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use slotmap::SlotMap;

use horizon_grid_core::logging::{DebugTree, PerfSpan, span_names, targets};

use crate::matching::hash_values;
use crate::presenter::{PresenterId, RowPresenter};
use crate::source::{CellValue, ColumnId, DataSource, RowId, SourceEvent};

/// Row predicate. Returns `true` if the row should be shown.
pub type FilterFn<S> = Arc<dyn Fn(&S, RowId) -> bool + Send + Sync>;

/// Row comparator for sorting siblings. Must be a total order.
pub type CompareFn<S> = Arc<dyn Fn(&S, RowId, RowId) -> Ordering + Send + Sync>;

static NEXT_MAPPER_ID: AtomicU64 = AtomicU64::new(1);

fn next_mapper_id() -> u64 {
    NEXT_MAPPER_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// One column of a multi-column sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub column: ColumnId,
    pub descending: bool,
}

impl SortKey {
    pub fn ascending(column: ColumnId) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn descending(column: ColumnId) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Build a comparator ordering rows by the given columns in turn.
pub fn sort_by_columns<S: DataSource>(keys: impl IntoIterator<Item = SortKey>) -> CompareFn<S> {
    let keys: Vec<SortKey> = keys.into_iter().collect();
    Arc::new(move |source: &S, a: RowId, b: RowId| {
        for key in &keys {
            let ord = source
                .value(a, key.column)
                .compare(&source.value(b, key.column));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    })
}

/// Build a filter keeping rows whose cell equals `value`.
pub fn column_equals<S: DataSource>(column: ColumnId, value: impl Into<CellValue>) -> FilterFn<S> {
    let value = value.into();
    Arc::new(move |source: &S, row: RowId| source.value(row, column) == value)
}

/// Build a filter keeping rows whose string cell contains `needle`,
/// ignoring case.
pub fn column_contains<S: DataSource>(column: ColumnId, needle: impl Into<String>) -> FilterFn<S> {
    let needle = needle.into().to_lowercase();
    Arc::new(move |source: &S, row: RowId| {
        source
            .value(row, column)
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
    })
}

/// A structural change produced by the mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    /// A presenter, with any descendants it carries, joined the tree. When
    /// missing ancestors had to be materialized this names the topmost one.
    Inserted { presenter: PresenterId },
    /// A presenter and its subtree left the tree. `index` is its former
    /// position among `parent`'s children and `ordinal` the row's last
    /// ordinal in the source, when known.
    Removed {
        presenter: PresenterId,
        parent: Option<PresenterId>,
        index: usize,
        ordinal: Option<usize>,
    },
    /// A presenter was repositioned among its siblings.
    Moved {
        presenter: PresenterId,
        old_index: usize,
    },
    /// Values changed in place.
    Updated {
        presenter: PresenterId,
        columns: Vec<ColumnId>,
    },
    /// Everything was rebuilt.
    Reset,
}

/// Maps data rows to presenters.
pub struct RowMapper<S> {
    id: u64,
    source: S,
    presenters: SlotMap<PresenterId, RowPresenter>,
    roots: Vec<PresenterId>,
    identity: Option<HashMap<RowId, PresenterId>>,
    filter: Option<FilterFn<S>>,
    sort: Option<CompareFn<S>>,
    match_columns: Arc<[ColumnId]>,
    /// Virtual presenter of an open insertion.
    transient: Option<PresenterId>,
    /// Row being committed and the presenter that should adopt it.
    committing: Option<(RowId, PresenterId)>,
    /// Detached presenters awaiting purge.
    disposed: Vec<PresenterId>,
}

impl<S: DataSource> RowMapper<S> {
    /// Map every row of `source`.
    pub fn new(source: S) -> Self {
        Self::with_match_columns(source, Vec::new())
    }

    /// Map every row of `source`, hashing `match_columns` for reload matching.
    pub fn with_match_columns(source: S, match_columns: impl Into<Arc<[ColumnId]>>) -> Self {
        let mut mapper = Self {
            id: next_mapper_id(),
            source,
            presenters: SlotMap::with_key(),
            roots: Vec::new(),
            identity: None,
            filter: None,
            sort: None,
            match_columns: match_columns.into(),
            transient: None,
            committing: None,
            disposed: Vec::new(),
        };
        mapper.reload();
        mapper
    }

    /// Identifier distinguishing this mapper generation from any other.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn match_columns(&self) -> &Arc<[ColumnId]> {
        &self.match_columns
    }

    pub fn filter(&self) -> Option<&FilterFn<S>> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&CompareFn<S>> {
        self.sort.as_ref()
    }

    /// Whether an explicit row-to-presenter map is in use.
    pub fn has_identity_map(&self) -> bool {
        self.identity.is_some()
    }

    pub fn presenter(&self, id: PresenterId) -> Option<&RowPresenter> {
        self.presenters.get(id)
    }

    pub(crate) fn presenter_mut(&mut self, id: PresenterId) -> Option<&mut RowPresenter> {
        self.presenters.get_mut(id)
    }

    /// Whether the handle refers to a live presenter.
    pub fn contains(&self, id: PresenterId) -> bool {
        self.presenters.contains_key(id) && !self.disposed.contains(&id)
    }

    /// Top-level presenters in display order.
    pub fn roots(&self) -> &[PresenterId] {
        &self.roots
    }

    /// Children of `parent` in display order; `None` lists the roots.
    pub fn siblings(&self, parent: Option<PresenterId>) -> &[PresenterId] {
        match parent {
            None => &self.roots,
            Some(id) => self
                .presenters
                .get(id)
                .map(RowPresenter::children)
                .unwrap_or(&[]),
        }
    }

    fn siblings_mut(&mut self, parent: Option<PresenterId>) -> Option<&mut Vec<PresenterId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(id) => self.presenters.get_mut(id).map(RowPresenter::children_mut),
        }
    }

    /// Presenter of a data row, if the row is mapped.
    pub fn presenter_of(&self, row: RowId) -> Option<PresenterId> {
        match &self.identity {
            Some(map) => map.get(&row).copied(),
            None => {
                let ordinal = self.source.ordinal(row)?;
                self.roots
                    .get(ordinal)
                    .copied()
                    .filter(|&id| self.row_of(id) == Some(row))
            }
        }
    }

    /// Data row of a presenter.
    pub fn row_of(&self, id: PresenterId) -> Option<RowId> {
        self.presenters.get(id).map(RowPresenter::row)
    }

    /// Cell value of the row behind a presenter.
    pub fn value(&self, id: PresenterId, column: ColumnId) -> CellValue {
        match self.row_of(id) {
            Some(row) => self.source.value(row, column),
            None => CellValue::None,
        }
    }

    /// Every mapped presenter, depth-first, regardless of expansion.
    pub fn rows(&self) -> Vec<PresenterId> {
        let mut out = Vec::with_capacity(self.presenters.len());
        let mut stack: Vec<PresenterId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(presenter) = self.presenters.get(id) {
                stack.extend(presenter.children().iter().rev());
            }
        }
        out
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: PresenterId, id: PresenterId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.presenters.get(current).and_then(RowPresenter::parent);
        }
        false
    }

    /// Replace filter and sort and rebuild every presenter.
    pub fn apply(&mut self, filter: Option<FilterFn<S>>, sort: Option<CompareFn<S>>) {
        self.filter = filter;
        self.sort = sort;
        self.reload();
    }

    /// Discard all presenters and map the source from scratch.
    pub fn reload(&mut self) {
        let _span = PerfSpan::new(span_names::RELOAD);
        self.presenters.clear();
        self.roots.clear();
        self.disposed.clear();
        self.transient = None;
        self.committing = None;
        self.identity = self.needs_identity().then(HashMap::new);

        let rows = self.source.children(None).to_vec();
        self.roots = self.build_level(None, &rows, 0);
        tracing::debug!(
            target: targets::MAPPER,
            presenters = self.presenters.len(),
            identity = self.identity.is_some(),
            "mapper reloaded"
        );
    }

    /// Swap in a new source and map it under a fresh mapper id.
    pub(crate) fn replace_source(&mut self, source: S) -> S {
        let old = std::mem::replace(&mut self.source, source);
        self.id = next_mapper_id();
        self.reload();
        old
    }

    /// Translate one source event.
    pub fn handle_event(&mut self, event: SourceEvent) -> Vec<RowChange> {
        match event {
            SourceEvent::RowInserting { row } => {
                tracing::trace!(target: targets::MAPPER, ?row, "row inserting");
                Vec::new()
            }
            SourceEvent::RowInserted { row } => self.on_insert(row),
            SourceEvent::RowRemoved {
                row,
                parent,
                last_index,
            } => self.on_remove(row, parent, last_index),
            SourceEvent::ValueChanged { row, columns } => self.on_value_changed(row, &columns),
        }
    }

    /// Map a newly attached row.
    pub fn on_insert(&mut self, row: RowId) -> Vec<RowChange> {
        let adopt = self
            .committing
            .filter(|(committed, _)| *committed == row)
            .map(|(_, id)| id);

        if self.identity.is_none() {
            if !self.source.contains(row) {
                return Vec::new();
            }
            let index = self.insert_position(None, row);
            let id = self.adopt_or_create(row, None, 0, adopt);
            self.roots.insert(index, id);
            tracing::trace!(target: targets::MAPPER, ?row, index, "row mapped by position");
            return vec![RowChange::Inserted { presenter: id }];
        }

        if self.presenter_of(row).is_some() || !self.source.contains(row) {
            return Vec::new();
        }

        let depth = self.source.depth(row);
        let Some(id) = self.build_subtree(row, None, depth, adopt) else {
            tracing::trace!(target: targets::MAPPER, ?row, "inserted row filtered out");
            return Vec::new();
        };

        let (parent, top) = match self.source.parent(row) {
            Some(parent_row) => match self.materialize(parent_row) {
                Some((parent, top)) => (Some(parent), top),
                None => {
                    tracing::warn!(target: targets::MAPPER, ?row, "inserted row has an unmapped parent");
                    self.mark_disposed(id);
                    return Vec::new();
                }
            },
            None => (None, None),
        };

        if let Some(presenter) = self.presenters.get_mut(id) {
            presenter.set_parent(parent, depth);
        }
        let index = self.insert_position(parent, row);
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.insert(index, id);
        }

        let presenter = top.unwrap_or(id);
        tracing::trace!(target: targets::MAPPER, ?row, index, ?presenter, "row mapped");
        vec![RowChange::Inserted { presenter }]
    }

    /// Unmap a removed row and prune ancestors left without qualifying rows.
    pub fn on_remove(&mut self, row: RowId, parent: Option<RowId>, last_index: usize) -> Vec<RowChange> {
        let id = match &self.identity {
            Some(map) => map.get(&row).copied(),
            None => self
                .roots
                .get(last_index)
                .copied()
                .filter(|&id| self.row_of(id) == Some(row))
                .or_else(|| self.roots.iter().copied().find(|&id| self.row_of(id) == Some(row))),
        };
        let Some(id) = id else {
            tracing::trace!(target: targets::MAPPER, ?row, ?parent, "removed row was not mapped");
            return Vec::new();
        };

        let mut changes = Vec::new();
        let parent = self.detach(id, Some(last_index), &mut changes);
        self.prune_ancestors(parent, &mut changes);
        changes
    }

    /// Re-evaluate membership and position of a row whose values changed.
    pub fn on_value_changed(&mut self, row: RowId, columns: &[ColumnId]) -> Vec<RowChange> {
        let id = self.presenter_of(row);
        if let Some(id) = id
            && columns.iter().any(|c| self.match_columns.contains(c))
        {
            let hash = self.compute_match_hash(row);
            if let Some(presenter) = self.presenters.get_mut(id) {
                presenter.set_match_hash(hash);
            }
        }

        if self.identity.is_none() {
            return id
                .map(|presenter| {
                    vec![RowChange::Updated {
                        presenter,
                        columns: columns.to_vec(),
                    }]
                })
                .unwrap_or_default();
        }

        let passes = self.passes(row);
        let Some(id) = id else {
            return if passes { self.on_insert(row) } else { Vec::new() };
        };

        let (parent, has_children) = match self.presenters.get_mut(id) {
            Some(presenter) => {
                presenter.set_passes_filter(passes);
                (presenter.parent(), presenter.has_children())
            }
            None => return Vec::new(),
        };

        if !passes && !has_children {
            tracing::trace!(target: targets::MAPPER, ?row, "row no longer passes filter");
            let mut changes = Vec::new();
            let ordinal = self.source.ordinal(row);
            let parent = self.detach(id, ordinal, &mut changes);
            self.prune_ancestors(parent, &mut changes);
            return changes;
        }

        if self.sort.is_some() && !self.in_order(parent, id, row) {
            let Some(siblings) = self.siblings_mut(parent) else {
                return Vec::new();
            };
            let Some(old_index) = siblings.iter().position(|&s| s == id) else {
                return Vec::new();
            };
            siblings.remove(old_index);
            let index = self.insert_position(parent, row);
            if let Some(siblings) = self.siblings_mut(parent) {
                siblings.insert(index, id);
            }
            tracing::trace!(target: targets::MAPPER, ?row, old_index, index, "row moved");
            return vec![RowChange::Moved {
                presenter: id,
                old_index,
            }];
        }

        vec![RowChange::Updated {
            presenter: id,
            columns: columns.to_vec(),
        }]
    }

    /// Insert the virtual presenter of an open insertion.
    pub(crate) fn attach_transient(
        &mut self,
        parent: Option<PresenterId>,
        index: usize,
        pending_row: RowId,
    ) -> PresenterId {
        self.ensure_identity();
        let depth = self.child_depth(parent);
        let id = self
            .presenters
            .insert(RowPresenter::new_virtual(pending_row, parent, depth));
        if let Some(siblings) = self.siblings_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, id);
        }
        self.transient = Some(id);
        id
    }

    /// The virtual presenter of the open insertion.
    pub fn transient(&self) -> Option<PresenterId> {
        self.transient
    }

    /// Take the virtual presenter out of its sibling list, returning where it was.
    pub(crate) fn detach_transient(&mut self) -> Option<(Option<PresenterId>, usize)> {
        let id = self.transient?;
        let parent = self.presenters.get(id)?.parent();
        let siblings = self.siblings_mut(parent)?;
        let index = siblings.iter().position(|&s| s == id)?;
        siblings.remove(index);
        Some((parent, index))
    }

    /// Put the detached virtual presenter back under `parent` at `index`.
    pub(crate) fn reattach_transient(&mut self, parent: Option<PresenterId>, index: usize) {
        let Some(id) = self.transient else {
            return;
        };
        let depth = self.child_depth(parent);
        if let Some(presenter) = self.presenters.get_mut(id) {
            presenter.set_parent(parent, depth);
        }
        if let Some(siblings) = self.siblings_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, id);
        }
    }

    /// Drop the virtual presenter entirely.
    pub(crate) fn dispose_transient(&mut self) {
        self.detach_transient();
        if let Some(id) = self.transient.take() {
            self.presenters.remove(id);
        }
        self.relax_identity();
    }

    /// The next `RowInserted` for `row` adopts the virtual presenter.
    pub(crate) fn begin_commit(&mut self, row: RowId) {
        self.committing = self.transient.map(|id| (row, id));
    }

    /// Finish a commit. Returns the presenter if it now maps the committed row.
    pub(crate) fn end_commit(&mut self) -> Option<PresenterId> {
        let (_, id) = self.committing.take()?;
        self.transient = None;
        let adopted = self.contains(id) && self.presenters.get(id).is_some_and(|p| !p.is_virtual());
        if !adopted && self.presenters.get(id).is_some_and(RowPresenter::is_virtual) {
            self.presenters.remove(id);
        }
        self.relax_identity();
        adopted.then_some(id)
    }

    /// Free presenters detached since the last purge.
    pub(crate) fn purge(&mut self) -> Vec<PresenterId> {
        let ids = std::mem::take(&mut self.disposed);
        for &id in &ids {
            self.presenters.remove(id);
        }
        ids
    }

    fn needs_identity(&self) -> bool {
        self.source.is_hierarchical()
            || self.filter.is_some()
            || self.sort.is_some()
            || self.transient.is_some()
    }

    fn ensure_identity(&mut self) {
        if self.identity.is_some() {
            return;
        }
        let map = self
            .presenters
            .iter()
            .filter(|(id, p)| !p.is_virtual() && !self.disposed.contains(id))
            .map(|(id, p)| (p.row(), id))
            .collect();
        self.identity = Some(map);
        tracing::trace!(target: targets::MAPPER, "identity map built");
    }

    fn relax_identity(&mut self) {
        if self.identity.is_some() && !self.needs_identity() {
            self.identity = None;
            tracing::trace!(target: targets::MAPPER, "identity map released");
        }
    }

    fn passes(&self, row: RowId) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter(&self.source, row))
    }

    fn compute_match_hash(&self, row: RowId) -> Option<u64> {
        if self.match_columns.is_empty() {
            return None;
        }
        let values: Vec<CellValue> = self
            .match_columns
            .iter()
            .map(|&column| self.source.value(row, column))
            .collect();
        Some(hash_values(&values))
    }

    fn child_depth(&self, parent: Option<PresenterId>) -> usize {
        parent
            .and_then(|p| self.presenters.get(p))
            .map_or(0, |p| p.depth() + 1)
    }

    fn sorts_before(&self, a: RowId, b: RowId) -> bool {
        let by_ordinal = || self.source.ordinal(a) < self.source.ordinal(b);
        match &self.sort {
            Some(sort) => match sort(&self.source, a, b) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => by_ordinal(),
            },
            None => by_ordinal(),
        }
    }

    /// Slot for `row` among `parent`'s children: right after the last live
    /// sibling that sorts before it. Siblings whose rows already left the
    /// source (their removal is still queued) and the virtual presenter are
    /// stepped over, so a batch of events lands against what is mapped so far.
    fn insert_position(&self, parent: Option<PresenterId>, row: RowId) -> usize {
        let live: Vec<(usize, RowId)> = self
            .siblings(parent)
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| {
                let presenter = self.presenters.get(id)?;
                let live = !presenter.is_virtual() && self.source.contains(presenter.row());
                live.then_some((index, presenter.row()))
            })
            .collect();
        match live.partition_point(|&(_, other)| self.sorts_before(other, row)) {
            0 => 0,
            n => live[n - 1].0 + 1,
        }
    }

    fn in_order(&self, parent: Option<PresenterId>, id: PresenterId, row: RowId) -> bool {
        let siblings = self.siblings(parent);
        let Some(pos) = siblings.iter().position(|&s| s == id) else {
            return true;
        };
        let real = |s: &&PresenterId| {
            self.presenters
                .get(**s)
                .is_some_and(|p| !p.is_virtual() && self.source.contains(p.row()))
        };
        let prev = siblings[..pos].iter().rev().find(real);
        let next = siblings[pos + 1..].iter().find(real);
        prev.and_then(|&p| self.row_of(p))
            .is_none_or(|prev_row| self.sorts_before(prev_row, row))
            && next
                .and_then(|&n| self.row_of(n))
                .is_none_or(|next_row| self.sorts_before(row, next_row))
    }

    fn adopt_or_create(
        &mut self,
        row: RowId,
        parent: Option<PresenterId>,
        depth: usize,
        adopt: Option<PresenterId>,
    ) -> PresenterId {
        let hash = self.compute_match_hash(row);
        let adopted = adopt.filter(|&id| self.presenters.contains_key(id));
        let id = match adopted {
            Some(id) => id,
            None => self.presenters.insert(RowPresenter::new(row, parent, depth)),
        };
        if let Some(presenter) = self.presenters.get_mut(id) {
            if adopted.is_some() {
                presenter.commit(row);
                presenter.set_parent(parent, depth);
            }
            presenter.set_match_hash(hash);
        }
        id
    }

    fn build_level(&mut self, parent: Option<PresenterId>, rows: &[RowId], depth: usize) -> Vec<PresenterId> {
        let mut level: Vec<(RowId, PresenterId)> = Vec::with_capacity(rows.len());
        for &row in rows {
            if let Some(id) = self.build_subtree(row, parent, depth, None) {
                level.push((row, id));
            }
        }
        if let Some(sort) = &self.sort {
            // stable, so ties keep ordinal order
            level.sort_by(|(a, _), (b, _)| sort(&self.source, *a, *b));
        }
        level.into_iter().map(|(_, id)| id).collect()
    }

    /// Map `row` and its qualifying descendants. Returns `None` when nothing
    /// in the subtree passes the filter.
    fn build_subtree(
        &mut self,
        row: RowId,
        parent: Option<PresenterId>,
        depth: usize,
        adopt: Option<PresenterId>,
    ) -> Option<PresenterId> {
        let passes = self.passes(row);
        let id = self.adopt_or_create(row, parent, depth, adopt);
        if let Some(presenter) = self.presenters.get_mut(id) {
            presenter.set_passes_filter(passes);
        }

        let child_rows = self.source.children(Some(row)).to_vec();
        let children = if child_rows.is_empty() {
            Vec::new()
        } else {
            self.build_level(Some(id), &child_rows, depth + 1)
        };

        if !passes && children.is_empty() {
            if adopt == Some(id) {
                self.disposed.push(id);
            } else {
                self.presenters.remove(id);
            }
            return None;
        }

        if let Some(presenter) = self.presenters.get_mut(id) {
            *presenter.children_mut() = children;
        }
        if let Some(map) = &mut self.identity {
            map.insert(row, id);
        }
        Some(id)
    }

    /// Find or create the presenter of an attached row, materializing its
    /// ancestor chain. Also returns the topmost presenter created, if any.
    fn materialize(&mut self, row: RowId) -> Option<(PresenterId, Option<PresenterId>)> {
        if let Some(id) = self.presenter_of(row) {
            return Some((id, None));
        }
        if !self.source.contains(row) {
            return None;
        }

        let (parent, top) = match self.source.parent(row) {
            Some(parent_row) => {
                let (parent, top) = self.materialize(parent_row)?;
                (Some(parent), top)
            }
            None => (None, None),
        };

        let depth = self.child_depth(parent);
        let passes = self.passes(row);
        let id = self.adopt_or_create(row, parent, depth, None);
        if let Some(presenter) = self.presenters.get_mut(id) {
            presenter.set_passes_filter(passes);
        }
        let index = self.insert_position(parent, row);
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.insert(index, id);
        }
        if let Some(map) = &mut self.identity {
            map.insert(row, id);
        }
        tracing::trace!(target: targets::MAPPER, ?row, "ancestor materialized");
        Some((id, top.or(Some(id))))
    }

    /// Take a presenter out of its sibling list and queue its subtree for
    /// disposal. Returns the former parent.
    fn detach(
        &mut self,
        id: PresenterId,
        ordinal: Option<usize>,
        changes: &mut Vec<RowChange>,
    ) -> Option<PresenterId> {
        let parent = self.presenters.get(id)?.parent();
        let siblings = self.siblings_mut(parent)?;
        let index = siblings.iter().position(|&s| s == id)?;
        siblings.remove(index);
        self.mark_disposed(id);
        changes.push(RowChange::Removed {
            presenter: id,
            parent,
            index,
            ordinal,
        });
        parent
    }

    fn prune_ancestors(&mut self, mut parent: Option<PresenterId>, changes: &mut Vec<RowChange>) {
        while let Some(id) = parent {
            let prune = self
                .presenters
                .get(id)
                .is_some_and(|p| !p.has_children() && !p.passes_filter());
            if !prune {
                break;
            }
            tracing::trace!(target: targets::MAPPER, ?id, "pruning ancestor without qualifying rows");
            let ordinal = self.row_of(id).and_then(|row| self.source.ordinal(row));
            parent = self.detach(id, ordinal, changes);
        }
    }

    fn mark_disposed(&mut self, id: PresenterId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            // the virtual presenter is re-homed by the manager
            if Some(current) == self.transient {
                continue;
            }
            let Some(presenter) = self.presenters.get(current) else {
                continue;
            };
            let row = presenter.row();
            stack.extend(presenter.children().iter().copied());
            if let Some(map) = &mut self.identity
                && map.get(&row) == Some(&current)
            {
                map.remove(&row);
            }
            self.disposed.push(current);
        }
    }
}

impl<S: DataSource> DebugTree for RowMapper<S> {
    type Node = PresenterId;

    fn roots(&self) -> Vec<PresenterId> {
        self.roots.clone()
    }

    fn children(&self, node: PresenterId) -> Vec<PresenterId> {
        self.siblings(Some(node)).to_vec()
    }

    fn label(&self, node: PresenterId) -> String {
        match self.presenters.get(node) {
            Some(p) if p.is_virtual() => "<new row>".to_string(),
            Some(p) if self.source.column_count() > 0 => self.source.value(p.row(), ColumnId(0)).to_string(),
            Some(p) => format!("{:?}", p.row()),
            None => "<disposed>".to_string(),
        }
    }

    fn details(&self, node: PresenterId) -> Option<String> {
        let p = self.presenters.get(node)?;
        let mut flags = vec![format!("depth={}", p.depth())];
        if let Some(raw) = p.raw_index() {
            flags.push(format!("raw={raw}"));
        }
        if p.is_expanded() {
            flags.push("expanded".into());
        }
        if p.is_selected() {
            flags.push("selected".into());
        }
        if !p.passes_filter() {
            flags.push("ancestor-only".into());
        }
        Some(flags.join(", "))
    }
}

impl<S> std::fmt::Debug for RowMapper<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowMapper")
            .field("id", &self.id)
            .field("presenters", &self.presenters.len())
            .field("roots", &self.roots.len())
            .field("identity", &self.identity.is_some())
            .field("filter", &self.filter.is_some())
            .field("sort", &self.sort.is_some())
            .field("transient", &self.transient)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use horizon_grid_core::logging::{TreeDebug, TreeFormatOptions, TreeStyle};

    fn name(mapper: &RowMapper<MemorySource>, id: PresenterId) -> String {
        mapper.value(id, ColumnId(0)).to_string()
    }

    fn names(mapper: &RowMapper<MemorySource>) -> Vec<String> {
        mapper.rows().into_iter().map(|id| name(mapper, id)).collect()
    }

    fn flat(values: &[&str]) -> MemorySource {
        let mut source = MemorySource::new(1);
        for v in values {
            source.push_row(None, [(*v).into()]).unwrap();
        }
        source.drain_events();
        source
    }

    fn pump(mapper: &mut RowMapper<MemorySource>) -> Vec<RowChange> {
        let events = mapper.source_mut().drain_events();
        let mut changes = Vec::new();
        for event in events {
            changes.extend(mapper.handle_event(event));
        }
        mapper.purge();
        changes
    }

    #[test]
    fn test_flat_source_uses_position_identity() {
        let mapper = RowMapper::new(flat(&["A", "B", "C"]));
        assert!(!mapper.has_identity_map());
        assert_eq!(names(&mapper), ["A", "B", "C"]);

        let b = mapper.source().children(None)[1];
        assert_eq!(mapper.presenter_of(b), Some(mapper.roots()[1]));
    }

    #[test]
    fn test_every_mapped_row_has_one_presenter() {
        let mut mapper = RowMapper::new(flat(&["c", "a", "b"]));
        mapper.apply(None, Some(sort_by_columns([SortKey::ascending(ColumnId(0))])));
        assert!(mapper.has_identity_map());
        for id in mapper.rows() {
            let row = mapper.row_of(id).unwrap();
            assert_eq!(mapper.presenter_of(row), Some(id));
        }
    }

    #[test]
    fn test_flat_insert_and_remove() {
        let mut mapper = RowMapper::new(flat(&["A", "C"]));
        mapper.source_mut().insert_row(None, 1, ["B".into()]).unwrap();
        let changes = pump(&mut mapper);
        assert_eq!(changes.len(), 1);
        assert_eq!(names(&mapper), ["A", "B", "C"]);

        let a = mapper.source().children(None)[0];
        let pa = mapper.presenter_of(a).unwrap();
        mapper.source_mut().remove_row(a).unwrap();
        let changes = pump(&mut mapper);
        assert_eq!(
            changes,
            vec![RowChange::Removed {
                presenter: pa,
                parent: None,
                index: 0,
                ordinal: Some(0)
            }]
        );
        assert_eq!(names(&mapper), ["B", "C"]);
        assert!(!mapper.contains(pa));
    }

    #[test]
    fn test_flat_batch_lands_in_source_order() {
        let mut mapper = RowMapper::new(flat(&["A", "B"]));
        let b = mapper.source().children(None)[1];
        let source = mapper.source_mut();
        source.insert_row(None, 0, ["X".into()]).unwrap();
        source.insert_row(None, 0, ["Y".into()]).unwrap();
        source.insert_row(None, 2, ["Z".into()]).unwrap();
        source.remove_row(b).unwrap();
        source.push_row(None, ["W".into()]).unwrap();
        pump(&mut mapper);

        assert!(!mapper.has_identity_map());
        assert_eq!(names(&mapper), ["Y", "X", "Z", "A", "W"]);
        for (ordinal, &row) in mapper.source().children(None).iter().enumerate() {
            assert_eq!(mapper.presenter_of(row), Some(mapper.roots()[ordinal]));
        }
    }

    #[test]
    fn test_tree_batch_with_queued_removal() {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["root".into()]).unwrap();
        let a = source.push_row(Some(root), ["a".into()]).unwrap();
        source.push_row(Some(root), ["b".into()]).unwrap();
        source.drain_events();
        let mut mapper = RowMapper::new(source);

        let source = mapper.source_mut();
        source.insert_row(Some(root), 0, ["x".into()]).unwrap();
        source.remove_row(a).unwrap();
        source.insert_row(Some(root), 1, ["y".into()]).unwrap();
        pump(&mut mapper);
        assert_eq!(names(&mapper), ["root", "x", "y", "b"]);
    }

    #[test]
    fn test_sorted_insert_and_move() {
        let mut mapper = RowMapper::new(flat(&["b", "d"]));
        mapper.apply(None, Some(sort_by_columns([SortKey::ascending(ColumnId(0))])));

        mapper.source_mut().push_row(None, ["a".into()]).unwrap();
        mapper.source_mut().push_row(None, ["c".into()]).unwrap();
        pump(&mut mapper);
        assert_eq!(names(&mapper), ["a", "b", "c", "d"]);

        let a = mapper.source().children(None)[2];
        let pa = mapper.presenter_of(a).unwrap();
        mapper.source_mut().set_value(a, ColumnId(0), "z".into()).unwrap();
        let changes = pump(&mut mapper);
        assert_eq!(
            changes,
            vec![RowChange::Moved {
                presenter: pa,
                old_index: 0
            }]
        );
        assert_eq!(names(&mapper), ["b", "c", "d", "z"]);
        assert_eq!(mapper.presenter_of(a), Some(pa));
    }

    #[test]
    fn test_sort_ties_keep_ordinal_order() {
        let mut source = MemorySource::new(2);
        for (group, n) in [("x", 1), ("y", 2), ("x", 3), ("y", 4)] {
            source.push_row(None, [group.into(), n.into()]).unwrap();
        }
        let mut mapper = RowMapper::new(source);
        mapper.apply(None, Some(sort_by_columns([SortKey::ascending(ColumnId(0))])));
        let order: Vec<i64> = mapper
            .rows()
            .into_iter()
            .map(|id| mapper.value(id, ColumnId(1)).as_int().unwrap())
            .collect();
        assert_eq!(order, [1, 3, 2, 4]);
    }

    #[test]
    fn test_filter_preserves_ancestors() {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["Root".into()]).unwrap();
        source.push_row(Some(root), ["X".into()]).unwrap();
        let y = source.push_row(Some(root), ["Y".into()]).unwrap();
        source.push_row(Some(y), ["Z".into()]).unwrap();

        let mut mapper = RowMapper::new(source);
        mapper.apply(Some(column_equals(ColumnId(0), "Z")), None);
        assert_eq!(names(&mapper), ["Root", "Y", "Z"]);

        let root_presenter = mapper.presenter(mapper.roots()[0]).unwrap();
        assert!(!root_presenter.passes_filter());
    }

    #[test]
    fn test_removal_prunes_empty_ancestors() {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["Root".into()]).unwrap();
        let y = source.push_row(Some(root), ["Y".into()]).unwrap();
        let z = source.push_row(Some(y), ["Z".into()]).unwrap();
        source.drain_events();

        let mut mapper = RowMapper::new(source);
        mapper.apply(Some(column_equals(ColumnId(0), "Z")), None);
        mapper.source_mut().remove_row(z).unwrap();
        let changes = pump(&mut mapper);

        assert_eq!(changes.len(), 3);
        assert!(mapper.rows().is_empty());
    }

    #[test]
    fn test_insert_materializes_ancestors() {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["Root".into()]).unwrap();
        let y = source.push_row(Some(root), ["Y".into()]).unwrap();
        source.drain_events();

        let mut mapper = RowMapper::new(source);
        mapper.apply(Some(column_equals(ColumnId(0), "Z")), None);
        assert!(mapper.rows().is_empty());

        mapper.source_mut().push_row(Some(y), ["Z".into()]).unwrap();
        let changes = pump(&mut mapper);
        let top = mapper.roots()[0];
        assert_eq!(changes, vec![RowChange::Inserted { presenter: top }]);
        assert_eq!(names(&mapper), ["Root", "Y", "Z"]);
    }

    #[test]
    fn test_value_change_toggles_membership() {
        let mut mapper = RowMapper::new(flat(&["keep", "drop"]));
        mapper.apply(Some(column_contains(ColumnId(0), "KEEP")), None);
        assert_eq!(names(&mapper), ["keep"]);

        let drop = mapper.source().children(None)[1];
        mapper.source_mut().set_value(drop, ColumnId(0), "keep too".into()).unwrap();
        pump(&mut mapper);
        assert_eq!(names(&mapper), ["keep", "keep too"]);

        mapper.source_mut().set_value(drop, ColumnId(0), "gone".into()).unwrap();
        let changes = pump(&mut mapper);
        assert!(matches!(changes[..], [RowChange::Removed { .. }]));
        assert_eq!(names(&mapper), ["keep"]);
    }

    #[test]
    fn test_transient_is_skipped_by_search() {
        let mut mapper = RowMapper::new(flat(&["a", "c"]));
        mapper.apply(None, Some(sort_by_columns([SortKey::ascending(ColumnId(0))])));
        let pending = mapper.source_mut().begin_add().unwrap();
        let t = mapper.attach_transient(None, 1, pending);
        assert_eq!(mapper.roots()[1], t);

        mapper.source_mut().push_row(None, ["b".into()]).unwrap();
        pump(&mut mapper);
        let rows = mapper.rows();
        assert_eq!(rows.len(), 4);
        // a row landing next to the placeholder goes in front of it
        assert_eq!(name(&mapper, rows[0]), "a");
        assert_eq!(name(&mapper, rows[1]), "b");
        assert_eq!(rows[2], t);
        assert_eq!(name(&mapper, rows[3]), "c");

        mapper.source_mut().cancel_add().unwrap();
        mapper.dispose_transient();
        assert_eq!(names(&mapper), ["a", "b", "c"]);
    }

    #[test]
    fn test_commit_adopts_transient() {
        let mut mapper = RowMapper::new(flat(&["A", "C"]));
        let pending = mapper.source_mut().begin_add().unwrap();
        let t = mapper.attach_transient(None, 1, pending);
        assert!(mapper.has_identity_map());
        mapper.detach_transient();

        let row = mapper.source_mut().end_add(None, 1).unwrap();
        mapper.begin_commit(row);
        pump(&mut mapper);
        assert_eq!(mapper.end_commit(), Some(t));
        assert!(!mapper.has_identity_map());
        assert_eq!(mapper.roots()[1], t);
        assert!(!mapper.presenter(t).unwrap().is_virtual());
    }

    #[test]
    fn test_debug_tree_output() {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["Root".into()]).unwrap();
        source.push_row(Some(root), ["Leaf".into()]).unwrap();
        let mapper = RowMapper::new(source);

        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..TreeFormatOptions::minimal()
        };
        let text = TreeDebug::with_options(options).format(&mapper);
        assert_eq!(text, "Root\n`-- Leaf\n");
    }
}
