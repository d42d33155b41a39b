//! Edit and insert transactions.
//!
//! At most one transaction is open at a time. Editing an existing row is a
//! thin wrapper around the source's `begin_edit/end_edit/cancel_edit`.
//! Inserting creates a virtual presenter right away so the new row can be
//! made current, selected and navigated before it exists in the source.
//! Commit resolves where the row goes in the source, attaches it there and
//! hands the virtual presenter over to the committed row.

use horizon_grid_core::logging::{PerfSpan, span_names, targets};

use super::RowManager;
use crate::error::{GridError, Result, SourceError};
use crate::presenter::PresenterId;
use crate::source::{CellValue, ColumnId, DataSource};

/// Where an insertion is anchored among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertScope {
    /// Among the top-level rows.
    Root,
    /// Among the children of a parent row.
    Child,
}

/// Observable state of the row manager's transaction machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    EditingExisting,
    InsertingBefore(InsertScope),
    InsertingAfter(InsertScope),
}

/// What an open insertion is positioned relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// The start (before) or end (after) of the sibling list.
    Boundary,
    /// A live sibling row.
    Row(PresenterId),
    /// A sibling position, used once the reference row is gone.
    Ordinal(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingInsert {
    pub(crate) presenter: PresenterId,
    pub(crate) reference: Reference,
    /// Rows expanded to show the placeholder, outermost first. Rollback
    /// collapses them again.
    pub(crate) expanded: Vec<PresenterId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transaction {
    EditExisting {
        row: PresenterId,
    },
    InsertBeforeRoot(PendingInsert),
    InsertAfterRoot(PendingInsert),
    InsertBeforeChild {
        parent: PresenterId,
        insert: PendingInsert,
    },
    InsertAfterChild {
        parent: PresenterId,
        insert: PendingInsert,
    },
}

impl Transaction {
    fn insert(side: Side, parent: Option<PresenterId>, insert: PendingInsert) -> Self {
        match (side, parent) {
            (Side::Before, None) => Transaction::InsertBeforeRoot(insert),
            (Side::After, None) => Transaction::InsertAfterRoot(insert),
            (Side::Before, Some(parent)) => Transaction::InsertBeforeChild { parent, insert },
            (Side::After, Some(parent)) => Transaction::InsertAfterChild { parent, insert },
        }
    }

    pub(crate) fn state(&self) -> EditState {
        match self {
            Transaction::EditExisting { .. } => EditState::EditingExisting,
            Transaction::InsertBeforeRoot(_) => EditState::InsertingBefore(InsertScope::Root),
            Transaction::InsertAfterRoot(_) => EditState::InsertingAfter(InsertScope::Root),
            Transaction::InsertBeforeChild { .. } => EditState::InsertingBefore(InsertScope::Child),
            Transaction::InsertAfterChild { .. } => EditState::InsertingAfter(InsertScope::Child),
        }
    }

    /// Split an insertion into side, parent and pending state.
    fn into_insert(self) -> Option<(Side, Option<PresenterId>, PendingInsert)> {
        match self {
            Transaction::EditExisting { .. } => None,
            Transaction::InsertBeforeRoot(insert) => Some((Side::Before, None, insert)),
            Transaction::InsertAfterRoot(insert) => Some((Side::After, None, insert)),
            Transaction::InsertBeforeChild { parent, insert } => Some((Side::Before, Some(parent), insert)),
            Transaction::InsertAfterChild { parent, insert } => Some((Side::After, Some(parent), insert)),
        }
    }

    pub(crate) fn pending(&self) -> Option<&PendingInsert> {
        match self {
            Transaction::EditExisting { .. } => None,
            Transaction::InsertBeforeRoot(insert)
            | Transaction::InsertAfterRoot(insert)
            | Transaction::InsertBeforeChild { insert, .. }
            | Transaction::InsertAfterChild { insert, .. } => Some(insert),
        }
    }
}

impl<S: DataSource> RowManager<S> {
    /// Current transaction state.
    pub fn edit_state(&self) -> EditState {
        self.editing
            .as_ref()
            .map_or(EditState::Idle, Transaction::state)
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// The virtual presenter of an open insertion.
    pub fn virtual_row(&self) -> Option<PresenterId> {
        self.editing
            .as_ref()
            .and_then(Transaction::pending)
            .map(|insert| insert.presenter)
    }

    /// Where the open insertion will land, relative to its siblings.
    pub fn insert_reference(&self) -> Option<Reference> {
        self.editing
            .as_ref()
            .and_then(Transaction::pending)
            .map(|insert| insert.reference)
    }

    /// Open an in-place edit of the current row.
    pub fn begin_edit(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let row = self.current.ok_or(GridError::NoCurrentRow)?;
        let data_row = self
            .mapper()
            .row_of(row)
            .ok_or(GridError::InvalidPresenter(row))?;
        self.source_mut().begin_edit(data_row)?;
        self.open(Transaction::EditExisting { row });
        Ok(())
    }

    /// Open an insertion before `reference` among the children of `parent`
    /// (`None` for top-level rows). Without a reference the row goes first.
    pub fn begin_insert_before(
        &mut self,
        parent: Option<PresenterId>,
        reference: Option<PresenterId>,
    ) -> Result<PresenterId> {
        self.begin_insert(Side::Before, parent, reference)
    }

    /// Open an insertion after `reference` among the children of `parent`
    /// (`None` for top-level rows). Without a reference the row goes last.
    pub fn begin_insert_after(
        &mut self,
        parent: Option<PresenterId>,
        reference: Option<PresenterId>,
    ) -> Result<PresenterId> {
        self.begin_insert(Side::After, parent, reference)
    }

    /// Write a cell of the row under edit or of the virtual row.
    pub fn set_value(&mut self, row: PresenterId, column: ColumnId, value: impl Into<CellValue>) -> Result<()> {
        let under_edit = match &self.editing {
            Some(Transaction::EditExisting { row: editing }) => *editing == row,
            Some(tx) => tx.pending().is_some_and(|insert| insert.presenter == row),
            None => false,
        };
        if !under_edit {
            return Err(GridError::NotEditing(row));
        }
        if column.index() >= self.source().column_count() {
            return Err(GridError::UnknownColumn(column));
        }
        let data_row = self
            .mapper()
            .row_of(row)
            .ok_or(GridError::InvalidPresenter(row))?;
        self.source_mut().set_value(data_row, column, value.into())?;
        self.invalidate();
        Ok(())
    }

    /// Commit the open transaction.
    pub fn end_edit(&mut self) -> Result<()> {
        let tx = self.editing.clone().ok_or(GridError::NoEditInProgress)?;
        let _span = PerfSpan::new(span_names::COMMIT);
        match tx.into_insert() {
            None => {
                self.source_mut().end_edit()?;
                self.editing = None;
                self.process_events();
            }
            Some((side, parent, insert)) => self.commit_insert(side, parent, insert)?,
        }
        tracing::debug!(target: targets::MANAGER, "transaction committed");
        self.edit_state_changed.emit(EditState::Idle);
        Ok(())
    }

    /// Cancel the open transaction.
    pub fn rollback_edit(&mut self) -> Result<()> {
        let tx = self.editing.clone().ok_or(GridError::NoEditInProgress)?;
        match tx.into_insert() {
            None => {
                self.source_mut().cancel_edit()?;
                self.editing = None;
                self.process_events();
                self.invalidate();
            }
            Some((_, parent, insert)) => self.rollback_insert(parent, insert)?,
        }
        tracing::debug!(target: targets::MANAGER, "transaction rolled back");
        self.edit_state_changed.emit(EditState::Idle);
        Ok(())
    }

    pub(super) fn ensure_idle(&self) -> Result<()> {
        match &self.editing {
            Some(tx) => Err(GridError::edit_in_progress(tx.state())),
            None => Ok(()),
        }
    }

    fn open(&mut self, tx: Transaction) {
        let state = tx.state();
        self.editing = Some(tx);
        tracing::debug!(target: targets::MANAGER, ?state, "transaction opened");
        self.edit_state_changed.emit(state);
    }

    fn begin_insert(
        &mut self,
        side: Side,
        parent: Option<PresenterId>,
        reference: Option<PresenterId>,
    ) -> Result<PresenterId> {
        self.ensure_idle()?;
        if let Some(parent) = parent {
            if !self.source().is_hierarchical() {
                return Err(GridError::NotHierarchical);
            }
            let live = self.mapper().contains(parent)
                && self.mapper().presenter(parent).is_some_and(|p| !p.is_virtual());
            if !live {
                return Err(GridError::InvalidPresenter(parent));
            }
        }

        let siblings = self.mapper().siblings(parent);
        let index = match reference {
            Some(reference) => {
                if !self.mapper().contains(reference) {
                    return Err(GridError::InvalidPresenter(reference));
                }
                let position = siblings
                    .iter()
                    .position(|&s| s == reference)
                    .ok_or(GridError::invalid_reference(reference, parent))?;
                match side {
                    Side::Before => position,
                    Side::After => position + 1,
                }
            }
            None => match side {
                Side::Before => 0,
                Side::After => siblings.len(),
            },
        };

        let pending_row = self.source_mut().begin_add()?;

        let mut expanded = Vec::new();
        if let Some(parent) = parent {
            expanded = self.normalizer.expand_to(parent)?;
            if self.normalizer.expand(parent)? {
                expanded.push(parent);
            }
        }

        let presenter = self
            .normalizer
            .mapper_mut()
            .attach_transient(parent, index, pending_row);
        self.normalizer.place(presenter);

        self.open(Transaction::insert(
            side,
            parent,
            PendingInsert {
                presenter,
                reference: reference.map_or(Reference::Boundary, Reference::Row),
                expanded,
            },
        ));
        if !self.current_row_change_suspended() {
            self.set_current_internal(Some(presenter));
        }
        self.rows_updated();
        Ok(presenter)
    }

    fn commit_insert(&mut self, side: Side, parent: Option<PresenterId>, insert: PendingInsert) -> Result<()> {
        let parent_row = parent.and_then(|p| self.mapper().row_of(p));
        let child_count = self.source().child_count(parent_row);
        let index = match insert.reference {
            Reference::Boundary => match side {
                Side::Before => 0,
                Side::After => child_count,
            },
            Reference::Row(reference) => {
                let ordinal = self
                    .mapper()
                    .row_of(reference)
                    .and_then(|row| self.source().ordinal(row));
                match (ordinal, side) {
                    (Some(ordinal), Side::Before) => ordinal,
                    (Some(ordinal), Side::After) => ordinal + 1,
                    (None, _) => child_count,
                }
            }
            Reference::Ordinal(ordinal) => self
                .placeholder_index(parent, insert.presenter)
                .unwrap_or(ordinal)
                .min(child_count),
        };

        self.normalizer.unplace(insert.presenter);
        let location = self.normalizer.mapper_mut().detach_transient();

        let row = match self.source_mut().end_add(parent_row, index) {
            Ok(row) => row,
            Err(err) => {
                if let Some((parent, position)) = location {
                    self.normalizer.mapper_mut().reattach_transient(parent, position);
                    self.normalizer.place(insert.presenter);
                }
                return Err(err.into());
            }
        };
        tracing::debug!(target: targets::MANAGER, ?row, ?parent_row, index, "insert committed to source");

        self.editing = None;
        self.committing = true;
        self.normalizer.mapper_mut().begin_commit(row);
        self.process_events();
        let adopted = self.normalizer.mapper_mut().end_commit();
        self.committing = false;

        match adopted {
            Some(presenter) => {
                if !self.current_row_change_suspended() {
                    if !self.is_placed(presenter) {
                        self.normalizer.expand_to(presenter)?;
                    }
                    self.set_current_internal(Some(presenter));
                }
            }
            None => {
                tracing::debug!(target: targets::MANAGER, ?row, "committed row is filtered out");
                self.forget_selected(|_, id| id == insert.presenter);
                if self.current == Some(insert.presenter) {
                    let (parent, position) = location.unwrap_or((parent, 0));
                    let fallback = self.insert_fallback(&insert, parent, position);
                    self.set_current_internal(fallback);
                }
            }
        }
        self.ensure_current_row();
        self.rows_updated();
        Ok(())
    }

    fn rollback_insert(&mut self, parent: Option<PresenterId>, insert: PendingInsert) -> Result<()> {
        self.source_mut().cancel_add()?;
        self.editing = None;

        self.normalizer.unplace(insert.presenter);
        let location = self.normalizer.mapper_mut().detach_transient();
        self.forget_selected(|_, id| id == insert.presenter);
        self.normalizer.mapper_mut().dispose_transient();
        if self.anchor == Some(insert.presenter) {
            self.anchor = None;
        }

        for &row in insert.expanded.iter().rev() {
            if self.mapper().contains(row) {
                self.normalizer.collapse(row)?;
            }
        }

        if self.current == Some(insert.presenter) || self.current.is_none() {
            let (parent, position) = location.unwrap_or((parent, 0));
            let fallback = self.insert_fallback(&insert, parent, position);
            self.set_current_internal(fallback);
        }
        self.ensure_current_row();
        self.rows_updated();
        Ok(())
    }

    /// Source index matching where the placeholder sits: right after the
    /// nearest mapped sibling before it, else right before the nearest one
    /// after it.
    fn placeholder_index(&self, parent: Option<PresenterId>, presenter: PresenterId) -> Option<usize> {
        let siblings = self.mapper().siblings(parent);
        let at = siblings.iter().position(|&s| s == presenter)?;
        let ordinal = |id: &PresenterId| {
            self.mapper()
                .row_of(*id)
                .and_then(|row| self.source().ordinal(row))
        };
        siblings[..at]
            .iter()
            .rev()
            .find_map(ordinal)
            .map(|ordinal| ordinal + 1)
            .or_else(|| siblings[at + 1..].iter().find_map(ordinal))
    }

    /// Current row after a placeholder goes away: the reference row if it
    /// is still shown, else the sibling now at the placeholder's position,
    /// else the parent.
    fn insert_fallback(
        &self,
        insert: &PendingInsert,
        parent: Option<PresenterId>,
        position: usize,
    ) -> Option<PresenterId> {
        if let Reference::Row(reference) = insert.reference
            && self.is_placed(reference)
        {
            return Some(reference);
        }
        self.sibling_fallback(parent, position)
    }

    /// Keep the open transaction valid after `removed` left the tree.
    pub(super) fn reanchor_transaction(
        &mut self,
        removed: PresenterId,
        parent: Option<PresenterId>,
        index: usize,
        ordinal: Option<usize>,
    ) {
        let Some(tx) = self.editing.clone() else {
            return;
        };
        let Some((side, insert_parent, insert)) = tx.clone().into_insert() else {
            if let Transaction::EditExisting { row } = tx
                && self.mapper().is_ancestor_or_self(removed, row)
            {
                tracing::warn!(target: targets::MANAGER, ?row, "row under edit was removed; edit dropped");
                self.editing = None;
                // the source may already have discarded the edit with its row
                match self.source_mut().cancel_edit() {
                    Ok(()) | Err(SourceError::NoPendingEdit) => {}
                    Err(err) => {
                        tracing::warn!(target: targets::MANAGER, %err, "could not cancel edit of removed row");
                    }
                }
                self.edit_state_changed.emit(EditState::Idle);
            }
            return;
        };

        let last_ordinal = ordinal.unwrap_or(index);
        if insert_parent.is_some_and(|p| self.mapper().is_ancestor_or_self(removed, p)) {
            tracing::warn!(
                target: targets::MANAGER,
                ?removed,
                ordinal = last_ordinal,
                "parent of pending insert was removed; moving insert up"
            );
            self.normalizer.unplace(insert.presenter);
            self.normalizer.mapper_mut().detach_transient();
            self.normalizer.mapper_mut().reattach_transient(parent, index);
            let mut expanded: Vec<PresenterId> = insert
                .expanded
                .iter()
                .copied()
                .filter(|&row| !self.mapper().is_ancestor_or_self(removed, row))
                .collect();
            match self.normalizer.expand_to(insert.presenter) {
                Ok(more) => expanded.extend(more),
                Err(err) => {
                    tracing::warn!(target: targets::MANAGER, %err, "could not reveal moved insert");
                }
            }
            let moved = Transaction::insert(
                side,
                parent,
                PendingInsert {
                    presenter: insert.presenter,
                    reference: Reference::Ordinal(last_ordinal),
                    expanded,
                },
            );
            let state_changed = moved.state() != tx.state();
            self.editing = Some(moved);
            self.normalizer.place(insert.presenter);
            if state_changed {
                self.edit_state_changed.emit(self.edit_state());
            }
        } else if let Reference::Row(reference) = insert.reference
            && self.mapper().is_ancestor_or_self(removed, reference)
        {
            tracing::warn!(
                target: targets::MANAGER,
                ?reference,
                ordinal = last_ordinal,
                "reference of pending insert was removed; anchoring to its position"
            );
            self.editing = Some(Transaction::insert(
                side,
                insert_parent,
                PendingInsert {
                    reference: Reference::Ordinal(last_ordinal),
                    ..insert
                },
            ));
        }
    }
}
