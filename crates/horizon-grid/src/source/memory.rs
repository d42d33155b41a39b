//! An in-memory [`DataSource`].

use slotmap::SlotMap;

use super::{CellValue, ColumnId, DataSource, RowId, SourceEvent};
use crate::error::SourceError;
use horizon_grid_core::logging::targets;

/// A node in the row arena.
#[derive(Debug, Clone)]
struct RowNode {
    values: Vec<CellValue>,
    parent: Option<RowId>,
    children: Vec<RowId>,
    attached: bool,
}

impl RowNode {
    fn detached(column_count: usize) -> Self {
        Self {
            values: vec![CellValue::None; column_count],
            parent: None,
            children: Vec::new(),
            attached: false,
        }
    }
}

/// Buffered values of an open edit.
#[derive(Debug, Clone)]
struct EditBuffer {
    row: RowId,
    values: Vec<(ColumnId, CellValue)>,
}

impl EditBuffer {
    fn get(&self, column: ColumnId) -> Option<&CellValue> {
        self.values
            .iter()
            .rev()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }
}

/// A column-keyed row store held in an arena.
///
/// Every mutation queues [`SourceEvent`]s which the owner drains into the
/// row manager. Removing a row removes its whole subtree and queues one
/// `RowRemoved` for the subtree root.
///
/// # Example
///
/// ```
/// use horizon_grid::source::{ColumnId, DataSource, MemorySource};
///
/// let mut source = MemorySource::hierarchical(1);
/// let root = source.push_row(None, ["Root".into()]).unwrap();
/// let child = source.push_row(Some(root), ["Child".into()]).unwrap();
///
/// assert_eq!(source.children(Some(root)), &[child]);
/// assert_eq!(source.value(child, ColumnId(0)).as_str(), Some("Child"));
/// assert_eq!(source.drain_events().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    hierarchical: bool,
    column_count: usize,
    nodes: SlotMap<RowId, RowNode>,
    roots: Vec<RowId>,
    pending_add: Option<RowId>,
    editing: Option<EditBuffer>,
    events: Vec<SourceEvent>,
}

impl MemorySource {
    /// Create an empty flat source.
    pub fn new(column_count: usize) -> Self {
        Self {
            hierarchical: false,
            column_count,
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            pending_add: None,
            editing: None,
            events: Vec::new(),
        }
    }

    /// Create an empty hierarchical source.
    pub fn hierarchical(column_count: usize) -> Self {
        Self {
            hierarchical: true,
            ..Self::new(column_count)
        }
    }

    /// Number of attached rows, at every level.
    pub fn len(&self) -> usize {
        self.nodes.values().filter(|n| n.attached).count()
    }

    /// Whether the source has no attached rows.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// All values of a row, with any open edit applied.
    pub fn row_values(&self, row: RowId) -> Option<Vec<CellValue>> {
        let node = self.nodes.get(row)?;
        Some(
            (0..self.column_count)
                .map(|c| self.read(row, node, ColumnId(c)))
                .collect(),
        )
    }

    /// Append a row under `parent`.
    pub fn push_row<I>(&mut self, parent: Option<RowId>, values: I) -> Result<RowId, SourceError>
    where
        I: IntoIterator<Item = CellValue>,
    {
        let index = self.checked_children(parent)?.len();
        self.insert_row(parent, index, values)
    }

    /// Insert a row under `parent` at `index`.
    pub fn insert_row<I>(
        &mut self,
        parent: Option<RowId>,
        index: usize,
        values: I,
    ) -> Result<RowId, SourceError>
    where
        I: IntoIterator<Item = CellValue>,
    {
        let len = self.checked_children(parent)?.len();
        if index > len {
            return Err(SourceError::index_out_of_range(index, len));
        }
        let mut node = RowNode::detached(self.column_count);
        for (slot, value) in node.values.iter_mut().zip(values) {
            *slot = value;
        }
        let row = self.nodes.insert(node);
        self.attach(row, parent, index);
        Ok(row)
    }

    /// Remove a row and its subtree.
    pub fn remove_row(&mut self, row: RowId) -> Result<(), SourceError> {
        let (parent, last_index) = match self.nodes.get(row) {
            Some(node) if node.attached => (node.parent, self.ordinal(row).unwrap_or(0)),
            _ => return Err(SourceError::UnknownRow(row)),
        };
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(p) {
                    parent_node.children.remove(last_index);
                }
            }
            None => {
                self.roots.remove(last_index);
            }
        }

        let mut stack = vec![row];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(id) {
                stack.extend(node.children);
            }
            if self.editing.as_ref().is_some_and(|e| e.row == id) {
                tracing::debug!(target: targets::SOURCE, ?id, "open edit dropped with its row");
                self.editing = None;
            }
        }

        tracing::trace!(target: targets::SOURCE, ?row, ?parent, last_index, "row removed");
        self.events.push(SourceEvent::RowRemoved {
            row,
            parent,
            last_index,
        });
        Ok(())
    }

    /// Remove every row.
    pub fn clear(&mut self) -> Result<(), SourceError> {
        while let Some(&row) = self.roots.last() {
            self.remove_row(row)?;
        }
        Ok(())
    }

    fn checked_children(&self, parent: Option<RowId>) -> Result<&[RowId], SourceError> {
        match parent {
            None => Ok(&self.roots),
            Some(_) if !self.hierarchical => Err(SourceError::NotHierarchical),
            Some(p) => match self.nodes.get(p) {
                Some(node) if node.attached => Ok(&node.children),
                _ => Err(SourceError::UnknownRow(p)),
            },
        }
    }

    fn attach(&mut self, row: RowId, parent: Option<RowId>, index: usize) {
        self.events.push(SourceEvent::RowInserting { row });
        if let Some(node) = self.nodes.get_mut(row) {
            node.parent = parent;
            node.attached = true;
        }
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(p) {
                    parent_node.children.insert(index, row);
                }
            }
            None => self.roots.insert(index, row),
        }
        tracing::trace!(target: targets::SOURCE, ?row, ?parent, index, "row inserted");
        self.events.push(SourceEvent::RowInserted { row });
    }

    fn read(&self, row: RowId, node: &RowNode, column: ColumnId) -> CellValue {
        if let Some(edit) = &self.editing
            && edit.row == row
            && let Some(value) = edit.get(column)
        {
            return value.clone();
        }
        node.values.get(column.0).cloned().unwrap_or_default()
    }

    fn check_column(&self, column: ColumnId) -> Result<(), SourceError> {
        if column.0 < self.column_count {
            Ok(())
        } else {
            Err(SourceError::unknown_column(column, self.column_count))
        }
    }
}

impl DataSource for MemorySource {
    fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    fn column_count(&self) -> usize {
        self.column_count
    }

    fn children(&self, parent: Option<RowId>) -> &[RowId] {
        match parent {
            None => &self.roots,
            Some(p) => self
                .nodes
                .get(p)
                .filter(|n| n.attached)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn parent(&self, row: RowId) -> Option<RowId> {
        self.nodes.get(row).and_then(|n| n.parent)
    }

    fn ordinal(&self, row: RowId) -> Option<usize> {
        let node = self.nodes.get(row).filter(|n| n.attached)?;
        self.children(node.parent).iter().position(|&r| r == row)
    }

    fn contains(&self, row: RowId) -> bool {
        self.nodes.get(row).is_some_and(|n| n.attached)
    }

    fn value(&self, row: RowId, column: ColumnId) -> CellValue {
        match self.nodes.get(row) {
            Some(node) => self.read(row, node, column),
            None => CellValue::None,
        }
    }

    fn begin_add(&mut self) -> Result<RowId, SourceError> {
        if self.pending_add.is_some() {
            return Err(SourceError::AddPending);
        }
        let row = self.nodes.insert(RowNode::detached(self.column_count));
        self.pending_add = Some(row);
        tracing::debug!(target: targets::SOURCE, ?row, "add pending");
        Ok(row)
    }

    fn end_add(&mut self, parent: Option<RowId>, index: usize) -> Result<RowId, SourceError> {
        let row = self.pending_add.ok_or(SourceError::NoPendingAdd)?;
        let len = self.checked_children(parent)?.len();
        if index > len {
            return Err(SourceError::index_out_of_range(index, len));
        }
        self.pending_add = None;
        self.attach(row, parent, index);
        Ok(row)
    }

    fn cancel_add(&mut self) -> Result<(), SourceError> {
        let row = self.pending_add.take().ok_or(SourceError::NoPendingAdd)?;
        self.nodes.remove(row);
        tracing::debug!(target: targets::SOURCE, ?row, "add cancelled");
        Ok(())
    }

    fn begin_edit(&mut self, row: RowId) -> Result<(), SourceError> {
        if let Some(edit) = &self.editing {
            return Err(SourceError::EditPending(edit.row));
        }
        if !self.contains(row) {
            return Err(SourceError::UnknownRow(row));
        }
        self.editing = Some(EditBuffer {
            row,
            values: Vec::new(),
        });
        Ok(())
    }

    fn end_edit(&mut self) -> Result<(), SourceError> {
        let edit = self.editing.take().ok_or(SourceError::NoPendingEdit)?;
        let Some(node) = self.nodes.get_mut(edit.row) else {
            return Err(SourceError::UnknownRow(edit.row));
        };
        let mut columns: Vec<ColumnId> = Vec::new();
        for (column, value) in edit.values {
            if node.values[column.0] != value {
                node.values[column.0] = value;
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        if !columns.is_empty() {
            columns.sort();
            self.events.push(SourceEvent::ValueChanged {
                row: edit.row,
                columns,
            });
        }
        Ok(())
    }

    fn cancel_edit(&mut self) -> Result<(), SourceError> {
        self.editing.take().ok_or(SourceError::NoPendingEdit)?;
        Ok(())
    }

    fn set_value(&mut self, row: RowId, column: ColumnId, value: CellValue) -> Result<(), SourceError> {
        self.check_column(column)?;
        if let Some(edit) = &mut self.editing
            && edit.row == row
        {
            edit.values.push((column, value));
            return Ok(());
        }
        let pending = self.pending_add == Some(row);
        let node = match self.nodes.get_mut(row) {
            Some(node) if node.attached || pending => node,
            _ => return Err(SourceError::UnknownRow(row)),
        };
        if node.values[column.0] == value {
            return Ok(());
        }
        node.values[column.0] = value;
        if !pending {
            self.events.push(SourceEvent::ValueChanged {
                row,
                columns: vec![column],
            });
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<SourceEvent> {
        std::mem::take(&mut self.events)
    }
}
