//! Selection policies.

use horizon_grid_core::logging::targets;

use super::RowManager;
use crate::error::Result;
use crate::presenter::PresenterId;
use crate::source::DataSource;

/// How [`RowManager::select`] treats the acted-on row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// The acted-on row replaces the selection.
    #[default]
    Single,
    /// The acted-on row is toggled.
    Multiple,
    /// The range between the anchor and the acted-on row is selected.
    Extended,
}

impl<S: DataSource> RowManager<S> {
    /// Select `row` with the configured policy and make it current.
    pub fn select(&mut self, row: PresenterId) -> Result<()> {
        self.select_with(row, self.config.selection_mode)
    }

    /// Select `row` with an explicit policy and make it current.
    ///
    /// `Extended` selects the range between the anchor and `row`. The anchor
    /// is the row of the last non-extended selection, or the current row
    /// before the first extended action.
    pub fn select_with(&mut self, row: PresenterId, mode: SelectionMode) -> Result<()> {
        let raw = self.check_placed(row)?;
        let target: Vec<PresenterId> = match mode {
            SelectionMode::Single => {
                self.anchor = Some(row);
                vec![row]
            }
            SelectionMode::Multiple => {
                self.anchor = Some(row);
                let mut target = self.selected.clone();
                match target.iter().position(|&s| s == row) {
                    Some(pos) => {
                        target.remove(pos);
                    }
                    None => target.push(row),
                }
                target
            }
            SelectionMode::Extended => {
                let anchor = self
                    .anchor
                    .filter(|&a| self.is_placed(a))
                    .or(self.current.filter(|&c| self.is_placed(c)))
                    .unwrap_or(row);
                self.anchor = Some(anchor);
                let anchor_raw = self.normalizer.raw_index(anchor).unwrap_or(raw);
                let (first, last) = if anchor_raw <= raw {
                    (anchor_raw, raw)
                } else {
                    (raw, anchor_raw)
                };
                self.normalizer.rows()[first..=last].to_vec()
            }
        };
        tracing::trace!(target: targets::MANAGER, ?row, ?mode, count = target.len(), "select");
        self.replace_selection(target);
        self.set_current_internal(Some(row));
        Ok(())
    }

    /// Select every visible row. Ignored under the `Single` policy.
    pub fn select_all(&mut self) {
        if self.config.selection_mode == SelectionMode::Single {
            tracing::debug!(target: targets::MANAGER, "select_all ignored in single selection mode");
            return;
        }
        let all = self.normalizer.rows().to_vec();
        self.replace_selection(all);
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) {
        self.replace_selection(Vec::new());
        self.anchor = None;
    }

    pub fn is_selected(&self, row: PresenterId) -> bool {
        self.mapper().presenter(row).is_some_and(|p| p.is_selected())
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    /// The anchor of range selection.
    pub fn anchor(&self) -> Option<PresenterId> {
        self.anchor
    }

    /// Selected rows in display order. Rows hidden under a collapsed
    /// ancestor follow in selection order.
    pub fn selected_rows(&self) -> Vec<PresenterId> {
        let mut rows = self.selected.clone();
        rows.sort_by_key(|&id| self.normalizer.raw_index(id).unwrap_or(usize::MAX));
        rows
    }

    /// Make `target` the selection, emitting the difference.
    pub(super) fn replace_selection(&mut self, target: Vec<PresenterId>) {
        let deselected: Vec<PresenterId> = self
            .selected
            .iter()
            .copied()
            .filter(|id| !target.contains(id))
            .collect();
        let selected: Vec<PresenterId> = target
            .iter()
            .copied()
            .filter(|id| !self.selected.contains(id))
            .collect();

        for &id in &deselected {
            if let Some(p) = self.normalizer.mapper_mut().presenter_mut(id) {
                p.set_selected(false);
            }
        }
        for &id in &selected {
            if let Some(p) = self.normalizer.mapper_mut().presenter_mut(id) {
                p.set_selected(true);
            }
        }
        self.selected = target;

        if !selected.is_empty() || !deselected.is_empty() {
            self.selection_changed.emit((selected, deselected));
        }
    }

    /// Drop rows that are gone from the selection without touching their
    /// presenters.
    pub(super) fn forget_selected(&mut self, gone: impl Fn(&Self, PresenterId) -> bool) {
        let dropped: Vec<PresenterId> = self
            .selected
            .iter()
            .copied()
            .filter(|&id| gone(self, id))
            .collect();
        if dropped.is_empty() {
            return;
        }
        self.selected.retain(|id| !dropped.contains(id));
        self.selection_changed.emit((Vec::new(), dropped));
    }
}
