//! The view-facing facade: rows and realized containers kept in step.

use horizon_grid_core::logging::targets;

use crate::config::GridConfig;
use crate::error::Result;
use crate::manager::RowManager;
use crate::presenter::PresenterId;
use crate::source::DataSource;
use crate::virtualizer::{Container, Virtualizer};

/// A [`RowManager`] and a [`Virtualizer`] that follows it.
///
/// Every change to the rows goes through [`update`](Self::update), after
/// which the virtualizer is refreshed with the new row count and current
/// row, so the current row's container stays realized.
///
/// # Example
///
/// ```
/// use horizon_grid::config::GridConfig;
/// use horizon_grid::element::ElementManager;
/// use horizon_grid::source::MemorySource;
///
/// let mut source = MemorySource::new(1);
/// for name in ["a", "b", "c", "d"] {
///     source.push_row(None, [name.into()]).unwrap();
/// }
/// let mut grid = ElementManager::new(source, GridConfig::default()).unwrap();
/// grid.realize_window(2, 2).unwrap();
/// assert_eq!(grid.virtualizer().run_ordinals(), vec![2, 3]);
///
/// // row 0 is current, so its container stays realized ahead of the run
/// assert_eq!(grid.virtualizer().containers().len(), 3);
/// ```
#[derive(Debug)]
pub struct ElementManager<S> {
    rows: RowManager<S>,
    virtualizer: Virtualizer,
}

impl<S: DataSource> ElementManager<S> {
    pub fn new(source: S, config: GridConfig) -> Result<Self> {
        let virtualizer = Virtualizer::new(&config)?;
        let rows = RowManager::new(source, config)?;
        let mut manager = Self { rows, virtualizer };
        manager.sync()?;
        Ok(manager)
    }

    pub fn rows(&self) -> &RowManager<S> {
        &self.rows
    }

    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    pub fn virtualizer_mut(&mut self) -> &mut Virtualizer {
        &mut self.virtualizer
    }

    /// Change the rows, then bring the virtualizer up to date.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut RowManager<S>) -> Result<R>) -> Result<R> {
        let result = f(&mut self.rows);
        self.sync()?;
        result
    }

    /// Re-read the row count and current row into the virtualizer.
    pub fn sync(&mut self) -> Result<()> {
        self.virtualizer
            .refresh(self.rows.row_count(), self.rows.current_index())
    }

    pub fn realize_first(&mut self, ordinal: usize) -> Result<()> {
        self.virtualizer.realize_first(ordinal)
    }

    pub fn realize_next(&mut self) -> Result<()> {
        self.virtualizer.realize_next()
    }

    pub fn realize_prev(&mut self) -> Result<()> {
        self.virtualizer.realize_prev()
    }

    pub fn virtualize_first(&mut self) -> Result<()> {
        self.virtualizer.virtualize_first()
    }

    pub fn virtualize_last(&mut self) -> Result<()> {
        self.virtualizer.virtualize_last()
    }

    pub fn virtualize_all(&mut self) {
        self.virtualizer.virtualize_all();
    }

    /// Replace the run with `len` containers starting at `first`, clamped
    /// to the available containers.
    pub fn realize_window(&mut self, first: usize, len: usize) -> Result<()> {
        self.virtualizer.virtualize_all();
        let end = (first + len).min(self.virtualizer.container_count());
        if first >= end {
            return Ok(());
        }
        self.virtualizer.realize_first(first)?;
        for _ in first + 1..end {
            self.virtualizer.realize_next()?;
        }
        tracing::trace!(target: targets::VIRTUALIZER, first, end, "window realized");
        Ok(())
    }

    /// Presenters shown by a container.
    pub fn container_rows(&self, container: &Container) -> &[PresenterId] {
        let range = self.virtualizer.container_rows(container);
        self.rows.rows().get(range).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ColumnId, MemorySource};
    use crate::virtualizer::Placement;

    fn grid(count: usize, flow_repeat: usize) -> ElementManager<MemorySource> {
        let mut source = MemorySource::new(1);
        for i in 0..count {
            source.push_row(None, [(i as i64).into()]).unwrap();
        }
        let config = GridConfig::builder().flow_repeat(flow_repeat).build().unwrap();
        ElementManager::new(source, config).unwrap()
    }

    #[test]
    fn test_current_row_container_follows_navigation() {
        let mut grid = grid(20, 1);
        grid.realize_window(0, 5).unwrap();
        assert_eq!(grid.virtualizer().placement(), Placement::WithinList);

        grid.update(|rows| Ok(rows.move_to_last())).unwrap();
        assert_eq!(grid.virtualizer().placement(), Placement::AfterList);
        assert_eq!(grid.virtualizer().current_ordinal(), Some(19));
    }

    #[test]
    fn test_container_rows_respect_flow_repeat() {
        let mut grid = grid(5, 2);
        grid.realize_window(0, 3).unwrap();
        let last = grid.virtualizer().run().last().unwrap();
        let shown = grid.container_rows(last);
        assert_eq!(shown.len(), 1);
        assert_eq!(grid.rows().value(shown[0], ColumnId(0)).as_int(), Some(4));
    }

    #[test]
    fn test_removing_rows_trims_run() {
        let mut grid = grid(4, 1);
        grid.realize_window(0, 4).unwrap();
        grid.update(|rows| {
            let last = rows.row_at(3).and_then(|id| rows.mapper().row_of(id));
            if let Some(row) = last {
                rows.mutate(|source| source.remove_row(row))?;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(grid.virtualizer().run_ordinals(), vec![0, 1, 2]);
    }
}
