//! Virtualization onto a window of realized containers.
//!
//! Only a contiguous run of containers is realized at a time. Each container
//! wraps `flow_repeat` consecutive rows, so row `r` lives in container
//! `r / flow_repeat`. The view slides the run with `realize_*` and
//! `virtualize_*` as it scrolls.
//!
//! The container of the current row is always realized. When it falls
//! outside the run it is kept *isolated* at the front or back of the render
//! order instead:
//!
//! | Placement    | Render order        |
//! |--------------|---------------------|
//! | `None`       | `[run..]`, no current row |
//! | `Alone`      | `[current]`, empty run |
//! | `BeforeList` | `[current, run..]`  |
//! | `WithinList` | `[run..]`, current inside |
//! | `AfterList`  | `[run.., current]`  |
//!
//! # Example
//!
//! ```
//! use horizon_grid::config::GridConfig;
//! use horizon_grid::virtualizer::{Placement, Virtualizer};
//!
//! let mut v = Virtualizer::new(&GridConfig::default()).unwrap();
//! v.refresh(100, Some(0)).unwrap();
//! assert_eq!(v.placement(), Placement::Alone);
//!
//! v.realize_first(0).unwrap();
//! v.realize_next().unwrap();
//! assert_eq!(v.placement(), Placement::WithinList);
//!
//! // scrolling away keeps the current row's container alive
//! v.virtualize_first().unwrap();
//! assert_eq!(v.placement(), Placement::BeforeList);
//! assert_eq!(v.run_ordinals(), vec![1]);
//! ```

mod pool;

pub use pool::{Container, ContainerId, ContainerPool, ContainerShape};

use std::ops::Range;

use horizon_grid_core::logging::targets;

use crate::config::GridConfig;
use crate::error::{GridError, Result};

/// Where the current container sits relative to the realized run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// There is no current row.
    #[default]
    None,
    /// The run is empty; only the current container is realized.
    Alone,
    /// The current container is part of the run.
    WithinList,
    /// The current container precedes the run.
    BeforeList,
    /// The current container follows the run.
    AfterList,
}

/// The realized container window.
#[derive(Debug)]
pub struct Virtualizer {
    flow_repeat: usize,
    row_count: usize,
    /// Realized containers in render order.
    elements: Vec<Container>,
    placement: Placement,
    /// Ordinal of the current container.
    current: Option<usize>,
    pool: ContainerPool,
}

impl Virtualizer {
    pub fn new(config: &GridConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            flow_repeat: config.flow_repeat,
            row_count: 0,
            elements: Vec::new(),
            placement: Placement::None,
            current: None,
            pool: ContainerPool::new(config.pool_capacity),
        })
    }

    pub fn flow_repeat(&self) -> usize {
        self.flow_repeat
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Containers needed to cover every row.
    pub fn container_count(&self) -> usize {
        self.row_count.div_ceil(self.flow_repeat)
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Every realized container in render order.
    pub fn containers(&self) -> &[Container] {
        &self.elements
    }

    pub fn containers_mut(&mut self) -> &mut [Container] {
        &mut self.elements
    }

    /// The realized run, in ordinal order.
    pub fn run(&self) -> &[Container] {
        &self.elements[self.run_range()]
    }

    /// Ordinals of the realized run.
    pub fn run_ordinals(&self) -> Vec<usize> {
        self.run().iter().map(Container::ordinal).collect()
    }

    pub fn current_ordinal(&self) -> Option<usize> {
        self.current
    }

    /// The container holding the current row.
    pub fn current_container(&self) -> Option<&Container> {
        match self.placement {
            Placement::None => None,
            Placement::Alone | Placement::BeforeList => self.elements.first(),
            Placement::AfterList => self.elements.last(),
            Placement::WithinList => self
                .elements
                .iter()
                .find(|c| Some(c.ordinal()) == self.current),
        }
    }

    /// Rows wrapped by a container, clamped to the row count.
    pub fn container_rows(&self, container: &Container) -> Range<usize> {
        let start = container.first_row().min(self.row_count);
        let end = (start + self.flow_repeat).min(self.row_count);
        start..end
    }

    pub fn pool(&self) -> &ContainerPool {
        &self.pool
    }

    /// Containers created so far.
    pub fn created(&self) -> usize {
        self.pool.created()
    }

    /// Containers served from the pool so far.
    pub fn recycled(&self) -> usize {
        self.pool.recycled()
    }

    /// Move the current row, isolating or releasing containers as needed.
    pub fn set_current(&mut self, row_index: Option<usize>) -> Result<()> {
        let target = match row_index {
            Some(row) if row >= self.row_count => {
                return Err(GridError::ordinal_out_of_range(
                    row / self.flow_repeat,
                    self.container_count(),
                ));
            }
            Some(row) => Some(row / self.flow_repeat),
            None => None,
        };
        if target == self.current {
            return Ok(());
        }

        let placement = match target {
            Some(ordinal) => self.placement_for(ordinal),
            None => Placement::None,
        };
        match (self.isolated_index(), target, placement) {
            (Some(index), Some(ordinal), Placement::Alone | Placement::BeforeList | Placement::AfterList) => {
                // swap: the isolated container is rebound where it stands
                let to_front = placement != Placement::AfterList;
                let last = self.elements.len().saturating_sub(1);
                if to_front && index == last && last > 0 {
                    self.elements.rotate_right(1);
                } else if !to_front && index == 0 && last > 0 {
                    self.elements.rotate_left(1);
                }
                let slot = if to_front { 0 } else { last };
                if let Some(container) = self.elements.get_mut(slot) {
                    container.bind(ordinal);
                }
            }
            (Some(index), _, _) => {
                let container = self.elements.remove(index);
                self.pool.release(container);
            }
            (None, Some(ordinal), Placement::Alone | Placement::BeforeList) => {
                let container = self.acquire(ordinal);
                self.elements.insert(0, container);
            }
            (None, Some(ordinal), Placement::AfterList) => {
                let container = self.acquire(ordinal);
                self.elements.push(container);
            }
            (None, _, _) => {}
        }

        tracing::trace!(
            target: targets::VIRTUALIZER,
            old = ?self.current,
            new = ?target,
            ?placement,
            "current container moved"
        );
        self.current = target;
        self.placement = placement;
        Ok(())
    }

    /// Start a run at `ordinal`. The run must be empty.
    pub fn realize_first(&mut self, ordinal: usize) -> Result<()> {
        if !self.run_range().is_empty() {
            return Err(GridError::AlreadyRealized);
        }
        self.check_ordinal(ordinal)?;

        match (self.placement, self.current) {
            (Placement::Alone, Some(current)) if current == ordinal => {
                self.placement = Placement::WithinList;
            }
            (Placement::Alone, Some(current)) => {
                let container = self.acquire(ordinal);
                if current < ordinal {
                    self.elements.push(container);
                    self.placement = Placement::BeforeList;
                } else {
                    self.elements.insert(0, container);
                    self.placement = Placement::AfterList;
                }
            }
            _ => {
                let container = self.acquire(ordinal);
                self.elements.push(container);
            }
        }
        tracing::trace!(target: targets::VIRTUALIZER, ordinal, placement = ?self.placement, "run started");
        Ok(())
    }

    /// Extend the run by one container at its end.
    pub fn realize_next(&mut self) -> Result<()> {
        let (_, last) = self.run_bounds().ok_or(GridError::EmptyContainerList)?;
        let ordinal = last + 1;
        self.check_ordinal(ordinal)?;

        if self.placement == Placement::AfterList && self.current == Some(ordinal) {
            self.placement = Placement::WithinList;
        } else {
            let at = self.run_range().end;
            let container = self.acquire(ordinal);
            self.elements.insert(at, container);
        }
        Ok(())
    }

    /// Extend the run by one container at its start.
    pub fn realize_prev(&mut self) -> Result<()> {
        let (first, _) = self.run_bounds().ok_or(GridError::EmptyContainerList)?;
        let ordinal = first.checked_sub(1).ok_or(GridError::RunAtStart)?;

        if self.placement == Placement::BeforeList && self.current == Some(ordinal) {
            self.placement = Placement::WithinList;
        } else {
            let at = self.run_range().start;
            let container = self.acquire(ordinal);
            self.elements.insert(at, container);
        }
        Ok(())
    }

    /// Drop the first container of the run. The current container is
    /// isolated instead of released.
    pub fn virtualize_first(&mut self) -> Result<()> {
        let range = self.run_range();
        if range.is_empty() {
            return Err(GridError::EmptyContainerList);
        }
        let holds_current = self
            .elements
            .get(range.start)
            .is_some_and(|c| Some(c.ordinal()) == self.current);
        if holds_current {
            self.placement = if range.len() == 1 {
                Placement::Alone
            } else {
                Placement::BeforeList
            };
        } else {
            let container = self.elements.remove(range.start);
            self.pool.release(container);
            self.settle_empty_run();
        }
        Ok(())
    }

    /// Drop the last container of the run. The current container is
    /// isolated instead of released.
    pub fn virtualize_last(&mut self) -> Result<()> {
        let range = self.run_range();
        if range.is_empty() {
            return Err(GridError::EmptyContainerList);
        }
        let last = range.end - 1;
        let holds_current = self
            .elements
            .get(last)
            .is_some_and(|c| Some(c.ordinal()) == self.current);
        if holds_current {
            self.placement = if range.len() == 1 {
                Placement::Alone
            } else {
                Placement::AfterList
            };
        } else {
            let container = self.elements.remove(last);
            self.pool.release(container);
            self.settle_empty_run();
        }
        Ok(())
    }

    /// Drop the whole run, keeping only the current container.
    pub fn virtualize_all(&mut self) {
        let current = self.current;
        let mut kept = None;
        for container in std::mem::take(&mut self.elements) {
            if kept.is_none() && Some(container.ordinal()) == current {
                kept = Some(container);
            } else {
                self.pool.release(container);
            }
        }
        self.placement = match kept {
            Some(container) => {
                self.elements.push(container);
                Placement::Alone
            }
            None => Placement::None,
        };
        tracing::trace!(target: targets::VIRTUALIZER, placement = ?self.placement, "run dropped");
    }

    /// Adopt a new row count and current row, trimming run containers
    /// past the end.
    pub fn refresh(&mut self, row_count: usize, current_row: Option<usize>) -> Result<()> {
        self.row_count = row_count;
        let count = self.container_count();
        while let Some((_, last)) = self.run_bounds()
            && last >= count
        {
            if self.current == Some(last) {
                // stale current; set_current below rebinds or releases it
                self.current = None;
                let index = self.run_range().end - 1;
                let container = self.elements.remove(index);
                self.pool.release(container);
                self.placement = self.placement_without_current();
            } else {
                self.virtualize_last()?;
            }
        }
        if let Some(current) = self.current
            && current >= count
        {
            if let Some(index) = self.isolated_index() {
                let container = self.elements.remove(index);
                self.pool.release(container);
            }
            self.current = None;
            self.placement = Placement::None;
        }
        self.set_current(current_row.filter(|&row| row < row_count))?;
        tracing::debug!(
            target: targets::VIRTUALIZER,
            row_count,
            containers = self.elements.len(),
            placement = ?self.placement,
            "virtualizer refreshed"
        );
        Ok(())
    }

    fn acquire(&mut self, ordinal: usize) -> Container {
        let shape = ContainerShape {
            slots: self.flow_repeat,
        };
        self.pool.acquire(shape, ordinal)
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        let count = self.container_count();
        if ordinal >= count {
            return Err(GridError::ordinal_out_of_range(ordinal, count));
        }
        Ok(())
    }

    /// Render-order range of the run.
    fn run_range(&self) -> Range<usize> {
        let len = self.elements.len();
        match self.placement {
            Placement::None | Placement::WithinList => 0..len,
            Placement::Alone => 0..0,
            Placement::BeforeList => 1.min(len)..len,
            Placement::AfterList => 0..len.saturating_sub(1),
        }
    }

    fn run_bounds(&self) -> Option<(usize, usize)> {
        let run = self.run();
        Some((run.first()?.ordinal(), run.last()?.ordinal()))
    }

    /// Render-order index of the isolated current container.
    fn isolated_index(&self) -> Option<usize> {
        match self.placement {
            Placement::Alone | Placement::BeforeList => Some(0),
            Placement::AfterList => self.elements.len().checked_sub(1),
            Placement::None | Placement::WithinList => None,
        }
    }

    fn placement_for(&self, ordinal: usize) -> Placement {
        match self.run_bounds() {
            None => Placement::Alone,
            Some((first, _)) if ordinal < first => Placement::BeforeList,
            Some((_, last)) if ordinal > last => Placement::AfterList,
            Some(_) => Placement::WithinList,
        }
    }

    /// Placement once the current row's container has left the run.
    fn placement_without_current(&self) -> Placement {
        match self.placement {
            Placement::WithinList => Placement::None,
            other => other,
        }
    }

    /// An isolated current container with nothing left beside it is alone.
    fn settle_empty_run(&mut self) {
        if self.run_range().is_empty()
            && matches!(self.placement, Placement::BeforeList | Placement::AfterList)
        {
            self.placement = Placement::Alone;
        }
    }
}
