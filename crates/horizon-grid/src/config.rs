//! Configuration for the row manager and virtualizer.

use crate::error::{GridError, Result};
use crate::manager::SelectionMode;
use crate::source::ColumnId;

/// Settings shared by [`RowManager`](crate::manager::RowManager) and
/// [`Virtualizer`](crate::virtualizer::Virtualizer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridConfig {
    /// Policy used by [`RowManager::select`](crate::manager::RowManager::select).
    pub selection_mode: SelectionMode,
    /// Rows per realized container. Must be at least 1.
    pub flow_repeat: usize,
    /// Idle containers kept per shape for reuse.
    pub pool_capacity: usize,
    /// Rows shallower than this start expanded.
    pub initial_expand_depth: usize,
    /// Columns whose values identify a row across reloads.
    pub match_columns: Vec<ColumnId>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::Single,
            flow_repeat: 1,
            pool_capacity: 32,
            initial_expand_depth: 0,
            match_columns: Vec::new(),
        }
    }
}

impl GridConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a validated builder.
    pub fn builder() -> GridConfigBuilder {
        GridConfigBuilder::default()
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if self.flow_repeat == 0 {
            return Err(GridError::invalid_config("flow_repeat must be at least 1"));
        }
        Ok(())
    }
}

/// Builder for [`GridConfig`].
///
/// # Example
///
/// ```
/// use horizon_grid::config::GridConfig;
/// use horizon_grid::manager::SelectionMode;
///
/// let config = GridConfig::builder()
///     .selection_mode(SelectionMode::Extended)
///     .flow_repeat(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.flow_repeat, 3);
///
/// assert!(GridConfig::builder().flow_repeat(0).build().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct GridConfigBuilder {
    config: GridConfig,
}

impl GridConfigBuilder {
    /// Set the selection policy.
    pub fn selection_mode(mut self, mode: SelectionMode) -> Self {
        self.config.selection_mode = mode;
        self
    }

    /// Set the number of rows per container.
    pub fn flow_repeat(mut self, rows: usize) -> Self {
        self.config.flow_repeat = rows;
        self
    }

    /// Set how many idle containers are kept per shape.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.pool_capacity = capacity;
        self
    }

    /// Expand rows down to this depth on load.
    pub fn initial_expand_depth(mut self, depth: usize) -> Self {
        self.config.initial_expand_depth = depth;
        self
    }

    /// Set the match columns.
    pub fn match_columns(mut self, columns: impl IntoIterator<Item = ColumnId>) -> Self {
        self.config.match_columns = columns.into_iter().collect();
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<GridConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
