//! Horizon Grid - row presenters and container virtualization for data grids.
//!
//! The crate sits between a data source and a renderer:
//!
//! - [`source`]: the [`DataSource`](source::DataSource) boundary, plus the
//!   in-memory [`MemorySource`](source::MemorySource)
//! - [`mapper`]: one lightweight presenter per mapped row, kept in step with
//!   source events under an optional filter and sort
//! - [`normalizer`]: the expansion-aware flat row sequence
//! - [`manager`]: current row, selection policies and edit/insert
//!   transactions
//! - [`virtualizer`]: a contiguous window of realized, recycled containers
//! - [`element`]: the manager and virtualizer kept in sync for a view
//!
//! # Example
//!
//! ```
//! use horizon_grid::prelude::*;
//!
//! let mut source = MemorySource::hierarchical(1);
//! let root = source.push_row(None, ["Root".into()]).unwrap();
//! source.push_row(Some(root), ["X".into()]).unwrap();
//! let y = source.push_row(Some(root), ["Y".into()]).unwrap();
//! source.push_row(Some(y), ["Z".into()]).unwrap();
//!
//! let mut rows = RowManager::new(source, GridConfig::default()).unwrap();
//! rows.set_filter(Some(column_equals(ColumnId(0), "Z"))).unwrap();
//! rows.expand_all();
//!
//! let shown: Vec<String> = rows
//!     .rows()
//!     .iter()
//!     .map(|&id| rows.value(id, ColumnId(0)).to_string())
//!     .collect();
//! assert_eq!(shown, ["Root", "Y", "Z"]);
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod matching;
pub mod normalizer;
pub mod presenter;
pub mod source;
pub mod virtualizer;

pub use horizon_grid_core;

pub use config::{GridConfig, GridConfigBuilder};
pub use element::ElementManager;
pub use error::{GridError, Result, SourceError};
pub use manager::{EditState, InsertScope, Reference, RowManager, SelectionMode};
pub use presenter::{PresenterId, RowPresenter};
pub use source::{CellValue, ColumnId, DataSource, MemorySource, RowId};
pub use virtualizer::{Placement, Virtualizer};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::GridConfig;
    pub use crate::element::ElementManager;
    pub use crate::error::{GridError, Result};
    pub use crate::manager::{EditState, RowManager, SelectionMode};
    pub use crate::mapper::{SortKey, column_contains, column_equals, sort_by_columns};
    pub use crate::presenter::PresenterId;
    pub use crate::source::{CellValue, ColumnId, DataSource, MemorySource};
    pub use horizon_grid_core::Signal;
}

static_assertions::assert_impl_all!(PresenterId: Send, Sync, Copy);
static_assertions::assert_impl_all!(RowManager<MemorySource>: Send);
static_assertions::assert_impl_all!(Virtualizer: Send);
