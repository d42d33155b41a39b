//! Core systems for Horizon Grid.
//!
//! This crate provides the small foundation the row presenter crate builds on:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Batched Invalidation**: Suspend/resume bookkeeping for deferred refresh
//! - **Logging**: `tracing` targets, span names and a tree debug formatter
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let rows_changed = Signal::<usize>::new();
//!
//! let conn_id = rows_changed.connect(|count| {
//!     println!("now showing {} rows", count);
//! });
//!
//! rows_changed.emit(42);
//! rows_changed.disconnect(conn_id);
//! ```

pub mod batch;
pub mod logging;
pub mod signal;

pub use batch::InvalidationBatch;
pub use logging::{DebugTree, PerfSpan, TreeDebug, TreeFormatOptions, TreeStyle};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
