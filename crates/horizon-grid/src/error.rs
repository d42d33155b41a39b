//! Error types for the row presenter core.

use crate::manager::EditState;
use crate::presenter::PresenterId;
use crate::source::{ColumnId, RowId};

/// Result type alias for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors raised by a [`DataSource`](crate::source::DataSource).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The row does not exist or is not attached.
    #[error("Unknown row {0:?}")]
    UnknownRow(RowId),

    /// The column index is outside the source's column range.
    #[error("Unknown column {column:?} (source has {count} columns)")]
    UnknownColumn { column: ColumnId, count: usize },

    /// An insertion index is past the end of the sibling list.
    #[error("Insertion index {index} out of range (sibling count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// `begin_add` was called while an add is pending.
    #[error("An add is already pending")]
    AddPending,

    /// `end_add`/`cancel_add` without a pending add.
    #[error("No add is pending")]
    NoPendingAdd,

    /// `begin_edit` was called while an edit is open.
    #[error("Row {0:?} is already being edited")]
    EditPending(RowId),

    /// `end_edit`/`cancel_edit` without an open edit.
    #[error("No edit is open")]
    NoPendingEdit,

    /// A parent row was supplied to a flat source.
    #[error("Source is not hierarchical")]
    NotHierarchical,
}

impl SourceError {
    /// Create an unknown column error.
    pub fn unknown_column(column: ColumnId, count: usize) -> Self {
        Self::UnknownColumn { column, count }
    }

    /// Create an index error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }
}

/// Errors that can occur in the row presenter core.
///
/// All of these are precondition violations reported at the call site.
/// Races between an open transaction and external source mutation are
/// recovered internally and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A transaction was requested while another one is open.
    #[error("An edit transaction is already open ({state:?})")]
    EditInProgress { state: EditState },

    /// Commit/rollback without an open transaction.
    #[error("No edit transaction is open")]
    NoEditInProgress,

    /// The handle is stale: its presenter was disposed.
    #[error("Presenter {0:?} does not exist")]
    InvalidPresenter(PresenterId),

    /// The presenter exists but is not in the visible sequence.
    #[error("Presenter {0:?} is not placed")]
    NotPlaced(PresenterId),

    /// The presenter is not the one under edit.
    #[error("Presenter {0:?} is not under edit")]
    NotEditing(PresenterId),

    /// The reference row of an insertion is not a child of the given parent.
    #[error("Reference {reference:?} is not a child of {parent:?}")]
    InvalidReference {
        reference: PresenterId,
        parent: Option<PresenterId>,
    },

    /// A parent was given for a flat data source.
    #[error("Child insertion requires a hierarchical source")]
    NotHierarchical,

    /// The operation needs a current row.
    #[error("There is no current row")]
    NoCurrentRow,

    /// A match or sort column is not known to the source.
    #[error("Unknown column {0:?}")]
    UnknownColumn(ColumnId),

    /// The realized container run is empty.
    #[error("The realized container run is empty")]
    EmptyContainerList,

    /// The realized container run is not empty.
    #[error("Containers are already realized")]
    AlreadyRealized,

    /// The realized run already starts at the first container.
    #[error("The realized container run already starts at ordinal 0")]
    RunAtStart,

    /// A container ordinal past the end of the row sequence.
    #[error("Container ordinal {ordinal} out of range (container count {count})")]
    OrdinalOutOfRange { ordinal: usize, count: usize },

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error reported by the data source.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl GridError {
    /// Create a nested transaction error.
    pub fn edit_in_progress(state: EditState) -> Self {
        Self::EditInProgress { state }
    }

    /// Create an invalid reference error.
    pub fn invalid_reference(reference: PresenterId, parent: Option<PresenterId>) -> Self {
        Self::InvalidReference { reference, parent }
    }

    /// Create an ordinal range error.
    pub fn ordinal_out_of_range(ordinal: usize, count: usize) -> Self {
        Self::OrdinalOutOfRange { ordinal, count }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
