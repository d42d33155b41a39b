//! Signal/slot system for Horizon Grid.
//!
//! Signals are how the row machinery tells the rendering layer that something
//! changed: the current row moved, the selection changed, rows were inserted
//! or an edit transaction opened. Connected slots (callbacks) are invoked
//! synchronously on the emitting thread, in connection order.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Reentrancy
//!
//! The connection table is snapshotted before slots run, so a slot may
//! connect or disconnect on the same signal. Connections made during an
//! emission are not invoked by that emission.
//!
//! # Example
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let current_changed = Signal::<usize>::new();
//!
//! let conn_id = current_changed.connect(|row| {
//!     println!("current row is now {}", row);
//! });
//!
//! current_changed.emit(3);
//! current_changed.disconnect(conn_id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(usize, usize)` for multiple arguments.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Connect a slot that is disconnected when the returned guard is dropped.
    ///
    /// The guard borrows the signal, so it cannot outlive it.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard { signal: self, id }
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots in connection order.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);

/// A connection that is removed from its signal when dropped.
///
/// Created via [`Signal::connect_scoped`].
///
/// # Example
///
/// ```
/// use horizon_grid_core::Signal;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let signal = Signal::<i32>::new();
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42);
/// }
/// signal.emit(43);
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<'a, Args: 'static> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args: 'static> ConnectionGuard<'_, Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args: 'static> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        self.signal.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Row handles stand-in for the `(new, old)` pairs of a current-row signal.
    type CurrentChange = (Option<u32>, Option<u32>);

    #[test]
    fn test_row_count_reaches_every_listener() {
        init_tracing();
        let rows_changed = Signal::<usize>::new();
        let header = Arc::new(Mutex::new(Vec::new()));
        let scrollbar = Arc::new(Mutex::new(0));

        let sink = header.clone();
        rows_changed.connect(move |&count| sink.lock().push(count));
        let sink = scrollbar.clone();
        rows_changed.connect(move |&count| *sink.lock() = count);
        assert_eq!(rows_changed.connection_count(), 2);

        rows_changed.emit(3);
        rows_changed.emit(0);
        assert_eq!(*header.lock(), [3, 0]);
        assert_eq!(*scrollbar.lock(), 0);

        rows_changed.disconnect_all();
        rows_changed.emit(7);
        assert_eq!(rows_changed.connection_count(), 0);
        assert_eq!(*header.lock(), [3, 0]);
    }

    #[test]
    fn test_disconnected_view_stops_tracking_current_row() {
        init_tracing();
        let current_changed = Signal::<CurrentChange>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let id = current_changed.connect(move |&(new, old)| sink.lock().push((new, old)));
        current_changed.emit((Some(1), None));
        assert!(current_changed.disconnect(id));
        assert!(!current_changed.disconnect(id));
        current_changed.emit((Some(2), Some(1)));

        assert_eq!(*seen.lock(), [(Some(1), None)]);
    }

    #[test]
    fn test_blocked_signal_drops_row_counts() {
        let rows_changed = Signal::<usize>::new();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = counts.clone();
        rows_changed.connect(move |&count| sink.lock().push(count));

        rows_changed.emit(4);
        rows_changed.set_blocked(true);
        assert!(rows_changed.is_blocked());
        rows_changed.emit(5);
        rows_changed.emit(6);
        rows_changed.set_blocked(false);
        rows_changed.emit(6);

        assert_eq!(*counts.lock(), [4, 6]);
    }

    #[test]
    fn test_scoped_listener_sees_selection_diff_until_dropped() {
        let selection_changed = Signal::<(Vec<u32>, Vec<u32>)>::new();
        let totals = Arc::new(Mutex::new((0, 0)));

        {
            let sink = totals.clone();
            let guard = selection_changed.connect_scoped(move |(selected, deselected)| {
                let mut totals = sink.lock();
                totals.0 += selected.len();
                totals.1 += deselected.len();
            });
            assert_eq!(selection_changed.connection_count(), 1);
            assert_ne!(guard.id(), ConnectionId::default());
            selection_changed.emit((vec![1, 2], Vec::new()));
            selection_changed.emit((vec![3], vec![1]));
        }
        selection_changed.emit((vec![4], vec![2, 3]));

        assert_eq!(*totals.lock(), (3, 1));
        assert_eq!(selection_changed.connection_count(), 0);
    }

    #[test]
    fn test_slot_may_disconnect_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let hits = Arc::new(Mutex::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let signal_clone = signal.clone();
        let hits_clone = hits.clone();
        let own_id_clone = own_id.clone();
        let id = signal.connect(move |_| {
            *hits_clone.lock() += 1;
            if let Some(id) = own_id_clone.lock().take() {
                signal_clone.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(());
        signal.emit(());
        assert_eq!(*hits.lock(), 1);
    }
}
