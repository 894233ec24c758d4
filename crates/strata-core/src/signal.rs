//! Signal/slot system for Strata.
//!
//! This module provides a type-safe publish/subscribe mechanism used by the
//! column/ranking model to notify external renderers about state changes.
//! Signals are emitted by the model when state changes, and connected slots
//! (callbacks) are invoked in response.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Delivery
//!
//! Delivery is strictly synchronous: `emit` invokes every connected slot in
//! the calling thread before returning. There is no event loop and no queued
//! delivery. Slots may re-enter the signal (connect, disconnect, or even emit
//! again): the slot list is snapshotted before invocation, so re-entrant
//! calls never deadlock and never observe a half-updated connection table.
//! Slots added during an emission are first invoked on the next emission;
//! slots disconnected during an emission may still receive the in-flight one.
//!
//! # Example
//!
//! ```
//! use strata_core::Signal;
//!
//! // A signal carrying the old and new value of some property
//! let width_changed = Signal::<(f64, f64)>::new();
//!
//! let conn_id = width_changed.connect(|(old, new)| {
//!     println!("width {old} -> {new}");
//! });
//!
//! width_changed.emit((100.0, 150.0));
//!
//! width_changed.disconnect(conn_id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via
    /// [`Signal::disconnect`]. The ID remains valid until the connection is
    /// explicitly disconnected or the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// When a signal is emitted, all connected slots are invoked synchronously
/// with a reference to the provided arguments.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for
///   signals with no arguments, or a tuple like `(f64, f64)` for several.
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
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
    ///
    /// # Example
    ///
    /// ```
    /// use strata_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {s}"));
    /// signal.emit("Hello".to_string());
    /// signal.disconnect(id);
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
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
    /// While blocked, calls to `emit()` do nothing. Useful during batch
    /// updates to prevent cascading notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots synchronously.
    ///
    /// If the signal is blocked, this does nothing. The connection table is
    /// snapshotted before any slot runs: slots are free to connect,
    /// disconnect, or re-emit from inside the callback.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: crate::logging::targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        // Snapshot under the lock, invoke outside it. Holding the lock across
        // user callbacks would deadlock on re-entrant connect/disconnect.
        let slots: Vec<Slot<Args>> = {
            let connections = self.connections.lock();
            connections.values().cloned().collect()
        };

        tracing::trace!(
            target: crate::logging::targets::SIGNAL,
            connection_count = slots.len(),
            "emitting signal"
        );

        for slot in slots {
            slot(&args);
        }
    }

    /// Connect a slot and return a guard that disconnects when dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_core::Signal;
    ///
    /// let signal = Signal::<i32>::new();
    /// {
    ///     let _guard = signal.connect_scoped(|n| println!("{n}"));
    ///     signal.emit(1); // slot runs
    /// }
    /// signal.emit(2); // slot is gone
    /// assert_eq!(signal.connection_count(), 0);
    /// ```
    pub fn connect_scoped<'a, F>(&'a self, slot: F) -> ConnectionGuard<'a, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard { signal: self, id }
    }
}

/// A connection that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]. Useful for RAII-style connection
/// management, ensuring slots are cleaned up when the receiver goes away.
pub struct ConnectionGuard<'a, Args> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<'_, Args> {
    /// The underlying connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        self.signal.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_connect_emit_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let recv = received.clone();
        let id = signal.connect(move |n| recv.lock().push(*n));

        signal.emit(1);
        signal.emit(2);
        assert_eq!(*received.lock(), vec![1, 2]);

        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(3);
        assert_eq!(*received.lock(), vec![1, 2]);
    }

    #[test]
    fn test_multiple_slots() {
        let signal = Signal::<()>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = counter.clone();
            signal.connect(move |()| {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(signal.connection_count(), 3);
        signal.emit(());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_blocked_signal() {
        let signal = Signal::<i32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.set_blocked(true);
        assert!(signal.is_blocked());
        signal.emit(1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        signal.set_blocked(false);
        signal.emit(1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_disconnect_from_slot() {
        let signal = Arc::new(Signal::<()>::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let ids: Arc<Mutex<Vec<ConnectionId>>> = Arc::new(Mutex::new(Vec::new()));

        // A slot that disconnects itself while the emission is in flight.
        let sig = signal.clone();
        let ids2 = ids.clone();
        let f = fired.clone();
        let id = signal.connect(move |()| {
            f.fetch_add(1, Ordering::SeqCst);
            let id = ids2.lock()[0];
            sig.disconnect(id);
        });
        ids.lock().push(id);

        let f2 = fired.clone();
        signal.connect(move |()| {
            f2.fetch_add(10, Ordering::SeqCst);
        });

        signal.emit(());
        // Both slots ran despite the mid-flight disconnect.
        assert_eq!(fired.load(Ordering::SeqCst), 11);

        signal.emit(());
        // The self-disconnected slot is gone now.
        assert_eq!(fired.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_reentrant_connect_from_slot() {
        let signal = Arc::new(Signal::<()>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let sig = signal.clone();
        let c = counter.clone();
        signal.connect(move |()| {
            let c2 = c.clone();
            sig.connect(move |()| {
                c2.fetch_add(1, Ordering::SeqCst);
            });
        });

        signal.emit(());
        // The freshly connected slot is not part of the in-flight snapshot.
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        signal.emit(());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connection_guard() {
        let signal = Signal::<i32>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let c = counter.clone();
            let _guard = signal.connect_scoped(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
            signal.emit(1);
        }

        signal.emit(2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_disconnect_all() {
        let signal = Signal::<()>::new();
        signal.connect(|()| {});
        signal.connect(|()| {});
        assert_eq!(signal.connection_count(), 2);
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }
}
