//! Core systems for Strata.
//!
//! This crate provides the foundational primitive of the Strata column/ranking
//! model: a type-safe, synchronous signal/slot system used for change
//! notification between the model and external renderers.
//!
//! # Signal/Slot Example
//!
//! ```
//! use strata_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {value}");
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```

pub mod logging;
mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};

// The model hands `Arc<Signal>` bundles to renderers on other threads.
static_assertions::assert_impl_all!(Signal<(f64, f64)>: Send, Sync);
