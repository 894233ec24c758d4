//! Change-notification signals for columns and rankings.
//!
//! Every mutator fires one or more specific signals plus a subset of the
//! three dirty tiers:
//!
//! - `dirty`: something changed; coarsest tier, always fired alongside the
//!   other two.
//! - `dirty_header`: header chrome must redraw, cell bodies need not.
//! - `dirty_values`: cell bodies must redraw.
//!
//! A renderer that only repaints header chrome subscribes to `dirty_header`;
//! one that recomputes full layout subscribes to `dirty`. Column mutations
//! also reach the owning ranking's tier signals, so an external renderer can
//! listen once at the ranking root and decide incrementally what to redraw.

use std::sync::Arc;

use strata_core::Signal;

use super::desc::ColumnMetaData;
use super::store::{ColumnKey, SortCriterion};

/// Signals fired by a single column.
///
/// Payloads carry `(old, new)` where a previous value exists.
pub struct ColumnSignals {
    /// Width changed; payload `(old, new)`. Fired with tiers
    /// header + values + dirty.
    pub width_changed: Signal<(f64, f64)>,
    /// Filter state changed. Fired with tiers values + dirty.
    pub filter_changed: Signal<()>,
    /// Label changed; payload `(old, new)`.
    pub label_changed: Signal<(String, String)>,
    /// Any metadata field changed; payload `(old, new)`.
    pub metadata_changed: Signal<(ColumnMetaData, ColumnMetaData)>,
    /// Cell renderer tag changed; payload `(old, new)`.
    pub renderer_changed: Signal<(String, String)>,
    /// Group renderer tag changed; payload `(old, new)`.
    pub group_renderer_changed: Signal<(String, String)>,
    /// Summary renderer tag changed; payload `(old, new)`.
    pub summary_renderer_changed: Signal<(String, String)>,
    /// Sort method changed; payload `(old, new)`.
    pub sort_method_changed: Signal<(String, String)>,
    /// Grouping configuration of this column changed.
    pub grouping_changed: Signal<()>,
    /// Coarsest dirty tier.
    pub dirty: Signal<()>,
    /// Header chrome must redraw.
    pub dirty_header: Signal<()>,
    /// Cell bodies must redraw.
    pub dirty_values: Signal<()>,
}

impl Default for ColumnSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnSignals {
    /// Creates a fresh, unconnected set of column signals.
    pub fn new() -> Self {
        Self {
            width_changed: Signal::new(),
            filter_changed: Signal::new(),
            label_changed: Signal::new(),
            metadata_changed: Signal::new(),
            renderer_changed: Signal::new(),
            group_renderer_changed: Signal::new(),
            summary_renderer_changed: Signal::new(),
            sort_method_changed: Signal::new(),
            grouping_changed: Signal::new(),
            dirty: Signal::new(),
            dirty_header: Signal::new(),
            dirty_values: Signal::new(),
        }
    }

    /// Fires the requested dirty tiers. `dirty` itself always fires.
    pub fn emit_dirty(&self, header: bool, values: bool) {
        if header {
            self.dirty_header.emit(());
        }
        if values {
            self.dirty_values.emit(());
        }
        self.dirty.emit(());
    }
}

/// Signals fired by a ranking.
///
/// Structural payloads carry the affected column and its position; criteria
/// payloads carry `(old, new)` stack snapshots.
pub struct RankingSignals {
    /// A column was inserted at the given top-level position.
    pub add_column: Signal<(ColumnKey, usize)>,
    /// A column was removed from the given top-level position.
    pub remove_column: Signal<(ColumnKey, usize)>,
    /// A column moved; payload `(column, from, to)`.
    pub move_column: Signal<(ColumnKey, usize, usize)>,
    /// The sort-criteria stack changed; payload `(old, new)`.
    pub sort_criteria_changed: Signal<(Vec<SortCriterion>, Vec<SortCriterion>)>,
    /// The group-criteria stack changed; payload `(old, new)`.
    pub group_criteria_changed: Signal<(Vec<ColumnKey>, Vec<ColumnKey>)>,
    /// The group-sort-criteria stack changed; payload `(old, new)`.
    pub group_sort_criteria_changed: Signal<(Vec<SortCriterion>, Vec<SortCriterion>)>,
    /// A cached row order is no longer valid and must be recomputed.
    pub dirty_order: Signal<()>,
    /// Coarsest dirty tier.
    pub dirty: Signal<()>,
    /// Header chrome must redraw.
    pub dirty_header: Signal<()>,
    /// Cell bodies must redraw.
    pub dirty_values: Signal<()>,
}

impl Default for RankingSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingSignals {
    /// Creates a fresh, unconnected set of ranking signals.
    pub fn new() -> Self {
        Self {
            add_column: Signal::new(),
            remove_column: Signal::new(),
            move_column: Signal::new(),
            sort_criteria_changed: Signal::new(),
            group_criteria_changed: Signal::new(),
            group_sort_criteria_changed: Signal::new(),
            dirty_order: Signal::new(),
            dirty: Signal::new(),
            dirty_header: Signal::new(),
            dirty_values: Signal::new(),
        }
    }

    /// Fires the requested dirty tiers. `dirty` itself always fires.
    pub fn emit_dirty(&self, header: bool, values: bool) {
        if header {
            self.dirty_header.emit(());
        }
        if values {
            self.dirty_values.emit(());
        }
        self.dirty.emit(());
    }
}

/// Shorthand for the `Arc`-shared signal bundles handed out to subscribers.
pub type SharedColumnSignals = Arc<ColumnSignals>;
/// See [`SharedColumnSignals`].
pub type SharedRankingSignals = Arc<RankingSignals>;
