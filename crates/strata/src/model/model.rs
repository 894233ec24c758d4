//! The model facade.
//!
//! [`RankingModel`] owns the column/ranking arena and exposes every mutation
//! the model supports. Mutators compute their state change under the write
//! lock, then release it and fire the relevant signals, so subscribers may
//! re-enter the model freely. Operations that need an owning ranking fail
//! soft (`false`/`None`) on detached columns: a column without a ranking is
//! an expected transient state during construction and cloning, not an
//! error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use strata_core::logging::targets;

use super::behavior::{
    CategoricalFilter, ColumnBehavior, NumberFilter, NumberSortMethod, StringFilter,
};
use super::desc::{ColumnDesc, ColumnKind, ColumnMetaData, DEFAULT_WIDTH};
use super::signals::{RankingSignals, SharedColumnSignals, SharedRankingSignals};
use super::store::{
    ColumnKey, ColumnNode, ColumnStore, ParentLink, RankingKey, RankingNode, SortCriterion,
    fix_css,
};

/// Magic flatten depth meaning "all levels".
pub const FLAT_ALL_COLUMNS: i32 = -1;

/// Width changes smaller than this are ignored to avoid float-jitter event
/// storms from interactive resizing.
const WIDTH_EPSILON: f64 = 0.5;

/// One entry of a flattened column layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatColumn {
    /// The column at this slot.
    pub column: ColumnKey,
    /// Left offset accumulated over preceding visible siblings.
    pub offset: f64,
    /// Width the column occupies.
    pub width: f64,
}

/// Direction a column is sorted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// Answer to "is this column part of a sort-criteria stack?".
///
/// Both fields are `None` when the column is not part of the stack (or has
/// no ranking at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortHint {
    /// Direction, when sorted by this column.
    pub order: Option<SortOrder>,
    /// Position in the criteria stack; 0 is the primary key.
    pub priority: Option<usize>,
}

/// The column/ranking data model: a column arena plus any number of
/// rankings over it.
///
/// All methods take `&self`; interior mutability keeps the teacher-pattern
/// of emitting change signals after the state change has been committed.
pub struct RankingModel {
    store: RwLock<ColumnStore>,
    next_column_id: AtomicU64,
    next_ranking_id: AtomicU64,
}

impl Default for RankingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            store: RwLock::new(ColumnStore::new()),
            next_column_id: AtomicU64::new(0),
            next_ranking_id: AtomicU64::new(0),
        }
    }

    fn generate_column_id(&self) -> String {
        let n = self.next_column_id.fetch_add(1, AtomicOrdering::Relaxed);
        format!("col{n}")
    }

    // -------------------------------------------------------------------------
    // Column lifecycle
    // -------------------------------------------------------------------------

    /// Creates a detached column from a description, with a generated id.
    pub fn create(&self, desc: ColumnDesc) -> ColumnKey {
        let id = self.generate_column_id();
        self.create_with_id(&id, desc)
    }

    /// Creates a detached column with an explicit id (CSS-sanitized).
    pub fn create_with_id(&self, id: &str, desc: ColumnDesc) -> ColumnKey {
        let node = ColumnNode::new(fix_css(id), desc);
        tracing::debug!(target: targets::MODEL, id = %node.id, "create column");
        self.store.write().columns.insert(node)
    }

    /// Re-ids a column via an injected generator (used when duplicating).
    pub fn assign_new_id(&self, key: ColumnKey, generator: impl FnOnce() -> String) -> bool {
        let mut store = self.store.write();
        match store.columns.get_mut(key) {
            Some(node) => {
                node.id = fix_css(&generator());
                true
            }
            None => false,
        }
    }

    /// Drops a detached column (and its subtree) from the arena.
    ///
    /// Attached columns must be removed from their parent first.
    pub fn destroy(&self, key: ColumnKey) -> bool {
        let mut store = self.store.write();
        match store.columns.get(key) {
            Some(node) if node.parent.is_none() => {
                let mut subtree = Vec::new();
                store.collect_subtree(key, &mut subtree);
                for k in subtree {
                    store.columns.remove(k);
                }
                true
            }
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Column reads
    // -------------------------------------------------------------------------

    /// The column id.
    pub fn id(&self, key: ColumnKey) -> Option<String> {
        self.store.read().columns.get(key).map(|n| n.id.clone())
    }

    /// Fully qualified id derived from the live parent chain.
    pub fn fqid(&self, key: ColumnKey) -> Option<String> {
        self.store.read().fqid(key)
    }

    /// Fully qualified path derived from live sibling indices.
    pub fn fqpath(&self, key: ColumnKey) -> Option<String> {
        self.store.read().fqpath(key)
    }

    /// The immutable description the column was created from.
    pub fn desc(&self, key: ColumnKey) -> Option<ColumnDesc> {
        self.store.read().columns.get(key).map(|n| n.desc.clone())
    }

    /// Whether the description forbids removal.
    pub fn frozen(&self, key: ColumnKey) -> bool {
        self.store
            .read()
            .columns
            .get(key)
            .is_some_and(|n| n.desc.frozen)
    }

    /// Current column width. A visible nested composite reports the summed
    /// width of its visible children.
    pub fn width(&self, key: ColumnKey) -> Option<f64> {
        let store = self.store.read();
        let node = store.columns.get(key)?;
        Some(column_span(&store, node, 0.0))
    }

    /// A column is hidden if it has no width.
    pub fn is_hidden(&self, key: ColumnKey) -> bool {
        self.store.read().columns.get(key).is_some_and(ColumnNode::is_hidden)
    }

    /// Current metadata (label, description, color).
    pub fn metadata(&self, key: ColumnKey) -> Option<ColumnMetaData> {
        self.store.read().columns.get(key).map(|n| n.metadata.clone())
    }

    /// Header label shorthand.
    pub fn label(&self, key: ColumnKey) -> Option<String> {
        self.store
            .read()
            .columns
            .get(key)
            .map(|n| n.metadata.label.clone())
    }

    /// Current cell renderer tag.
    pub fn renderer(&self, key: ColumnKey) -> Option<String> {
        self.store.read().columns.get(key).map(|n| n.renderer.clone())
    }

    /// Current group renderer tag.
    pub fn group_renderer(&self, key: ColumnKey) -> Option<String> {
        self.store
            .read()
            .columns
            .get(key)
            .map(|n| n.group_renderer.clone())
    }

    /// Current summary renderer tag.
    pub fn summary_renderer(&self, key: ColumnKey) -> Option<String> {
        self.store
            .read()
            .columns
            .get(key)
            .map(|n| n.summary_renderer.clone())
    }

    /// The column's container, if attached.
    pub fn parent(&self, key: ColumnKey) -> Option<ParentLink> {
        self.store.read().columns.get(key).and_then(|n| n.parent)
    }

    /// Child columns of a composite, in display order.
    pub fn children(&self, key: ColumnKey) -> Vec<ColumnKey> {
        self.store
            .read()
            .columns
            .get(key)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Walks the parent chain to the owning ranking, if any.
    pub fn find_ranker(&self, key: ColumnKey) -> Option<RankingKey> {
        self.store.read().find_ranker(key)
    }

    /// The column's signal bundle, for subscribing.
    pub fn column_signals(&self, key: ColumnKey) -> Option<SharedColumnSignals> {
        self.store.read().columns.get(key).map(|n| n.signals.clone())
    }

    fn ranker_signals(store: &ColumnStore, key: ColumnKey) -> Option<SharedRankingSignals> {
        let rk = store.find_ranker(key)?;
        store.rankings.get(rk).map(|n| n.signals.clone())
    }

    // -------------------------------------------------------------------------
    // Width
    // -------------------------------------------------------------------------

    /// Sets the column width.
    ///
    /// A change smaller than half a pixel is a no-op, and a frozen column
    /// never accepts a hiding width. Otherwise fires
    /// `width_changed(old, new)` plus header + values dirty tiers, on the
    /// column and on its owning ranking.
    pub fn set_width(&self, key: ColumnKey, value: f64) {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return;
            };
            if node.desc.frozen && value <= 0.0 {
                return;
            }
            if (node.width - value).abs() < WIDTH_EPSILON {
                None
            } else {
                let old = node.width;
                node.width = value;
                let signals = node.signals.clone();
                Some((old, signals, Self::ranker_signals(&store, key)))
            }
        };
        if let Some((old, signals, ranking)) = fire {
            signals.width_changed.emit((old, value));
            signals.emit_dirty(true, true);
            if let Some(ranking) = ranking {
                ranking.emit_dirty(true, true);
            }
        }
    }

    /// Hides the column (width 0). No effect on frozen columns.
    pub fn hide(&self, key: ColumnKey) {
        self.set_width(key, 0.0);
    }

    /// Adjusts the width only while it still equals the construction
    /// default; user-resized columns are never touched.
    pub fn set_default_width(&self, key: ColumnKey, width: f64) {
        let mut store = self.store.write();
        if let Some(node) = store.columns.get_mut(key) {
            if node.width == DEFAULT_WIDTH {
                node.width = width;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// Replaces the column metadata.
    ///
    /// A value-equal replacement is a no-op. A label or description change
    /// is header-tier; a color change additionally dirties cell values,
    /// since color feeds cell rendering.
    pub fn set_metadata(&self, key: ColumnKey, value: ColumnMetaData) {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return;
            };
            if node.metadata == value {
                None
            } else {
                let old = node.metadata.clone();
                let color_changed = old.color != value.color;
                node.metadata = value.clone();
                let signals = node.signals.clone();
                Some((old, color_changed, signals, Self::ranker_signals(&store, key)))
            }
        };
        if let Some((old, color_changed, signals, ranking)) = fire {
            signals
                .label_changed
                .emit((old.label.clone(), value.label.clone()));
            signals.metadata_changed.emit((old, value));
            signals.emit_dirty(true, color_changed);
            if let Some(ranking) = ranking {
                ranking.emit_dirty(true, color_changed);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Renderer selection
    // -------------------------------------------------------------------------

    fn set_renderer_impl(
        &self,
        key: ColumnKey,
        value: &str,
        which: RendererSlot,
        only_if_default: bool,
    ) {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return;
            };
            let kind_tag = node.desc.kind.tag();
            let current = match which {
                RendererSlot::Cell => &mut node.renderer,
                RendererSlot::Group => &mut node.group_renderer,
                RendererSlot::Summary => &mut node.summary_renderer,
            };
            // User overrides are sticky: the default setter only applies
            // while the slot still carries the kind's own tag.
            if only_if_default && *current != kind_tag {
                return;
            }
            if *current == value {
                return;
            }
            let old = std::mem::replace(current, value.to_string());
            let signals = node.signals.clone();
            (old, signals, Self::ranker_signals(&store, key))
        };
        let (old, signals, ranking) = fire;
        let new = value.to_string();
        // Summary renderers only show in the header; the other two affect
        // cell bodies.
        let values_tier = !matches!(which, RendererSlot::Summary);
        match which {
            RendererSlot::Cell => signals.renderer_changed.emit((old, new)),
            RendererSlot::Group => signals.group_renderer_changed.emit((old, new)),
            RendererSlot::Summary => signals.summary_renderer_changed.emit((old, new)),
        }
        signals.emit_dirty(!values_tier, values_tier);
        if let Some(ranking) = ranking {
            ranking.emit_dirty(!values_tier, values_tier);
        }
    }

    /// Selects the cell renderer.
    pub fn set_renderer(&self, key: ColumnKey, renderer: &str) {
        self.set_renderer_impl(key, renderer, RendererSlot::Cell, false);
    }

    /// Selects the group renderer.
    pub fn set_group_renderer(&self, key: ColumnKey, renderer: &str) {
        self.set_renderer_impl(key, renderer, RendererSlot::Group, false);
    }

    /// Selects the summary renderer.
    pub fn set_summary_renderer(&self, key: ColumnKey, renderer: &str) {
        self.set_renderer_impl(key, renderer, RendererSlot::Summary, false);
    }

    /// Selects the cell renderer only while no user override is active.
    pub fn set_default_renderer(&self, key: ColumnKey, renderer: &str) {
        self.set_renderer_impl(key, renderer, RendererSlot::Cell, true);
    }

    /// Selects the group renderer only while no user override is active.
    pub fn set_default_group_renderer(&self, key: ColumnKey, renderer: &str) {
        self.set_renderer_impl(key, renderer, RendererSlot::Group, true);
    }

    /// Selects the summary renderer only while no user override is active.
    pub fn set_default_summary_renderer(&self, key: ColumnKey, renderer: &str) {
        self.set_renderer_impl(key, renderer, RendererSlot::Summary, true);
    }

    // -------------------------------------------------------------------------
    // Filters and per-kind configuration
    // -------------------------------------------------------------------------

    fn fire_filter_changed(&self, key: ColumnKey) {
        let fire = {
            let store = self.store.read();
            store
                .columns
                .get(key)
                .map(|n| (n.signals.clone(), Self::ranker_signals(&store, key)))
        };
        if let Some((signals, ranking)) = fire {
            signals.filter_changed.emit(());
            signals.emit_dirty(false, true);
            if let Some(ranking) = ranking {
                ranking.dirty_order.emit(());
                ranking.emit_dirty(false, true);
            }
        }
    }

    /// Sets or clears the filter of a string column.
    ///
    /// Returns `false` when the column is not a string column.
    pub fn set_string_filter(&self, key: ColumnKey, filter: Option<StringFilter>) -> bool {
        {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return false;
            };
            match &mut node.behavior {
                ColumnBehavior::String(state) => state.filter = filter,
                _ => return false,
            }
        }
        self.fire_filter_changed(key);
        true
    }

    /// Sets or clears the filter of a number column.
    pub fn set_number_filter(&self, key: ColumnKey, filter: Option<NumberFilter>) -> bool {
        {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return false;
            };
            match &mut node.behavior {
                ColumnBehavior::Number(state) => state.filter = filter,
                _ => return false,
            }
        }
        self.fire_filter_changed(key);
        true
    }

    /// Sets or clears the filter of a categorical column.
    pub fn set_categorical_filter(&self, key: ColumnKey, filter: Option<CategoricalFilter>) -> bool {
        {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return false;
            };
            match &mut node.behavior {
                ColumnBehavior::Categorical(state) => state.filter = filter,
                _ => return false,
            }
        }
        self.fire_filter_changed(key);
        true
    }

    /// Current sort method of a number column.
    pub fn number_sort_method(&self, key: ColumnKey) -> Option<NumberSortMethod> {
        match &self.store.read().columns.get(key)?.behavior {
            ColumnBehavior::Number(state) => Some(state.sort_method),
            _ => None,
        }
    }

    /// Switches the sort method of a number column.
    pub fn set_number_sort_method(&self, key: ColumnKey, method: NumberSortMethod) -> bool {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return false;
            };
            let ColumnBehavior::Number(state) = &mut node.behavior else {
                return false;
            };
            if state.sort_method == method {
                return true;
            }
            let old = state.sort_method;
            state.sort_method = method;
            (old, node.signals.clone(), Self::ranker_signals(&store, key))
        };
        let (old, signals, ranking) = fire;
        signals
            .sort_method_changed
            .emit((old.tag().to_string(), method.tag().to_string()));
        signals.emit_dirty(false, true);
        if let Some(ranking) = ranking {
            ranking.dirty_order.emit(());
            ranking.emit_dirty(false, true);
        }
        true
    }

    /// Current grouping thresholds of a number column.
    pub fn group_thresholds(&self, key: ColumnKey) -> Option<Vec<f64>> {
        match &self.store.read().columns.get(key)?.behavior {
            ColumnBehavior::Number(state) => Some(state.group_thresholds.clone()),
            _ => None,
        }
    }

    /// Replaces the grouping thresholds of a number column.
    pub fn set_group_thresholds(&self, key: ColumnKey, thresholds: Vec<f64>) -> bool {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.columns.get_mut(key) else {
                return false;
            };
            let ColumnBehavior::Number(state) = &mut node.behavior else {
                return false;
            };
            if state.group_thresholds == thresholds {
                return true;
            }
            state.group_thresholds = thresholds;
            (node.signals.clone(), Self::ranker_signals(&store, key))
        };
        let (signals, ranking) = fire;
        signals.grouping_changed.emit(());
        signals.emit_dirty(false, true);
        if let Some(ranking) = ranking {
            ranking.dirty_order.emit(());
            ranking.emit_dirty(false, true);
        }
        true
    }

    // -------------------------------------------------------------------------
    // Flatten
    // -------------------------------------------------------------------------

    /// Flattens a column subtree into layout entries.
    ///
    /// Appends `{column, offset, width}` for the column itself; composites
    /// with levels remaining additionally recurse into their visible
    /// children (the composite entry spans the children), with `padding`
    /// inserted between siblings. Returns the entries and the total
    /// consumed width. Pass [`FLAT_ALL_COLUMNS`] to descend without limit.
    ///
    /// Layout is derived purely from current widths and visibility; nothing
    /// is cached.
    pub fn flatten(
        &self,
        key: ColumnKey,
        offset: f64,
        levels_to_go: i32,
        padding: f64,
    ) -> (Vec<FlatColumn>, f64) {
        let store = self.store.read();
        let mut out = Vec::new();
        let used = flatten_rec(&store, key, &mut out, offset, levels_to_go, padding);
        (out, used)
    }

    /// Flattens the visible top-level columns of a ranking, one level deep.
    pub fn flatten_ranking(&self, ranking: RankingKey, padding: f64) -> Vec<FlatColumn> {
        let store = self.store.read();
        let mut out = Vec::new();
        let mut offset = 0.0;
        let Some(node) = store.rankings.get(ranking) else {
            return out;
        };
        for &col in &node.columns {
            let Some(column) = store.columns.get(col) else {
                continue;
            };
            if column.is_hidden() {
                continue;
            }
            if offset > 0.0 {
                offset += padding;
            }
            offset += flatten_rec(&store, col, &mut out, offset, 0, padding);
        }
        out
    }

    // -------------------------------------------------------------------------
    // Ranking lifecycle and reads
    // -------------------------------------------------------------------------

    /// Adds an empty ranking with a generated id.
    pub fn add_ranking(&self) -> RankingKey {
        let n = self.next_ranking_id.fetch_add(1, AtomicOrdering::Relaxed);
        self.add_ranking_with_id(&format!("rank{n}"))
    }

    /// Adds an empty ranking with an explicit id (CSS-sanitized).
    pub fn add_ranking_with_id(&self, id: &str) -> RankingKey {
        tracing::debug!(target: targets::MODEL, id, "add ranking");
        self.store
            .write()
            .rankings
            .insert(RankingNode::new(fix_css(id)))
    }

    /// The ranking id. Also its `fqid`; a ranking's `fqpath` is empty.
    pub fn ranking_id(&self, ranking: RankingKey) -> Option<String> {
        self.store.read().rankings.get(ranking).map(|n| n.id.clone())
    }

    /// The ranking's signal bundle, for subscribing once at the root.
    pub fn ranking_signals(&self, ranking: RankingKey) -> Option<SharedRankingSignals> {
        self.store
            .read()
            .rankings
            .get(ranking)
            .map(|n| n.signals.clone())
    }

    /// Top-level columns in display order.
    pub fn ranking_columns(&self, ranking: RankingKey) -> Vec<ColumnKey> {
        self.store
            .read()
            .rankings
            .get(ranking)
            .map(|n| n.columns.clone())
            .unwrap_or_default()
    }

    /// The sort-criteria stack, primary key first.
    pub fn sort_criteria(&self, ranking: RankingKey) -> Vec<SortCriterion> {
        self.store
            .read()
            .rankings
            .get(ranking)
            .map(|n| n.sort_criteria.clone())
            .unwrap_or_default()
    }

    /// The group-criteria stack, outermost partition first.
    pub fn group_criteria(&self, ranking: RankingKey) -> Vec<ColumnKey> {
        self.store
            .read()
            .rankings
            .get(ranking)
            .map(|n| n.group_criteria.clone())
            .unwrap_or_default()
    }

    /// The group-sort-criteria stack, primary key first.
    pub fn group_sort_criteria(&self, ranking: RankingKey) -> Vec<SortCriterion> {
        self.store
            .read()
            .rankings
            .get(ranking)
            .map(|n| n.group_sort_criteria.clone())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Ranking structural mutation
    // -------------------------------------------------------------------------

    /// Appends a column at the end of the ranking.
    pub fn push(&self, ranking: RankingKey, col: ColumnKey) -> Option<ColumnKey> {
        let len = self.store.read().rankings.get(ranking)?.columns.len();
        self.insert(ranking, col, len)
    }

    /// Inserts a column at a top-level position.
    ///
    /// Rejects (`None`) a column that is still owned elsewhere; detach it
    /// from its previous parent first.
    pub fn insert(&self, ranking: RankingKey, col: ColumnKey, index: usize) -> Option<ColumnKey> {
        let signals = {
            let mut store = self.store.write();
            store.columns.get(col)?;
            if store.columns[col].parent.is_some() {
                return None;
            }
            let node = store.rankings.get_mut(ranking)?;
            if index > node.columns.len() {
                return None;
            }
            node.columns.insert(index, col);
            let signals = node.signals.clone();
            store.columns[col].parent = Some(ParentLink::Ranking(ranking));
            signals
        };
        tracing::debug!(target: targets::MODEL, index, "insert column into ranking");
        signals.add_column.emit((col, index));
        signals.emit_dirty(true, true);
        Some(col)
    }

    /// Inserts a column right after a reference top-level column.
    pub fn insert_after(
        &self,
        ranking: RankingKey,
        col: ColumnKey,
        reference: ColumnKey,
    ) -> Option<ColumnKey> {
        let index = {
            let store = self.store.read();
            store
                .rankings
                .get(ranking)?
                .columns
                .iter()
                .position(|&c| c == reference)?
                + 1
        };
        self.insert(ranking, col, index)
    }

    /// Moves a top-level column to a new position.
    pub fn move_column(
        &self,
        ranking: RankingKey,
        col: ColumnKey,
        index: usize,
    ) -> Option<ColumnKey> {
        let fire = {
            let mut store = self.store.write();
            let node = store.rankings.get_mut(ranking)?;
            let from = node.columns.iter().position(|&c| c == col)?;
            node.columns.remove(from);
            let to = index.min(node.columns.len());
            node.columns.insert(to, col);
            if from == to {
                return Some(col);
            }
            (from, to, node.signals.clone())
        };
        let (from, to, signals) = fire;
        signals.move_column.emit((col, from, to));
        signals.emit_dirty(true, true);
        Some(col)
    }

    /// Moves a top-level column right after a reference column.
    pub fn move_after(
        &self,
        ranking: RankingKey,
        col: ColumnKey,
        reference: ColumnKey,
    ) -> Option<ColumnKey> {
        let index = {
            let store = self.store.read();
            let node = store.rankings.get(ranking)?;
            if !node.columns.contains(&col) {
                return None;
            }
            let ref_pos = node.columns.iter().position(|&c| c == reference)?;
            let own_pos = node.columns.iter().position(|&c| c == col)?;
            // After removal everything right of us shifts left by one.
            if own_pos < ref_pos { ref_pos } else { ref_pos + 1 }
        };
        self.move_column(ranking, col, index)
    }

    /// Removes a top-level column from the ranking.
    ///
    /// Frozen columns are rejected. The column and all of its descendants
    /// are purged from every criteria stack; the column itself stays alive,
    /// detached, and can be re-inserted.
    pub fn remove(&self, ranking: RankingKey, col: ColumnKey) -> bool {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.rankings.get(ranking) else {
                return false;
            };
            let Some(index) = node.columns.iter().position(|&c| c == col) else {
                return false;
            };
            if store.columns.get(col).is_none_or(|n| n.desc.frozen) {
                return false;
            }
            let old_sort = node.sort_criteria.clone();
            let old_group = node.group_criteria.clone();
            let old_group_sort = node.group_sort_criteria.clone();

            let mut subtree = Vec::new();
            store.collect_subtree(col, &mut subtree);
            let (sort_changed, group_changed, group_sort_changed) =
                store.purge_criteria(ranking, &subtree);

            if store.detach(col).is_none() {
                return false;
            }
            let Some(node) = store.rankings.get(ranking) else {
                return false;
            };
            let signals = node.signals.clone();
            let new_sort = node.sort_criteria.clone();
            let new_group = node.group_criteria.clone();
            let new_group_sort = node.group_sort_criteria.clone();

            (
                index,
                signals,
                sort_changed.then_some((old_sort, new_sort)),
                group_changed.then_some((old_group, new_group)),
                group_sort_changed.then_some((old_group_sort, new_group_sort)),
            )
        };
        let (index, signals, sort, group, group_sort) = fire;
        tracing::debug!(target: targets::MODEL, index, "remove column from ranking");
        let criteria_changed = sort.is_some() || group.is_some() || group_sort.is_some();
        if let Some((old, new)) = sort {
            signals.sort_criteria_changed.emit((old, new));
        }
        if let Some((old, new)) = group {
            signals.group_criteria_changed.emit((old, new));
        }
        if let Some((old, new)) = group_sort {
            signals.group_sort_criteria_changed.emit((old, new));
        }
        if criteria_changed {
            signals.dirty_order.emit(());
        }
        signals.remove_column.emit((col, index));
        signals.emit_dirty(true, true);
        true
    }

    // -------------------------------------------------------------------------
    // Composite structural mutation
    // -------------------------------------------------------------------------

    /// Appends a child to a composite column.
    pub fn push_child(&self, parent: ColumnKey, col: ColumnKey) -> Option<ColumnKey> {
        let len = self.store.read().columns.get(parent)?.children.len();
        self.insert_child(parent, col, len)
    }

    /// Inserts a child into a composite column at a position.
    ///
    /// Rejects non-composite parents and columns still owned elsewhere.
    pub fn insert_child(
        &self,
        parent: ColumnKey,
        col: ColumnKey,
        index: usize,
    ) -> Option<ColumnKey> {
        let fire = {
            let mut store = self.store.write();
            if !store.columns.get(parent)?.desc.kind.is_composite() {
                return None;
            }
            store.columns.get(col)?;
            if store.columns[col].parent.is_some() || parent == col {
                return None;
            }
            let parent_node = store.columns.get_mut(parent)?;
            if index > parent_node.children.len() {
                return None;
            }
            parent_node.children.insert(index, col);
            let signals = parent_node.signals.clone();
            store.columns[col].parent = Some(ParentLink::Column(parent));
            (signals, Self::ranker_signals(&store, parent))
        };
        let (signals, ranking) = fire;
        signals.emit_dirty(true, true);
        if let Some(ranking) = ranking {
            ranking.emit_dirty(true, true);
        }
        Some(col)
    }

    /// Inserts a child right after a reference child.
    pub fn insert_child_after(
        &self,
        parent: ColumnKey,
        col: ColumnKey,
        reference: ColumnKey,
    ) -> Option<ColumnKey> {
        let index = {
            let store = self.store.read();
            store
                .columns
                .get(parent)?
                .children
                .iter()
                .position(|&c| c == reference)?
                + 1
        };
        self.insert_child(parent, col, index)
    }

    /// Removes a child from a composite column.
    ///
    /// Frozen children are rejected. If the composite is attached to a
    /// ranking, the child's subtree is purged from the criteria stacks.
    pub fn remove_child(&self, parent: ColumnKey, col: ColumnKey) -> bool {
        let fire = {
            let mut store = self.store.write();
            let Some(parent_node) = store.columns.get(parent) else {
                return false;
            };
            if !parent_node.children.contains(&col) {
                return false;
            }
            if store.columns.get(col).is_none_or(|n| n.desc.frozen) {
                return false;
            }

            let purged = store.find_ranker(parent).map(|rk| {
                let node = &store.rankings[rk];
                let old = (
                    node.sort_criteria.clone(),
                    node.group_criteria.clone(),
                    node.group_sort_criteria.clone(),
                );
                let mut subtree = Vec::new();
                store.collect_subtree(col, &mut subtree);
                let changed = store.purge_criteria(rk, &subtree);
                let node = &store.rankings[rk];
                let new = (
                    node.sort_criteria.clone(),
                    node.group_criteria.clone(),
                    node.group_sort_criteria.clone(),
                );
                (old, new, changed)
            });

            if store.detach(col).is_none() {
                return false;
            }
            let signals = store.columns[parent].signals.clone();
            (signals, purged, Self::ranker_signals(&store, parent))
        };
        let (signals, purged, ranking) = fire;
        if let (Some((old, new, changed)), Some(ranking)) = (purged, ranking.as_ref()) {
            let (old_sort, old_group, old_group_sort) = old;
            let (new_sort, new_group, new_group_sort) = new;
            let (sort_changed, group_changed, group_sort_changed) = changed;
            if sort_changed {
                ranking.sort_criteria_changed.emit((old_sort, new_sort));
            }
            if group_changed {
                ranking.group_criteria_changed.emit((old_group, new_group));
            }
            if group_sort_changed {
                ranking
                    .group_sort_criteria_changed
                    .emit((old_group_sort, new_group_sort));
            }
            if sort_changed || group_changed || group_sort_changed {
                ranking.dirty_order.emit(());
            }
        }
        signals.emit_dirty(true, true);
        if let Some(ranking) = ranking {
            ranking.emit_dirty(true, true);
        }
        true
    }

    /// Redistributes the child widths of a stack column by weight.
    ///
    /// The stack's own width is kept; children receive their weight share of
    /// it. Fires `width_changed` on every child whose width actually moved.
    pub fn set_weights(&self, stack: ColumnKey, weights: &[f64]) -> bool {
        let fire = {
            let mut store = self.store.write();
            let Some(node) = store.columns.get(stack) else {
                return false;
            };
            if node.desc.kind != ColumnKind::Stack || node.children.len() != weights.len() {
                return false;
            }
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return false;
            }
            let stack_width = node.width;
            let children = node.children.clone();
            let stack_signals = node.signals.clone();
            let mut changed = Vec::new();
            for (&child, &weight) in children.iter().zip(weights) {
                let new_width = stack_width * weight / total;
                if let Some(child_node) = store.columns.get_mut(child) {
                    if (child_node.width - new_width).abs() >= WIDTH_EPSILON {
                        let old = child_node.width;
                        child_node.width = new_width;
                        changed.push((child_node.signals.clone(), old, new_width));
                    }
                }
            }
            (changed, stack_signals, Self::ranker_signals(&store, stack))
        };
        let (changed, stack_signals, ranking) = fire;
        for (signals, old, new) in changed {
            signals.width_changed.emit((old, new));
            signals.emit_dirty(true, true);
        }
        stack_signals.emit_dirty(true, true);
        if let Some(ranking) = ranking {
            ranking.emit_dirty(true, true);
        }
        true
    }

    // -------------------------------------------------------------------------
    // Criteria stacks
    // -------------------------------------------------------------------------

    fn criteria_fire(
        signals: &Arc<RankingSignals>,
        stack: CriteriaStack,
        old: Vec<SortCriterion>,
        new: Vec<SortCriterion>,
    ) {
        match stack {
            CriteriaStack::Sort => signals.sort_criteria_changed.emit((old, new)),
            CriteriaStack::GroupSort => signals.group_sort_criteria_changed.emit((old, new)),
        }
        signals.dirty_order.emit(());
        signals.emit_dirty(true, true);
    }

    fn sort_by_impl(
        &self,
        ranking: RankingKey,
        col: ColumnKey,
        asc: bool,
        stack: CriteriaStack,
    ) -> bool {
        let fire = {
            let mut store = self.store.write();
            if store.find_ranker(col) != Some(ranking) {
                return false;
            }
            let Some(node) = store.rankings.get_mut(ranking) else {
                return false;
            };
            let criteria = match stack {
                CriteriaStack::Sort => &mut node.sort_criteria,
                CriteriaStack::GroupSort => &mut node.group_sort_criteria,
            };
            let criterion = SortCriterion { column: col, asc };
            // Already the sole primary key with this direction: nothing to do.
            if criteria.len() == 1 && criteria[0] == criterion {
                return true;
            }
            // Single-key replace policy; see DESIGN.md.
            let old = std::mem::replace(criteria, vec![criterion]);
            let new = criteria.clone();
            (node.signals.clone(), old, new)
        };
        let (signals, old, new) = fire;
        Self::criteria_fire(&signals, stack, old, new);
        true
    }

    /// Makes `col` the primary (and sole) sort criterion.
    ///
    /// Returns `false` when the column is not reachable from this ranking.
    /// Fires `sort_criteria_changed` + `dirty_order` + the dirty tiers; a
    /// call matching the current criterion is a successful no-op.
    pub fn sort_by(&self, ranking: RankingKey, col: ColumnKey, asc: bool) -> bool {
        self.sort_by_impl(ranking, col, asc, CriteriaStack::Sort)
    }

    /// Flips the direction if `col` is the primary sort key, else sorts by
    /// it ascending.
    pub fn toggle_sorting(&self, ranking: RankingKey, col: ColumnKey) -> bool {
        let asc = match self.sort_criteria(ranking).first() {
            Some(c) if c.column == col => !c.asc,
            _ => true,
        };
        self.sort_by(ranking, col, asc)
    }

    /// Makes `col` the primary (and sole) group-sort criterion, ordering
    /// groups rather than rows.
    pub fn group_sort_by(&self, ranking: RankingKey, col: ColumnKey, asc: bool) -> bool {
        self.sort_by_impl(ranking, col, asc, CriteriaStack::GroupSort)
    }

    /// Flips the direction if `col` is the primary group-sort key, else
    /// group-sorts by it ascending.
    pub fn toggle_group_sorting(&self, ranking: RankingKey, col: ColumnKey) -> bool {
        let asc = match self.group_sort_criteria(ranking).first() {
            Some(c) if c.column == col => !c.asc,
            _ => true,
        };
        self.group_sort_by(ranking, col, asc)
    }

    /// Toggles `col`'s membership in the group-criteria stack, preserving
    /// the relative order of the remaining members.
    pub fn toggle_grouping(&self, ranking: RankingKey, col: ColumnKey) -> bool {
        let fire = {
            let mut store = self.store.write();
            if store.find_ranker(col) != Some(ranking) {
                return false;
            }
            let Some(node) = store.rankings.get_mut(ranking) else {
                return false;
            };
            let old = node.group_criteria.clone();
            match node.group_criteria.iter().position(|&c| c == col) {
                Some(index) => {
                    node.group_criteria.remove(index);
                }
                None => node.group_criteria.push(col),
            }
            (node.signals.clone(), old, node.group_criteria.clone())
        };
        let (signals, old, new) = fire;
        signals.group_criteria_changed.emit((old, new));
        signals.dirty_order.emit(());
        signals.emit_dirty(true, true);
        true
    }

    // -------------------------------------------------------------------------
    // Ranking-delegated column operations
    // -------------------------------------------------------------------------

    /// Sorts the owning ranking by this column. `false` when detached.
    pub fn sort_by_me(&self, key: ColumnKey, asc: bool) -> bool {
        match self.find_ranker(key) {
            Some(rk) => self.sort_by(rk, key, asc),
            None => false,
        }
    }

    /// Toggles this column's sorting in the owning ranking.
    pub fn toggle_my_sorting(&self, key: ColumnKey) -> bool {
        match self.find_ranker(key) {
            Some(rk) => self.toggle_sorting(rk, key),
            None => false,
        }
    }

    /// Toggles this column's membership in the group criteria.
    pub fn group_by_me(&self, key: ColumnKey) -> bool {
        match self.find_ranker(key) {
            Some(rk) => self.toggle_grouping(rk, key),
            None => false,
        }
    }

    /// Group-sorts the owning ranking by this column.
    pub fn group_sort_by_me(&self, key: ColumnKey, asc: bool) -> bool {
        match self.find_ranker(key) {
            Some(rk) => self.group_sort_by(rk, key, asc),
            None => false,
        }
    }

    /// Toggles this column's group sorting in the owning ranking.
    pub fn toggle_my_group_sorting(&self, key: ColumnKey) -> bool {
        match self.find_ranker(key) {
            Some(rk) => self.toggle_group_sorting(rk, key),
            None => false,
        }
    }

    fn sort_hint(&self, key: ColumnKey, stack: CriteriaStack) -> SortHint {
        let Some(rk) = self.find_ranker(key) else {
            return SortHint::default();
        };
        let criteria = match stack {
            CriteriaStack::Sort => self.sort_criteria(rk),
            CriteriaStack::GroupSort => self.group_sort_criteria(rk),
        };
        match criteria.iter().position(|c| c.column == key) {
            None => SortHint::default(),
            Some(index) => SortHint {
                order: Some(if criteria[index].asc {
                    SortOrder::Asc
                } else {
                    SortOrder::Desc
                }),
                priority: Some(index),
            },
        }
    }

    /// This column's position in the sort-criteria stack, if any.
    pub fn is_sorted_by_me(&self, key: ColumnKey) -> SortHint {
        self.sort_hint(key, CriteriaStack::Sort)
    }

    /// This column's position in the group-sort-criteria stack, if any.
    pub fn is_group_sorted_by_me(&self, key: ColumnKey) -> SortHint {
        self.sort_hint(key, CriteriaStack::GroupSort)
    }

    /// This column's position in the group-criteria stack, if any.
    pub fn is_grouped_by(&self, key: ColumnKey) -> Option<usize> {
        let rk = self.find_ranker(key)?;
        self.group_criteria(rk).iter().position(|&c| c == key)
    }

    /// Removes this column from its parent. `false` when detached or frozen.
    pub fn remove_me(&self, key: ColumnKey) -> bool {
        match self.parent(key) {
            Some(ParentLink::Ranking(rk)) => self.remove(rk, key),
            Some(ParentLink::Column(parent)) => self.remove_child(parent, key),
            None => false,
        }
    }

    /// Inserts `col` right after this column in the shared parent.
    pub fn insert_after_me(&self, key: ColumnKey, col: ColumnKey) -> bool {
        match self.parent(key) {
            Some(ParentLink::Ranking(rk)) => self.insert_after(rk, col, key).is_some(),
            Some(ParentLink::Column(parent)) => {
                self.insert_child_after(parent, col, key).is_some()
            }
            None => false,
        }
    }

    pub(crate) fn store(&self) -> &RwLock<ColumnStore> {
        &self.store
    }
}

#[derive(Clone, Copy)]
enum RendererSlot {
    Cell,
    Group,
    Summary,
}

#[derive(Clone, Copy)]
enum CriteriaStack {
    Sort,
    GroupSort,
}

/// The width a column occupies in a layout. Leaves and stacks own their
/// width; a visible nested composite derives it from its visible children,
/// `padding` inserted between them.
fn column_span(store: &ColumnStore, node: &ColumnNode, padding: f64) -> f64 {
    if node.desc.kind != ColumnKind::Nested || node.children.is_empty() || node.is_hidden() {
        return node.width;
    }
    let mut span = 0.0;
    let mut first = true;
    for &child in &node.children {
        let Some(child_node) = store.columns.get(child) else {
            continue;
        };
        if child_node.is_hidden() {
            continue;
        }
        if !first {
            span += padding;
        }
        first = false;
        span += column_span(store, child_node, padding);
    }
    span
}

fn flatten_rec(
    store: &ColumnStore,
    key: ColumnKey,
    out: &mut Vec<FlatColumn>,
    offset: f64,
    levels_to_go: i32,
    padding: f64,
) -> f64 {
    let Some(node) = store.columns.get(key) else {
        return 0.0;
    };
    let descend = node.desc.kind.is_composite()
        && !node.children.is_empty()
        && (levels_to_go > 0 || levels_to_go == FLAT_ALL_COLUMNS);
    if !descend {
        // A collapsed nested composite still spans its visible children.
        let width = column_span(store, node, padding);
        out.push(FlatColumn {
            column: key,
            offset,
            width,
        });
        return width;
    }

    // The composite entry spans its children; patch the width in once the
    // children are laid out.
    let self_slot = out.len();
    out.push(FlatColumn {
        column: key,
        offset,
        width: 0.0,
    });
    let next_levels = if levels_to_go == FLAT_ALL_COLUMNS {
        FLAT_ALL_COLUMNS
    } else {
        levels_to_go - 1
    };
    let mut used = 0.0;
    let mut first = true;
    for &child in &node.children {
        let hidden = store.columns.get(child).is_none_or(ColumnNode::is_hidden);
        if hidden {
            continue;
        }
        if !first {
            used += padding;
        }
        first = false;
        used += flatten_rec(store, child, out, offset + used, next_levels, padding);
    }
    out[self_slot].width = used;
    used
}
