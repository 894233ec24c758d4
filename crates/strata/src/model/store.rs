//! Column/ranking arena.
//!
//! Every column and ranking lives in a slotmap arena owned by the model. A
//! column's link to its container is a [`ParentLink`] back-reference holding
//! an id, never an owning edge, so the tree has no reference cycles and
//! lifetimes are controlled entirely by the arena. This module contains only
//! pure tree state and traversals; signal firing happens one layer up in the
//! model facade.

use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};

use super::behavior::ColumnBehavior;
use super::desc::{ColumnDesc, ColumnMetaData};
use super::signals::{ColumnSignals, RankingSignals};

new_key_type! {
    /// Arena key of a column.
    pub struct ColumnKey;

    /// Arena key of a ranking.
    pub struct RankingKey;
}

/// Back-reference from a column to whatever owns it: a composite column or
/// a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    /// Owned by a composite column.
    Column(ColumnKey),
    /// A top-level column of a ranking.
    Ranking(RankingKey),
}

/// One entry of a sort or group-sort criteria stack.
///
/// Stack order encodes priority: index 0 is the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCriterion {
    /// The column supplying the comparator.
    pub column: ColumnKey,
    /// Ascending order? `false` negates the comparator result.
    pub asc: bool,
}

/// Sanitizes an id into a CSS-safe identifier fragment.
///
/// External renderers use `fqid` for per-cell DOM addressing, so every id
/// segment must survive as a CSS identifier. Anything outside
/// `[A-Za-z0-9_-]` becomes an underscore.
pub fn fix_css(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub(crate) struct ColumnNode {
    pub id: String,
    pub desc: ColumnDesc,
    pub width: f64,
    pub metadata: ColumnMetaData,
    pub renderer: String,
    pub group_renderer: String,
    pub summary_renderer: String,
    pub parent: Option<ParentLink>,
    /// Child columns, composites only. Insertion order is display order.
    pub children: Vec<ColumnKey>,
    pub behavior: ColumnBehavior,
    pub signals: Arc<ColumnSignals>,
}

impl ColumnNode {
    pub fn new(id: String, desc: ColumnDesc) -> Self {
        let metadata = desc.default_metadata(&id);
        let behavior = ColumnBehavior::for_desc(&desc);
        Self {
            id,
            width: desc.default_width(),
            metadata,
            renderer: desc.default_renderer(),
            group_renderer: desc.default_group_renderer(),
            summary_renderer: desc.default_summary_renderer(),
            parent: None,
            children: Vec::new(),
            behavior,
            desc,
            signals: Arc::new(ColumnSignals::new()),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.width <= 0.0
    }
}

pub(crate) struct RankingNode {
    pub id: String,
    /// Top-level columns. Insertion order is display order.
    pub columns: Vec<ColumnKey>,
    pub sort_criteria: Vec<SortCriterion>,
    pub group_criteria: Vec<ColumnKey>,
    pub group_sort_criteria: Vec<SortCriterion>,
    pub signals: Arc<RankingSignals>,
}

impl RankingNode {
    pub fn new(id: String) -> Self {
        Self {
            id,
            columns: Vec::new(),
            sort_criteria: Vec::new(),
            group_criteria: Vec::new(),
            group_sort_criteria: Vec::new(),
            signals: Arc::new(RankingSignals::new()),
        }
    }
}

/// The arena holding every column and ranking of one model instance.
#[derive(Default)]
pub(crate) struct ColumnStore {
    pub columns: SlotMap<ColumnKey, ColumnNode>,
    pub rankings: SlotMap<RankingKey, RankingNode>,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self {
            columns: SlotMap::with_key(),
            rankings: SlotMap::with_key(),
        }
    }

    /// The ordered sibling list a column lives in, per its parent link.
    pub fn sibling_keys(&self, parent: ParentLink) -> &[ColumnKey] {
        match parent {
            ParentLink::Column(key) => self
                .columns
                .get(key)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
            ParentLink::Ranking(key) => self
                .rankings
                .get(key)
                .map(|n| n.columns.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Position of a column among its siblings.
    pub fn index_in_parent(&self, key: ColumnKey) -> Option<usize> {
        let parent = self.columns.get(key)?.parent?;
        self.sibling_keys(parent).iter().position(|&c| c == key)
    }

    /// Fully qualified id: the parent chain's ids joined with `_`, rooted at
    /// the ranking id. Derived from live tree state on every call.
    pub fn fqid(&self, key: ColumnKey) -> Option<String> {
        let node = self.columns.get(key)?;
        let own = &node.id;
        match node.parent {
            None => Some(own.clone()),
            Some(ParentLink::Column(parent)) => Some(format!("{}_{own}", self.fqid(parent)?)),
            Some(ParentLink::Ranking(rk)) => {
                Some(format!("{}_{own}", self.rankings.get(rk)?.id))
            }
        }
    }

    /// Fully qualified path: `@`-joined sibling indices along the parent
    /// chain. Empty at the root (and for detached columns).
    pub fn fqpath(&self, key: ColumnKey) -> Option<String> {
        let node = self.columns.get(key)?;
        match node.parent {
            None => Some(String::new()),
            Some(parent) => {
                let index = self.index_in_parent(key)?;
                let prefix = match parent {
                    ParentLink::Column(p) => self.fqpath(p)?,
                    // Rankings are the root: empty fqpath.
                    ParentLink::Ranking(_) => String::new(),
                };
                Some(format!("{prefix}@{index}"))
            }
        }
    }

    /// Walks the parent chain to the owning ranking, if any.
    pub fn find_ranker(&self, key: ColumnKey) -> Option<RankingKey> {
        let mut current = key;
        loop {
            match self.columns.get(current)?.parent? {
                ParentLink::Ranking(rk) => return Some(rk),
                ParentLink::Column(parent) => current = parent,
            }
        }
    }

    /// Appends `key` and all of its descendants, depth first.
    pub fn collect_subtree(&self, key: ColumnKey, out: &mut Vec<ColumnKey>) {
        out.push(key);
        if let Some(node) = self.columns.get(key) {
            for &child in &node.children {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Every column reachable from a ranking, depth first.
    pub fn reachable_columns(&self, ranking: RankingKey) -> Vec<ColumnKey> {
        let mut out = Vec::new();
        if let Some(node) = self.rankings.get(ranking) {
            for &col in &node.columns {
                self.collect_subtree(col, &mut out);
            }
        }
        out
    }

    /// Removes a column from its parent's child list and clears the back
    /// link. Pure structural change; fires nothing.
    pub fn detach(&mut self, key: ColumnKey) -> Option<usize> {
        let parent = self.columns.get(key)?.parent?;
        let index = self.sibling_keys(parent).iter().position(|&c| c == key)?;
        match parent {
            ParentLink::Column(p) => {
                self.columns.get_mut(p)?.children.remove(index);
            }
            ParentLink::Ranking(rk) => {
                self.rankings.get_mut(rk)?.columns.remove(index);
            }
        }
        self.columns.get_mut(key)?.parent = None;
        Some(index)
    }

    /// Drops the given keys from all three criteria stacks of a ranking.
    ///
    /// Returns which stacks changed as `(sort, group, group_sort)`.
    pub fn purge_criteria(
        &mut self,
        ranking: RankingKey,
        removed: &[ColumnKey],
    ) -> (bool, bool, bool) {
        let Some(node) = self.rankings.get_mut(ranking) else {
            return (false, false, false);
        };
        let before_sort = node.sort_criteria.len();
        node.sort_criteria.retain(|c| !removed.contains(&c.column));
        let before_group = node.group_criteria.len();
        node.group_criteria.retain(|c| !removed.contains(c));
        let before_group_sort = node.group_sort_criteria.len();
        node.group_sort_criteria.retain(|c| !removed.contains(&c.column));
        (
            node.sort_criteria.len() != before_sort,
            node.group_criteria.len() != before_group,
            node.group_sort_criteria.len() != before_group_sort,
        )
    }
}
