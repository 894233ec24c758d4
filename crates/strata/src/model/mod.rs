//! Column/ranking data model.
//!
//! This module provides the data model of an interactive ranked table:
//! a tree of typed columns grouped under rankings, with sorting, grouping,
//! and filtering state that external renderers observe through signals.
//! The model owns no rows and renders nothing; callers hand rows in and get
//! derived orders back.
//!
//! # Core Types
//!
//! - `RankingModel`: The facade owning every column and ranking
//! - `ColumnDesc` / `ColumnKind`: Immutable column descriptions
//! - `ColumnKey` / `RankingKey`: Arena handles used in every operation
//! - `ColumnSignals` / `RankingSignals`: Change-notification bundles
//! - `Row` / `Group` / `RankingOrder`: Row data and derived ordering
//!
//! # Example
//!
//! ```
//! use strata::model::{ColumnDesc, RankingModel, Row};
//! use serde_json::json;
//!
//! let model = RankingModel::new();
//! let ranking = model.add_ranking();
//! let age = model.create(ColumnDesc::number("age"));
//! model.push(ranking, age).unwrap();
//!
//! model.ranking_signals(ranking).unwrap().dirty_order.connect(|()| {
//!     println!("order needs recomputing");
//! });
//! model.sort_by(ranking, age, false);
//!
//! let rows = vec![
//!     Row::new(json!({"age": 30}), 0),
//!     Row::new(json!({"age": 45}), 1),
//! ];
//! let result = model.compute_order(ranking, &rows);
//! assert_eq!(result.order, vec![1, 0]);
//! ```

mod behavior;
mod desc;
mod dump;
mod group;
#[allow(clippy::module_inception)]
mod model;
mod signals;
mod sorting;
mod store;
mod value;

pub use behavior::{
    CategoricalFilter, NumberFilter, NumberSortMethod, StringFilter, StringMatcher,
};
pub use desc::{ColumnDesc, ColumnKind, ColumnMetaData, DEFAULT_COLOR, DEFAULT_WIDTH};
pub use dump::{ColumnDump, CriterionDump, FilterDump, RankingDump, RestoreError};
pub use group::{
    DEFAULT_GROUP_COLOR, DEFAULT_GROUP_NAME, Group, GroupData, MISSING_GROUP_NAME, join_groups,
};
pub use model::{FLAT_ALL_COLUMNS, FlatColumn, RankingModel, SortHint, SortOrder};
pub use signals::{ColumnSignals, RankingSignals, SharedColumnSignals, SharedRankingSignals};
pub use sorting::RankingOrder;
pub use store::{ColumnKey, ParentLink, RankingKey, SortCriterion, fix_css};
pub use value::{Row, is_missing_value};
