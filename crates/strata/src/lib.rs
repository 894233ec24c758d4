//! Strata - the data model of an interactive ranked table.
//!
//! Strata keeps the state of a column-based ranking visualization: a tree of
//! typed columns under one or more rankings, each with sort, group, and
//! group-sort criteria stacks and per-column filters. The model owns no rows
//! and draws nothing; it turns externally-owned rows into derived orders and
//! notifies subscribers through tiered dirty signals.
//!
//! # Example
//!
//! ```
//! use strata::model::{ColumnDesc, RankingModel, Row, StringFilter};
//! use serde_json::json;
//!
//! let model = RankingModel::new();
//! let ranking = model.add_ranking();
//! let name = model.create(ColumnDesc::string("name"));
//! let age = model.create(ColumnDesc::number("age"));
//! model.push(ranking, name).unwrap();
//! model.push(ranking, age).unwrap();
//!
//! model.set_string_filter(name, Some(StringFilter::contains("a")));
//! model.sort_by(ranking, age, true);
//!
//! let rows = vec![
//!     Row::new(json!({"name": "Carol", "age": 35}), 0),
//!     Row::new(json!({"name": "Bob", "age": 20}), 1),
//!     Row::new(json!({"name": "Alice", "age": 30}), 2),
//! ];
//! let result = model.compute_order(ranking, &rows);
//! assert_eq!(result.order, vec![2, 0]);
//! ```

pub use strata_core::*;

pub mod model;
