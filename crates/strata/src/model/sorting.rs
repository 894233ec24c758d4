//! Row access, filtering, grouping, and ordering.
//!
//! The model never stores rows; callers hand a row slice in and get a
//! derived [`RankingOrder`] back. The pipeline is filter, then partition
//! into groups, then sort rows inside each group by the sort criteria, then
//! sort the groups themselves by the group-sort criteria. Sorting is stable:
//! rows every criterion considers equal keep their original data order.

use std::cmp::Ordering;

use serde_json::Value;
use strata_core::logging::targets;

use super::behavior;
use super::group::{Group, GroupData, join_groups};
use super::model::RankingModel;
use super::store::{ColumnKey, RankingKey, SortCriterion};
use super::value::Row;

/// The derived output of one ordering pass: the surviving rows partitioned
/// into display-ordered groups, plus the flat original-index order.
#[derive(Debug, Clone)]
pub struct RankingOrder {
    /// Groups in display order, each holding its rows in sorted order.
    pub groups: Vec<GroupData>,
    /// Original row indices, concatenated across groups.
    pub order: Vec<usize>,
}

impl RankingModel {
    // -------------------------------------------------------------------------
    // Row access
    // -------------------------------------------------------------------------

    /// The column's value for a row. `Null` for unknown columns and missing
    /// cells.
    pub fn value(&self, key: ColumnKey, row: &Row) -> Value {
        behavior::value_of(&self.store().read(), key, row)
    }

    /// The column's display label for a row. Empty for missing cells.
    pub fn row_label(&self, key: ColumnKey, row: &Row) -> String {
        behavior::label_of(&self.store().read(), key, row)
    }

    /// Whether the column's value is missing for a row.
    pub fn is_missing(&self, key: ColumnKey, row: &Row) -> bool {
        behavior::is_missing_row(&self.store().read(), key, row)
    }

    /// The column's comparator applied to two rows. Missing values order
    /// last regardless of direction; `Equal` defers to the next criterion.
    pub fn compare_rows(&self, key: ColumnKey, a: &Row, b: &Row) -> Ordering {
        behavior::compare(&self.store().read(), key, a, b)
    }

    /// The group bucket the column assigns to a row.
    pub fn group_of(&self, key: ColumnKey, row: &Row) -> Group {
        behavior::group_of(&self.store().read(), key, row)
    }

    /// Whether the row passes this single column's filter.
    pub fn filter_row(&self, key: ColumnKey, row: &Row) -> bool {
        behavior::filter_row(&self.store().read(), key, row)
    }

    /// Whether any filter is active on this column or its descendants.
    pub fn is_filtered(&self, key: ColumnKey) -> bool {
        behavior::is_filtered(&self.store().read(), key)
    }

    // -------------------------------------------------------------------------
    // Ordering pipeline
    // -------------------------------------------------------------------------

    /// Keeps the rows that pass every column filter of the ranking.
    ///
    /// Filters compose conjunctively over all reachable columns; composites
    /// already fold their children, so only top-level columns are consulted.
    pub fn filter_rows<'a>(&self, ranking: RankingKey, rows: &'a [Row]) -> Vec<&'a Row> {
        let store = self.store().read();
        let Some(node) = store.rankings.get(ranking) else {
            return rows.iter().collect();
        };
        let columns = node.columns.clone();
        rows.iter()
            .filter(|row| columns.iter().all(|&col| behavior::filter_row(&store, col, row)))
            .collect()
    }

    /// Partitions rows into groups per the group-criteria stack.
    ///
    /// With no criteria every row lands in the shared default group. With
    /// several criteria a row's buckets are combined into one nested group;
    /// rows sharing the combined name share the group.
    pub fn group_rows(&self, ranking: RankingKey, rows: &[&Row]) -> Vec<GroupData> {
        let store = self.store().read();
        let criteria = store
            .rankings
            .get(ranking)
            .map(|n| n.group_criteria.clone())
            .unwrap_or_default();

        if criteria.is_empty() {
            return vec![GroupData {
                group: Group::default_group(),
                rows: rows.iter().map(|&r| r.clone()).collect(),
            }];
        }

        // First-seen order; the group-sort pass reorders afterwards.
        let mut groups: Vec<GroupData> = Vec::new();
        for &row in rows {
            let combined = join_groups(
                criteria
                    .iter()
                    .map(|&col| behavior::group_of(&store, col, row))
                    .collect(),
            );
            match groups.iter_mut().find(|g| g.group.name == combined.name) {
                Some(existing) => existing.rows.push(row.clone()),
                None => groups.push(GroupData {
                    group: combined,
                    rows: vec![row.clone()],
                }),
            }
        }
        groups
    }

    /// Sorts rows inside one group by the sort-criteria stack.
    ///
    /// Criteria apply in priority order; full ties fall back to the original
    /// data order.
    pub fn sort_group_rows(&self, ranking: RankingKey, group: &mut GroupData) {
        let store = self.store().read();
        let criteria = store
            .rankings
            .get(ranking)
            .map(|n| n.sort_criteria.clone())
            .unwrap_or_default();
        group.rows.sort_by(|a, b| {
            compare_by_criteria(&store, &criteria, a, b).then(a.index.cmp(&b.index))
        });
    }

    /// Sorts the groups themselves by the group-sort-criteria stack.
    ///
    /// Each criterion applies its column's group comparator with the
    /// criterion's direction; the first non-equal result wins. Full ties
    /// fall back to case-insensitive group names.
    pub fn sort_groups(&self, ranking: RankingKey, groups: &mut [GroupData]) {
        let store = self.store().read();
        let criteria = store
            .rankings
            .get(ranking)
            .map(|n| n.group_sort_criteria.clone())
            .unwrap_or_default();
        groups.sort_by(|a, b| {
            for criterion in &criteria {
                let ordering = behavior::group_compare(&store, criterion.column, a, b);
                let ordering = if criterion.asc { ordering } else { ordering.reverse() };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Group::compare_by_name(a.name(), b.name())
        });
    }

    /// Runs the full pipeline: filter, group, sort within groups, sort
    /// groups. The resulting flat order carries original row indices.
    pub fn compute_order(&self, ranking: RankingKey, rows: &[Row]) -> RankingOrder {
        let kept = self.filter_rows(ranking, rows);
        let mut groups = self.group_rows(ranking, &kept);
        for group in &mut groups {
            self.sort_group_rows(ranking, group);
        }
        self.sort_groups(ranking, &mut groups);

        let order: Vec<usize> = groups
            .iter()
            .flat_map(|g| g.rows.iter().map(|r| r.index))
            .collect();
        tracing::debug!(
            target: targets::SORTING,
            rows = rows.len(),
            kept = order.len(),
            groups = groups.len(),
            "computed order"
        );
        RankingOrder { groups, order }
    }
}

fn compare_by_criteria(
    store: &super::store::ColumnStore,
    criteria: &[SortCriterion],
    a: &Row,
    b: &Row,
) -> Ordering {
    for criterion in criteria {
        // Missing values stay last under either direction, so missingness is
        // settled before the `asc` negation touches the value comparison.
        let ordering = match (
            behavior::is_missing_row(store, criterion.column, a),
            behavior::is_missing_row(store, criterion.column, b),
        ) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let by_value = behavior::compare(store, criterion.column, a, b);
                if criterion.asc { by_value } else { by_value.reverse() }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::behavior::{NumberFilter, StringFilter};
    use crate::model::desc::ColumnDesc;
    use crate::model::group::{DEFAULT_GROUP_NAME, MISSING_GROUP_NAME};
    use serde_json::json;

    fn rows(values: &[Value]) -> Vec<Row> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Row::new(v.clone(), i))
            .collect()
    }

    fn people() -> Vec<Row> {
        rows(&[
            json!({"name": "Carol", "age": 35, "dept": "Sales"}),
            json!({"name": "alice", "age": 30, "dept": "R&D"}),
            json!({"name": "Bob", "age": null, "dept": "Sales"}),
            json!({"name": "dave", "age": 30, "dept": "R&D"}),
        ])
    }

    #[test]
    fn test_sort_missing_last_and_stable() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let age = model.create(ColumnDesc::number("age"));
        model.push(rk, age).unwrap();
        model.sort_by(rk, age, true);

        let data = people();
        let result = model.compute_order(rk, &data);
        // Two age-30 rows tie and keep data order; Bob's missing age sorts
        // last even ascending.
        assert_eq!(result.order, vec![1, 3, 0, 2]);

        model.sort_by(rk, age, false);
        let result = model.compute_order(rk, &data);
        assert_eq!(result.order, vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_multi_column_filter_is_conjunctive() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let name = model.create(ColumnDesc::string("name"));
        let age = model.create(ColumnDesc::number("age"));
        model.push(rk, name).unwrap();
        model.push(rk, age).unwrap();

        let data = people();
        model.set_string_filter(name, Some(StringFilter::contains("a")));
        assert_eq!(model.filter_rows(rk, &data).len(), 3);

        model.set_number_filter(age, Some(NumberFilter::range(0.0, 32.0)));
        let kept = model.filter_rows(rk, &data);
        let names: Vec<_> = kept.iter().map(|r| model.row_label(name, r)).collect();
        // Bob's missing age passes the range filter by default.
        assert_eq!(names, vec!["alice", "dave"]);

        model.set_number_filter(
            age,
            Some(NumberFilter::range(0.0, 40.0).and_filter_missing()),
        );
        let kept = model.filter_rows(rk, &data);
        let names: Vec<_> = kept.iter().map(|r| model.row_label(name, r)).collect();
        assert_eq!(names, vec!["Carol", "alice", "dave"]);
    }

    #[test]
    fn test_grouping_default_and_missing() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let age = model.create(ColumnDesc::number("age").with_group_thresholds([33.0]));
        model.push(rk, age).unwrap();

        let data = people();
        // No criteria: one default group with every row.
        let result = model.compute_order(rk, &data);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].name(), DEFAULT_GROUP_NAME);
        assert_eq!(result.order.len(), 4);

        model.toggle_grouping(rk, age);
        let result = model.compute_order(rk, &data);
        let names: Vec<_> = result.groups.iter().map(GroupData::name).collect();
        // Group-name ordering is case-insensitive lexicographic.
        assert_eq!(names, vec!["< 33", ">= 33", MISSING_GROUP_NAME]);
        assert_eq!(result.groups[0].rows.len(), 2);
        assert_eq!(result.groups[2].rows[0].index, 2);
    }

    #[test]
    fn test_nested_grouping_combines_names() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let dept = model.create(ColumnDesc::categorical("dept", ["R&D", "Sales"]));
        let age = model.create(ColumnDesc::number("age").with_group_thresholds([33.0]));
        model.push(rk, dept).unwrap();
        model.push(rk, age).unwrap();
        model.toggle_grouping(rk, dept);
        model.toggle_grouping(rk, age);

        let data = people();
        let result = model.compute_order(rk, &data);
        let names: Vec<_> = result.groups.iter().map(GroupData::name).collect();
        assert_eq!(
            names,
            vec![
                "R&D ∩ < 33",
                "Sales ∩ >= 33",
                "Sales ∩ Missing values",
            ]
        );
    }

    #[test]
    fn test_group_sorting_orders_groups() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let dept = model.create(ColumnDesc::categorical("dept", ["R&D", "Sales"]));
        let age = model.create(ColumnDesc::number("age"));
        model.push(rk, dept).unwrap();
        model.push(rk, age).unwrap();
        model.toggle_grouping(rk, dept);
        model.sort_by(rk, age, false);

        let data = people();
        // Default: groups by name, R&D first.
        let result = model.compute_order(rk, &data);
        assert_eq!(result.groups[0].name(), "R&D");

        // The group comparator orders by name; descending reverses it, so
        // Sales now comes first. Rows inside Sales keep missing-age last.
        model.group_sort_by(rk, age, false);
        let result = model.compute_order(rk, &data);
        assert_eq!(result.groups[0].name(), "Sales");
        assert_eq!(result.order, vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_group_sort_ignores_lead_row_values() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let dept = model.create(ColumnDesc::categorical("dept", ["A", "B"]));
        let age = model.create(ColumnDesc::number("age"));
        model.push(rk, dept).unwrap();
        model.push(rk, age).unwrap();
        model.toggle_grouping(rk, dept);

        // Group A leads with the larger age value; a lead-row comparison
        // would put B first, the group comparator keeps name order.
        let data = rows(&[
            json!({"dept": "A", "age": 50}),
            json!({"dept": "B", "age": 10}),
        ]);
        model.group_sort_by(rk, age, true);
        let result = model.compute_order(rk, &data);
        let names: Vec<_> = result.groups.iter().map(GroupData::name).collect();
        assert_eq!(names, vec!["A", "B"]);

        model.group_sort_by(rk, age, false);
        let result = model.compute_order(rk, &data);
        let names: Vec<_> = result.groups.iter().map(GroupData::name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_descending_sort_keeps_missing_last() {
        let model = RankingModel::new();
        let rk = model.add_ranking();
        let age = model.create(ColumnDesc::number("age"));
        model.push(rk, age).unwrap();

        let data = rows(&[
            json!({"age": null}),
            json!({"age": 10}),
            json!({"age": 30}),
        ]);
        model.sort_by(rk, age, false);
        assert_eq!(model.compute_order(rk, &data).order, vec![2, 1, 0]);
        model.sort_by(rk, age, true);
        assert_eq!(model.compute_order(rk, &data).order, vec![1, 2, 0]);
    }

    #[test]
    fn test_value_and_label_access() {
        let model = RankingModel::new();
        let name = model.create(ColumnDesc::string("name"));
        let age = model.create(ColumnDesc::number("age"));
        let data = people();

        assert_eq!(model.value(name, &data[0]), json!("Carol"));
        // Integer cells stay integers; no float round-trip.
        assert_eq!(model.value(age, &data[0]), json!(35));
        assert_eq!(model.value(age, &data[2]), Value::Null);
        assert!(model.is_missing(age, &data[2]));
        assert_eq!(model.row_label(age, &data[0]), "35");
        assert_eq!(model.row_label(age, &data[2]), "");
    }

    #[test]
    fn test_stack_value_weighted() {
        let model = RankingModel::new();
        let stack = model.create(ColumnDesc::stack().with_width(200.0));
        let a = model.create(ColumnDesc::number("a"));
        let b = model.create(ColumnDesc::number("b"));
        model.push_child(stack, a).unwrap();
        model.push_child(stack, b).unwrap();
        model.set_weights(stack, &[3.0, 1.0]);

        let data = rows(&[json!({"a": 4.0, "b": 8.0})]);
        assert_eq!(model.value(stack, &data[0]), json!(0.75 * 4.0 + 0.25 * 8.0));
    }
}
