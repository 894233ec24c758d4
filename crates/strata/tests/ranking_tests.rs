//! End-to-end tests driving a ranking the way an interactive frontend would:
//! build a column tree, subscribe at the ranking root, mutate, and check the
//! derived orders and the dirty notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use strata::model::{
    ColumnDesc, ColumnMetaData, NumberFilter, RankingModel, Row, SortCriterion, StringFilter,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn dataset() -> Vec<Row> {
    [
        json!({"name": "Eve",   "age": 28,   "score": 0.9, "dept": "Sales"}),
        json!({"name": "Alice", "age": 34,   "score": 0.7, "dept": "R&D"}),
        json!({"name": "Bob",   "age": null, "score": 0.4, "dept": "R&D"}),
        json!({"name": "Dan",   "age": 41,   "score": 0.8, "dept": "Sales"}),
        json!({"name": "Carol", "age": 34,   "score": 0.6, "dept": "Sales"}),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, v)| Row::new(v, i))
    .collect()
}

fn counting(signal: &strata::Signal<()>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    signal.connect(move |()| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[test]
fn interactive_session() {
    init_tracing();
    let model = RankingModel::new();
    let ranking = model.add_ranking_with_id("main");

    let name = model.create_with_id("name", ColumnDesc::string("name").with_label("Name"));
    let age = model.create_with_id("age", ColumnDesc::number("age"));
    let dept = model.create_with_id("dept", ColumnDesc::categorical("dept", ["R&D", "Sales"]));
    model.push(ranking, name).unwrap();
    model.push(ranking, age).unwrap();
    model.push(ranking, dept).unwrap();

    let signals = model.ranking_signals(ranking).unwrap();
    let order_invalidations = counting(&signals.dirty_order);
    let dirty = counting(&signals.dirty);

    let rows = dataset();

    // Unsorted: data order, one default group.
    let result = model.compute_order(ranking, &rows);
    assert_eq!(result.order, vec![0, 1, 2, 3, 4]);
    assert_eq!(result.groups.len(), 1);

    // Sort by age ascending: ties keep data order, missing age last.
    assert!(model.sort_by_me(age, true));
    assert_eq!(order_invalidations.load(Ordering::SeqCst), 1);
    let result = model.compute_order(ranking, &rows);
    assert_eq!(result.order, vec![0, 1, 4, 3, 2]);

    // Filter out the missing-age row and everyone over 40.
    model.set_number_filter(age, Some(NumberFilter::range(0.0, 40.0).and_filter_missing()));
    assert_eq!(order_invalidations.load(Ordering::SeqCst), 2);
    let result = model.compute_order(ranking, &rows);
    assert_eq!(result.order, vec![0, 1, 4]);

    // Group by department; groups order by name, rows stay age-sorted.
    assert!(model.group_by_me(dept));
    let result = model.compute_order(ranking, &rows);
    let names: Vec<_> = result.groups.iter().map(|g| g.name().to_string()).collect();
    assert_eq!(names, vec!["R&D", "Sales"]);
    assert_eq!(result.order, vec![1, 0, 4]);

    // Structural edits invalidate too: removing the sort column purges the
    // criteria stack.
    assert!(model.remove(ranking, age));
    assert!(model.sort_criteria(ranking).is_empty());
    let result = model.compute_order(ranking, &rows);
    // Filter went with the column; all five rows are back.
    assert_eq!(result.order.len(), 5);

    assert!(dirty.load(Ordering::SeqCst) >= 4);
}

#[test]
fn weighted_stack_ranks_rows() {
    let model = RankingModel::new();
    let ranking = model.add_ranking();
    let stack = model.create(ColumnDesc::stack().with_label("Combined").with_width(300.0));
    let age = model.create(ColumnDesc::number("age"));
    let score = model.create(ColumnDesc::number("score"));
    model.push_child(stack, age).unwrap();
    model.push_child(stack, score).unwrap();
    model.push(ranking, stack).unwrap();

    // Child of a ranking-attached composite still resolves to the ranking.
    assert_eq!(model.find_ranker(score), Some(ranking));
    assert!(model.sort_by_me(stack, false));

    let rows: Vec<Row> = [
        json!({"age": 0.2, "score": 0.9}),
        json!({"age": 0.8, "score": 0.1}),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, v)| Row::new(v, i))
    .collect();

    // Equal weights first: 0.55 vs 0.45.
    assert_eq!(model.compute_order(ranking, &rows).order, vec![0, 1]);

    // Shift the weight to age and the order flips.
    assert!(model.set_weights(stack, &[4.0, 1.0]));
    assert_eq!(model.compute_order(ranking, &rows).order, vec![1, 0]);

    // The stack value itself is the weighted sum.
    let v = model.value(stack, &rows[1]);
    assert_eq!(v, json!(0.8 * 0.8 + 0.2 * 0.1));
}

#[test]
fn dump_survives_an_edited_session() {
    init_tracing();
    let to_ref = |desc: &ColumnDesc| serde_json::to_value(desc).unwrap();
    let resolver = |value: &Value| serde_json::from_value(value.clone()).ok();

    let model = RankingModel::new();
    let ranking = model.add_ranking_with_id("session");
    let name = model.create_with_id("name", ColumnDesc::string("name"));
    let age = model.create_with_id("age", ColumnDesc::number("age"));
    model.push(ranking, name).unwrap();
    model.push(ranking, age).unwrap();

    model.set_width(name, 180.0);
    model.set_metadata(
        age,
        ColumnMetaData {
            label: "Age (years)".into(),
            description: String::new(),
            color: "#336699".into(),
        },
    );
    model.set_string_filter(name, Some(StringFilter::contains("a")));
    model.sort_by(ranking, age, false);
    model.toggle_grouping(ranking, name);

    let json = model
        .dump_ranking(ranking, &to_ref)
        .unwrap()
        .to_json()
        .unwrap();

    let restored = RankingModel::new();
    let dump = strata::model::RankingDump::from_json(&json).unwrap();
    let ranking2 = restored.restore_ranking(&dump, &resolver);

    let cols = restored.ranking_columns(ranking2);
    let (name2, age2) = (cols[0], cols[1]);
    assert_eq!(restored.width(name2), Some(180.0));
    assert_eq!(restored.label(age2).as_deref(), Some("Age (years)"));
    assert_eq!(restored.metadata(age2).unwrap().color, "#336699");
    assert_eq!(
        restored.sort_criteria(ranking2),
        vec![SortCriterion { column: age2, asc: false }]
    );
    assert_eq!(restored.group_criteria(ranking2), vec![name2]);

    // Both models rank identical data identically.
    let rows = dataset();
    assert_eq!(
        model.compute_order(ranking, &rows).order,
        restored.compute_order(ranking2, &rows).order
    );
}

#[test]
fn identity_is_live() {
    let model = RankingModel::new();
    let ranking = model.add_ranking_with_id("r0");
    let outer = model.create_with_id("outer", ColumnDesc::nested());
    let inner = model.create_with_id("inner", ColumnDesc::nested());
    let leaf = model.create_with_id("leaf", ColumnDesc::string("x"));
    model.push_child(inner, leaf).unwrap();
    model.push_child(outer, inner).unwrap();
    model.push(ranking, outer).unwrap();

    assert_eq!(model.fqid(leaf).as_deref(), Some("r0_outer_inner_leaf"));
    assert_eq!(model.fqpath(leaf).as_deref(), Some("@0@0@0"));

    // Detach the middle level: identity re-derives from the new topology.
    assert!(model.remove_child(outer, inner));
    assert_eq!(model.fqid(leaf).as_deref(), Some("inner_leaf"));
    assert_eq!(model.fqpath(leaf).as_deref(), Some("@0"));
    assert_eq!(model.find_ranker(leaf), None);

    model.push(ranking, inner).unwrap();
    assert_eq!(model.fqid(leaf).as_deref(), Some("r0_inner_leaf"));
    assert_eq!(model.fqpath(leaf).as_deref(), Some("@1@0"));
}
