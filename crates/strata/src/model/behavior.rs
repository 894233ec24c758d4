//! Per-kind column behavior.
//!
//! Each column kind contributes a value accessor, a comparator, a group
//! function, and a filter predicate. The base contract (an empty value, an
//! incomparable ordering, the shared default group, an always-pass filter)
//! applies wherever a kind does not override it. Dispatch is a tagged
//! variant over the kind state, not an inheritance chain; composites reach
//! through the arena to their children.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;

use super::desc::{ColumnDesc, ColumnKind};
use super::group::{Group, GroupData};
use super::store::{ColumnKey, ColumnStore};
use super::value::{Row, as_number, as_text, is_missing_value};

/// How a string filter matches cell text.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    /// Case-insensitive substring match.
    Contains(String),
    /// Regular-expression match.
    Pattern(regex::Regex),
}

/// Filter state of a string column.
#[derive(Debug, Clone)]
pub struct StringFilter {
    /// The text matcher.
    pub matcher: StringMatcher,
    /// Also exclude rows whose value is missing.
    pub filter_missing: bool,
}

impl StringFilter {
    /// Case-insensitive substring filter.
    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            matcher: StringMatcher::Contains(text.into()),
            filter_missing: false,
        }
    }

    /// Regular-expression filter. Fails on an invalid pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: StringMatcher::Pattern(regex::Regex::new(pattern)?),
            filter_missing: false,
        })
    }

    /// Also exclude missing values.
    pub fn and_filter_missing(mut self) -> Self {
        self.filter_missing = true;
        self
    }

    fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            StringMatcher::Contains(needle) => {
                text.to_lowercase().contains(&needle.to_lowercase())
            }
            StringMatcher::Pattern(re) => re.is_match(text),
        }
    }
}

/// Filter state of a number column: a closed value range plus a missing
/// policy.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFilter {
    /// Lower bound, inclusive.
    pub min: f64,
    /// Upper bound, inclusive.
    pub max: f64,
    /// Also exclude rows whose value is missing.
    pub filter_missing: bool,
}

impl NumberFilter {
    /// A `[min, max]` range filter keeping missing rows.
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            filter_missing: false,
        }
    }

    /// Also exclude missing values.
    pub fn and_filter_missing(mut self) -> Self {
        self.filter_missing = true;
        self
    }
}

/// Filter state of a categorical column: the set of categories kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalFilter {
    /// Categories that pass the filter.
    pub allowed: BTreeSet<String>,
    /// Also exclude rows whose value is missing.
    pub filter_missing: bool,
}

impl CategoricalFilter {
    /// Keeps only the given categories.
    pub fn keep(categories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: categories.into_iter().map(Into::into).collect(),
            filter_missing: false,
        }
    }

    /// Also exclude missing values.
    pub fn and_filter_missing(mut self) -> Self {
        self.filter_missing = true;
        self
    }
}

/// Sort method of a number column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberSortMethod {
    /// Compare raw values.
    #[default]
    Value,
    /// Compare absolute values.
    Absolute,
}

impl NumberSortMethod {
    /// Stable tag used in events and dumps.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Absolute => "absolute",
        }
    }

    /// Parses a dump tag; unknown tags fall back to the default.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "absolute" => Self::Absolute,
            _ => Self::Value,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StringState {
    pub filter: Option<StringFilter>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NumberState {
    pub filter: Option<NumberFilter>,
    pub sort_method: NumberSortMethod,
    pub group_thresholds: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CategoricalState {
    pub filter: Option<CategoricalFilter>,
}

/// Per-kind state of a column. The variant decides how the column turns a
/// row into a value, a label, an ordering, a bucket, and a filter verdict.
#[derive(Debug, Clone)]
pub(crate) enum ColumnBehavior {
    String(StringState),
    Number(NumberState),
    Categorical(CategoricalState),
    Nested,
    Stack,
}

impl ColumnBehavior {
    pub fn for_desc(desc: &ColumnDesc) -> Self {
        match desc.kind {
            ColumnKind::String => Self::String(StringState::default()),
            ColumnKind::Number => Self::Number(NumberState {
                group_thresholds: desc.group_thresholds.clone(),
                ..NumberState::default()
            }),
            ColumnKind::Categorical => Self::Categorical(CategoricalState::default()),
            ColumnKind::Nested => Self::Nested,
            ColumnKind::Stack => Self::Stack,
        }
    }
}

fn raw_field<'a>(store: &'a ColumnStore, key: ColumnKey, row: &'a Row) -> Option<&'a Value> {
    let node = store.columns.get(key)?;
    node.desc.column.as_deref().and_then(|field| row.field(field))
}

/// The row value of a column. Leaves read their field; nested composites
/// collect child values into an array; stacks aggregate a weighted sum.
pub(crate) fn value_of(store: &ColumnStore, key: ColumnKey, row: &Row) -> Value {
    let Some(node) = store.columns.get(key) else {
        return Value::Null;
    };
    match &node.behavior {
        ColumnBehavior::String(_) | ColumnBehavior::Categorical(_) => raw_field(store, key, row)
            .cloned()
            .unwrap_or(Value::Null),
        ColumnBehavior::Number(_) => match raw_field(store, key, row) {
            // Keep the raw JSON number so integer cells label as "35",
            // not "35.0".
            Some(Value::Number(n)) => Value::Number(n.clone()),
            other => match as_number(other) {
                Some(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
                None => Value::Null,
            },
        },
        ColumnBehavior::Nested => Value::Array(
            node.children
                .iter()
                .map(|&child| value_of(store, child, row))
                .collect(),
        ),
        ColumnBehavior::Stack => match stack_value(store, node, row) {
            Some(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            None => Value::Null,
        },
    }
}

/// Width-weighted sum over the children's numeric values. `None` when no
/// child contributes a number.
fn stack_value(store: &ColumnStore, node: &super::store::ColumnNode, row: &Row) -> Option<f64> {
    let total: f64 = node
        .children
        .iter()
        .filter_map(|&c| store.columns.get(c))
        .map(|c| c.width)
        .sum();
    if total <= 0.0 {
        return None;
    }
    let mut sum = 0.0;
    let mut any = false;
    for &child in &node.children {
        let Some(child_node) = store.columns.get(child) else {
            continue;
        };
        if let Value::Number(n) = value_of(store, child, row) {
            if let Some(v) = n.as_f64() {
                sum += v * (child_node.width / total);
                any = true;
            }
        }
    }
    any.then_some(sum)
}

/// The cell label: the stringified value.
pub(crate) fn label_of(store: &ColumnStore, key: ColumnKey, row: &Row) -> String {
    match value_of(store, key, row) {
        Value::Array(parts) => parts
            .iter()
            .map(|v| as_text(Some(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => as_text(Some(&other)),
    }
}

/// Whether this column's value is missing for the row.
pub(crate) fn is_missing_row(store: &ColumnStore, key: ColumnKey, row: &Row) -> bool {
    is_missing_value(Some(&value_of(store, key, row)))
}

fn compare_missing_last<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => cmp(a, b),
    }
}

/// Tri-state row comparator of a column. `Equal` means "incomparable, use
/// the next criterion". Missing values always order last.
pub(crate) fn compare(store: &ColumnStore, key: ColumnKey, a: &Row, b: &Row) -> Ordering {
    let Some(node) = store.columns.get(key) else {
        return Ordering::Equal;
    };
    match &node.behavior {
        ColumnBehavior::String(_) => {
            let text = |row| {
                let v = value_of(store, key, row);
                (!is_missing_value(Some(&v))).then(|| as_text(Some(&v)).to_lowercase())
            };
            compare_missing_last(text(a), text(b), |a, b| a.cmp(&b))
        }
        ColumnBehavior::Number(state) => {
            let num = |row| {
                let mut n = as_number(raw_field(store, key, row))?;
                if state.sort_method == NumberSortMethod::Absolute {
                    n = n.abs();
                }
                Some(n)
            };
            compare_missing_last(num(a), num(b), |a, b| {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            })
        }
        ColumnBehavior::Categorical(_) => {
            let rank = |row| {
                let v = raw_field(store, key, row);
                if is_missing_value(v) {
                    return None;
                }
                let text = as_text(v);
                let index = node
                    .desc
                    .categories
                    .iter()
                    .position(|c| *c == text)
                    .unwrap_or(node.desc.categories.len());
                Some((index, text))
            };
            compare_missing_last(rank(a), rank(b), |a, b| a.cmp(&b))
        }
        ColumnBehavior::Nested => node
            .children
            .iter()
            .map(|&child| compare(store, child, a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        ColumnBehavior::Stack => compare_missing_last(
            stack_value(store, node, a),
            stack_value(store, node, b),
            |a, b| a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        ),
    }
}

fn number_bucket(thresholds: &[f64], v: f64) -> Group {
    if thresholds.is_empty() {
        return Group::default_group();
    }
    if v < thresholds[0] {
        return Group::new(format!("< {}", thresholds[0]));
    }
    for pair in thresholds.windows(2) {
        if v < pair[1] {
            return Group::new(format!("{} - {}", pair[0], pair[1]));
        }
    }
    Group::new(format!(">= {}", thresholds[thresholds.len() - 1]))
}

/// The group bucket of a row for this column.
///
/// Ungroupable columns collapse into the shared default group so every row
/// still lands somewhere; missing values get their own bucket.
pub(crate) fn group_of(store: &ColumnStore, key: ColumnKey, row: &Row) -> Group {
    let Some(node) = store.columns.get(key) else {
        return Group::default_group();
    };
    match &node.behavior {
        ColumnBehavior::String(_) => {
            let v = value_of(store, key, row);
            if is_missing_value(Some(&v)) {
                return Group::missing_group();
            }
            // Bucket by leading character, upper-cased.
            let text = as_text(Some(&v));
            match text.chars().next() {
                Some(c) => Group::new(c.to_uppercase().to_string()),
                None => Group::missing_group(),
            }
        }
        ColumnBehavior::Number(state) => match as_number(raw_field(store, key, row)) {
            None => Group::missing_group(),
            Some(v) => number_bucket(&state.group_thresholds, v),
        },
        ColumnBehavior::Categorical(_) => {
            let v = raw_field(store, key, row);
            if is_missing_value(v) {
                Group::missing_group()
            } else {
                Group::new(as_text(v))
            }
        }
        // Composites delegate to their first child.
        ColumnBehavior::Nested | ColumnBehavior::Stack => match node.children.first() {
            Some(&child) => group_of(store, child, row),
            None => Group::default_group(),
        },
    }
}

/// Group comparator: case-insensitive bucket-name comparison for every kind.
pub(crate) fn group_compare(
    _store: &ColumnStore,
    _key: ColumnKey,
    a: &GroupData,
    b: &GroupData,
) -> Ordering {
    Group::compare_by_name(a.name(), b.name())
}

/// Filter predicate: `true` keeps the row. Unfiltered columns pass
/// everything; composites pass a row only if every child does.
pub(crate) fn filter_row(store: &ColumnStore, key: ColumnKey, row: &Row) -> bool {
    let Some(node) = store.columns.get(key) else {
        return true;
    };
    match &node.behavior {
        ColumnBehavior::String(state) => match &state.filter {
            None => true,
            Some(filter) => {
                let v = value_of(store, key, row);
                if is_missing_value(Some(&v)) {
                    !filter.filter_missing
                } else {
                    filter.matches(&as_text(Some(&v)))
                }
            }
        },
        ColumnBehavior::Number(state) => match &state.filter {
            None => true,
            Some(filter) => match as_number(raw_field(store, key, row)) {
                None => !filter.filter_missing,
                Some(v) => v >= filter.min && v <= filter.max,
            },
        },
        ColumnBehavior::Categorical(state) => match &state.filter {
            None => true,
            Some(filter) => {
                let v = raw_field(store, key, row);
                if is_missing_value(v) {
                    !filter.filter_missing
                } else {
                    filter.allowed.contains(&as_text(v))
                }
            }
        },
        ColumnBehavior::Nested | ColumnBehavior::Stack => node
            .children
            .iter()
            .all(|&child| filter_row(store, child, row)),
    }
}

/// Whether any filter is applied on this column (for composites: on any
/// descendant).
pub(crate) fn is_filtered(store: &ColumnStore, key: ColumnKey) -> bool {
    let Some(node) = store.columns.get(key) else {
        return false;
    };
    match &node.behavior {
        ColumnBehavior::String(state) => state.filter.is_some(),
        ColumnBehavior::Number(state) => state.filter.is_some(),
        ColumnBehavior::Categorical(state) => state.filter.is_some(),
        ColumnBehavior::Nested | ColumnBehavior::Stack => node
            .children
            .iter()
            .any(|&child| is_filtered(store, child)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_buckets() {
        let thresholds = [10.0, 20.0];
        assert_eq!(number_bucket(&thresholds, 5.0).name, "< 10");
        assert_eq!(number_bucket(&thresholds, 10.0).name, "10 - 20");
        assert_eq!(number_bucket(&thresholds, 19.9).name, "10 - 20");
        assert_eq!(number_bucket(&thresholds, 20.0).name, ">= 20");
        assert_eq!(number_bucket(&[], 5.0).name, super::super::group::DEFAULT_GROUP_NAME);
    }

    #[test]
    fn test_string_filter_matching() {
        let filter = StringFilter::contains("ali");
        assert!(filter.matches("Alice"));
        assert!(!filter.matches("Bob"));

        let filter = StringFilter::regex("^A.*e$").unwrap();
        assert!(filter.matches("Alice"));
        assert!(!filter.matches("Alicia"));

        assert!(StringFilter::regex("(unclosed").is_err());
    }

    #[test]
    fn test_sort_method_tags() {
        assert_eq!(NumberSortMethod::Absolute.tag(), "absolute");
        assert_eq!(NumberSortMethod::from_tag("absolute"), NumberSortMethod::Absolute);
        assert_eq!(NumberSortMethod::from_tag("bogus"), NumberSortMethod::Value);
    }
}
