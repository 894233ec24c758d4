//! Row groups.
//!
//! Grouping partitions rows into named buckets by applying each group
//! criterion's `group` function in stack order. Nested criteria produce
//! joined buckets whose names combine the per-criterion bucket names.

use std::cmp::Ordering;

use super::value::Row;

/// Name of the bucket that ungroupable columns collapse into.
pub const DEFAULT_GROUP_NAME: &str = "Default group";

/// Name of the bucket that rows with missing values fall into.
pub const MISSING_GROUP_NAME: &str = "Missing values";

/// Color used for buckets without an explicit color.
pub const DEFAULT_GROUP_COLOR: &str = "#AAAAAA";

/// A named row bucket produced by group-criteria evaluation.
///
/// The name is the bucket's stable identity: two rows with equal group names
/// land in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Bucket name and identity.
    pub name: String,
    /// Display color for the bucket.
    pub color: String,
}

impl Group {
    /// Creates a group with the default color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: DEFAULT_GROUP_COLOR.to_string(),
        }
    }

    /// Creates a group with an explicit color.
    pub fn with_color(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }

    /// The shared bucket for columns that cannot group.
    pub fn default_group() -> Self {
        Self::new(DEFAULT_GROUP_NAME)
    }

    /// The shared bucket for rows with missing values.
    pub fn missing_group() -> Self {
        Self::new(MISSING_GROUP_NAME)
    }

    /// Case-insensitive name comparison, the default group ordering.
    pub fn compare_by_name(a: &str, b: &str) -> Ordering {
        a.to_lowercase().cmp(&b.to_lowercase())
    }
}

/// Joins the per-criterion buckets of one row into a single nested bucket.
///
/// A single group passes through unchanged; several are combined with " ∩ "
/// between the names, keeping the first group's color. An empty list yields
/// the default group.
pub fn join_groups(groups: Vec<Group>) -> Group {
    match groups.len() {
        0 => Group::default_group(),
        1 => groups.into_iter().next().unwrap(),
        _ => {
            let color = groups[0].color.clone();
            let name = groups
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(" ∩ ");
            Group { name, color }
        }
    }
}

/// A group together with the rows currently in it.
///
/// Group-sort criteria compare `GroupData`, not bare groups, so comparators
/// can aggregate over member rows.
#[derive(Debug, Clone)]
pub struct GroupData {
    /// The bucket identity.
    pub group: Group,
    /// Rows currently in this bucket, in their present order.
    pub rows: Vec<Row>,
}

impl GroupData {
    /// Creates group data for a bucket.
    pub fn new(group: Group, rows: Vec<Row>) -> Self {
        Self { group, rows }
    }

    /// The bucket name.
    pub fn name(&self) -> &str {
        &self.group.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_groups() {
        assert_eq!(join_groups(vec![]).name, DEFAULT_GROUP_NAME);
        assert_eq!(join_groups(vec![Group::new("A")]).name, "A");

        let joined = join_groups(vec![
            Group::with_color("A", "#ff0000"),
            Group::new("low"),
        ]);
        assert_eq!(joined.name, "A ∩ low");
        assert_eq!(joined.color, "#ff0000");
    }

    #[test]
    fn test_compare_by_name() {
        assert_eq!(Group::compare_by_name("alpha", "Beta"), Ordering::Less);
        assert_eq!(Group::compare_by_name("A", "a"), Ordering::Equal);
    }
}
