//! Dump and restore.
//!
//! A dump captures the mutable state of a ranking (or a single column
//! subtree) against its immutable descriptions: only fields differing from
//! their description-derived defaults are written, so a freshly created
//! column dumps to little more than its id and desc reference. Descriptions
//! themselves are not embedded; the caller supplies a `to_desc_ref` mapping
//! at dump time and a resolver at restore time, which keeps dumps small and
//! lets an application re-home them onto updated descriptions.
//!
//! Restore is tolerant: absent optional fields keep their defaults, columns
//! whose desc ref does not resolve are skipped, criteria entries naming
//! unknown ids are dropped, and an invalid filter pattern drops just the
//! filter. The only hard failure is malformed JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_core::logging::targets;

use super::behavior::{
    CategoricalFilter, ColumnBehavior, NumberFilter, NumberSortMethod, StringFilter,
    StringMatcher,
};
use super::desc::ColumnDesc;
use super::model::RankingModel;
use super::store::{ColumnKey, ColumnNode, ParentLink, RankingKey, SortCriterion, fix_css};

/// Error at the JSON boundary of the dump codec.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    /// The dump text is not valid JSON or does not match the dump shape.
    #[error("malformed dump: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serialized filter state, shared across column kinds; the kind of the
/// restored column decides which fields apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDump {
    /// Substring matcher of a string filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Regex matcher of a string filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Lower bound of a number filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound of a number filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Kept categories of a categorical filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Whether missing values are excluded too.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub filter_missing: bool,
}

/// Serialized state of one column subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDump {
    /// Column id.
    pub id: String,
    /// Opaque description reference, produced by the caller's `to_desc_ref`.
    pub desc: Value,
    /// Current width. Always written; restore applies it verbatim.
    pub width: f64,
    /// Label, when differing from the desc-derived default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Long description, when differing from the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Color, when differing from the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Cell renderer tag, when overridden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    /// Group renderer tag, when overridden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_renderer: Option<String>,
    /// Summary renderer tag, when overridden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_renderer: Option<String>,
    /// Active filter state, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterDump>,
    /// Number sort method, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,
    /// Number grouping thresholds, when differing from the desc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_thresholds: Option<Vec<f64>>,
    /// Child dumps, composites only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ColumnDump>,
}

/// One serialized criteria entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionDump {
    /// Id of the referenced column.
    pub col: String,
    /// Ascending?
    pub asc: bool,
}

/// Serialized state of a whole ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingDump {
    /// Ranking id.
    pub id: String,
    /// Top-level column dumps, in display order.
    pub columns: Vec<ColumnDump>,
    /// Sort-criteria stack, primary first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_criteria: Vec<CriterionDump>,
    /// Group-criteria stack, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_criteria: Vec<String>,
    /// Group-sort-criteria stack, primary first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_sort_criteria: Vec<CriterionDump>,
}

impl RankingDump {
    /// Serializes the dump to JSON.
    pub fn to_json(&self) -> Result<String, RestoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a dump from JSON.
    pub fn from_json(json: &str) -> Result<Self, RestoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn dump_filter(behavior: &ColumnBehavior) -> Option<FilterDump> {
    match behavior {
        ColumnBehavior::String(state) => state.filter.as_ref().map(|f| FilterDump {
            contains: match &f.matcher {
                StringMatcher::Contains(text) => Some(text.clone()),
                StringMatcher::Pattern(_) => None,
            },
            pattern: match &f.matcher {
                StringMatcher::Pattern(re) => Some(re.as_str().to_string()),
                StringMatcher::Contains(_) => None,
            },
            filter_missing: f.filter_missing,
            ..FilterDump::default()
        }),
        ColumnBehavior::Number(state) => state.filter.as_ref().map(|f| FilterDump {
            min: Some(f.min),
            max: Some(f.max),
            filter_missing: f.filter_missing,
            ..FilterDump::default()
        }),
        ColumnBehavior::Categorical(state) => state.filter.as_ref().map(|f| FilterDump {
            categories: Some(f.allowed.iter().cloned().collect()),
            filter_missing: f.filter_missing,
            ..FilterDump::default()
        }),
        ColumnBehavior::Nested | ColumnBehavior::Stack => None,
    }
}

fn restore_filter(behavior: &mut ColumnBehavior, dump: &FilterDump) {
    match behavior {
        ColumnBehavior::String(state) => {
            let matcher = if let Some(text) = &dump.contains {
                Some(StringMatcher::Contains(text.clone()))
            } else if let Some(pattern) = &dump.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) => Some(StringMatcher::Pattern(re)),
                    Err(error) => {
                        tracing::warn!(target: targets::DUMP, %pattern, %error, "dropping invalid filter pattern");
                        None
                    }
                }
            } else {
                None
            };
            state.filter = matcher.map(|matcher| StringFilter {
                matcher,
                filter_missing: dump.filter_missing,
            });
        }
        ColumnBehavior::Number(state) => {
            if let (Some(min), Some(max)) = (dump.min, dump.max) {
                state.filter = Some(NumberFilter {
                    min,
                    max,
                    filter_missing: dump.filter_missing,
                });
            }
        }
        ColumnBehavior::Categorical(state) => {
            if let Some(categories) = &dump.categories {
                state.filter = Some(CategoricalFilter {
                    allowed: categories.iter().cloned().collect(),
                    filter_missing: dump.filter_missing,
                });
            }
        }
        ColumnBehavior::Nested | ColumnBehavior::Stack => {}
    }
}

fn differs<T: PartialEq>(current: T, default: T) -> Option<T> {
    (current != default).then_some(current)
}

impl RankingModel {
    /// Dumps a column subtree. Only fields differing from their
    /// description-derived defaults are carried.
    pub fn dump_column(
        &self,
        key: ColumnKey,
        to_desc_ref: &dyn Fn(&ColumnDesc) -> Value,
    ) -> Option<ColumnDump> {
        let store = self.store().read();
        dump_column_rec(&store, key, to_desc_ref)
    }

    /// Dumps a whole ranking, including its criteria stacks by column id.
    pub fn dump_ranking(
        &self,
        ranking: RankingKey,
        to_desc_ref: &dyn Fn(&ColumnDesc) -> Value,
    ) -> Option<RankingDump> {
        let store = self.store().read();
        let node = store.rankings.get(ranking)?;
        let columns = node
            .columns
            .iter()
            .filter_map(|&col| dump_column_rec(&store, col, to_desc_ref))
            .collect();
        let criterion = |c: &SortCriterion| {
            store.columns.get(c.column).map(|n| CriterionDump {
                col: n.id.clone(),
                asc: c.asc,
            })
        };
        Some(RankingDump {
            id: node.id.clone(),
            columns,
            sort_criteria: node.sort_criteria.iter().filter_map(criterion).collect(),
            group_criteria: node
                .group_criteria
                .iter()
                .filter_map(|&c| store.columns.get(c).map(|n| n.id.clone()))
                .collect(),
            group_sort_criteria: node
                .group_sort_criteria
                .iter()
                .filter_map(criterion)
                .collect(),
        })
    }

    /// Restores a column subtree as a detached column.
    ///
    /// Returns `None` when the desc ref does not resolve; unresolvable
    /// children are skipped individually. No signals fire during restore;
    /// subscribe after rebuilding.
    pub fn restore_column(
        &self,
        dump: &ColumnDump,
        resolver: &dyn Fn(&Value) -> Option<ColumnDesc>,
    ) -> Option<ColumnKey> {
        let Some(desc) = resolver(&dump.desc) else {
            tracing::warn!(target: targets::DUMP, id = %dump.id, "skipping column with unresolvable desc");
            return None;
        };
        let children: Vec<ColumnKey> = dump
            .children
            .iter()
            .filter_map(|child| self.restore_column(child, resolver))
            .collect();

        let mut store = self.store().write();
        let mut node = ColumnNode::new(fix_css(&dump.id), desc);
        node.width = dump.width;
        if let Some(label) = &dump.label {
            node.metadata.label = label.clone();
        }
        if let Some(description) = &dump.description {
            node.metadata.description = description.clone();
        }
        if let Some(color) = &dump.color {
            node.metadata.color = color.clone();
        }
        if let Some(renderer) = &dump.renderer {
            node.renderer = renderer.clone();
        }
        if let Some(renderer) = &dump.group_renderer {
            node.group_renderer = renderer.clone();
        }
        if let Some(renderer) = &dump.summary_renderer {
            node.summary_renderer = renderer.clone();
        }
        if let Some(filter) = &dump.filter {
            restore_filter(&mut node.behavior, filter);
        }
        if let ColumnBehavior::Number(state) = &mut node.behavior {
            if let Some(tag) = &dump.sort_method {
                state.sort_method = NumberSortMethod::from_tag(tag);
            }
            if let Some(thresholds) = &dump.group_thresholds {
                state.group_thresholds = thresholds.clone();
            }
        }
        node.children = children.clone();
        let key = store.columns.insert(node);
        for child in children {
            store.columns[child].parent = Some(ParentLink::Column(key));
        }
        Some(key)
    }

    /// Restores a whole ranking: columns first, then criteria stacks
    /// re-resolved by column id. Criteria naming ids that did not survive
    /// the column restore are dropped.
    pub fn restore_ranking(
        &self,
        dump: &RankingDump,
        resolver: &dyn Fn(&Value) -> Option<ColumnDesc>,
    ) -> RankingKey {
        let ranking = self.add_ranking_with_id(&dump.id);
        let columns: Vec<ColumnKey> = dump
            .columns
            .iter()
            .filter_map(|col| self.restore_column(col, resolver))
            .collect();

        let mut store = self.store().write();
        for &col in &columns {
            store.columns[col].parent = Some(ParentLink::Ranking(ranking));
        }
        store.rankings[ranking].columns = columns;
        let by_id: Vec<(String, ColumnKey)> = store
            .reachable_columns(ranking)
            .into_iter()
            .filter_map(|key| store.columns.get(key).map(|n| (n.id.clone(), key)))
            .collect();
        let resolve_id =
            |id: &str| by_id.iter().find(|(i, _)| i == id).map(|&(_, key)| key);
        let criterion = |c: &CriterionDump| {
            resolve_id(&c.col).map(|column| SortCriterion {
                column,
                asc: c.asc,
            })
        };

        let node = &mut store.rankings[ranking];
        node.sort_criteria = dump.sort_criteria.iter().filter_map(criterion).collect();
        node.group_criteria = dump
            .group_criteria
            .iter()
            .filter_map(|id| resolve_id(id))
            .collect();
        node.group_sort_criteria = dump
            .group_sort_criteria
            .iter()
            .filter_map(criterion)
            .collect();
        ranking
    }
}

fn dump_column_rec(
    store: &super::store::ColumnStore,
    key: ColumnKey,
    to_desc_ref: &dyn Fn(&ColumnDesc) -> Value,
) -> Option<ColumnDump> {
    let node = store.columns.get(key)?;
    let desc = &node.desc;
    let defaults = desc.default_metadata(&node.id);
    let (sort_method, group_thresholds) = match &node.behavior {
        ColumnBehavior::Number(state) => (
            differs(state.sort_method, NumberSortMethod::default())
                .map(|m| m.tag().to_string()),
            differs(state.group_thresholds.clone(), desc.group_thresholds.clone()),
        ),
        _ => (None, None),
    };
    Some(ColumnDump {
        id: node.id.clone(),
        desc: to_desc_ref(desc),
        width: node.width,
        label: differs(node.metadata.label.clone(), defaults.label),
        description: differs(node.metadata.description.clone(), defaults.description),
        color: differs(node.metadata.color.clone(), defaults.color),
        renderer: differs(node.renderer.clone(), desc.default_renderer()),
        group_renderer: differs(node.group_renderer.clone(), desc.default_group_renderer()),
        summary_renderer: differs(
            node.summary_renderer.clone(),
            desc.default_summary_renderer(),
        ),
        filter: dump_filter(&node.behavior),
        sort_method,
        group_thresholds,
        children: node
            .children
            .iter()
            .filter_map(|&child| dump_column_rec(store, child, to_desc_ref))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::behavior::{NumberFilter, StringFilter};
    use crate::model::desc::ColumnMetaData;
    use serde_json::json;

    fn desc_ref(desc: &ColumnDesc) -> Value {
        // The app side of the contract: descriptions round-trip through
        // their serde form.
        serde_json::to_value(desc).unwrap()
    }

    fn desc_resolver(value: &Value) -> Option<ColumnDesc> {
        serde_json::from_value(value.clone()).ok()
    }

    #[test]
    fn test_pristine_column_dumps_minimal() {
        let model = RankingModel::new();
        let col = model.create_with_id("age", ColumnDesc::number("age"));
        let dump = model.dump_column(col, &desc_ref).unwrap();

        assert_eq!(dump.id, "age");
        assert_eq!(dump.width, 100.0);
        assert!(dump.label.is_none());
        assert!(dump.color.is_none());
        assert!(dump.renderer.is_none());
        assert!(dump.filter.is_none());
        assert!(dump.sort_method.is_none());

        let json = serde_json::to_value(&dump).unwrap();
        let keys = json.as_object().unwrap();
        assert_eq!(keys.len(), 3);
        for key in ["id", "desc", "width"] {
            assert!(keys.contains_key(key));
        }
    }

    #[test]
    fn test_dump_carries_only_overrides() {
        let model = RankingModel::new();
        let col = model.create_with_id("age", ColumnDesc::number("age"));
        model.set_width(col, 150.0);
        model.set_metadata(
            col,
            ColumnMetaData {
                label: "Age".into(),
                description: String::new(),
                color: crate::model::desc::DEFAULT_COLOR.into(),
            },
        );
        model.set_renderer(col, "bar");

        let dump = model.dump_column(col, &desc_ref).unwrap();
        assert_eq!(dump.width, 150.0);
        assert_eq!(dump.label.as_deref(), Some("Age"));
        assert!(dump.color.is_none());
        assert_eq!(dump.renderer.as_deref(), Some("bar"));
        assert!(dump.group_renderer.is_none());
    }

    #[test]
    fn test_ranking_roundtrip() {
        let model = RankingModel::new();
        let rk = model.add_ranking_with_id("r");
        let name = model.create_with_id("name", ColumnDesc::string("name"));
        let nested = model.create_with_id("n", ColumnDesc::nested());
        let age = model.create_with_id("age", ColumnDesc::number("age"));
        model.push_child(nested, age).unwrap();
        model.push(rk, name).unwrap();
        model.push(rk, nested).unwrap();

        model.set_width(age, 60.0);
        model.set_string_filter(name, Some(StringFilter::contains("a").and_filter_missing()));
        model.set_number_filter(age, Some(NumberFilter::range(10.0, 20.0)));
        model.sort_by(rk, age, false);
        model.toggle_grouping(rk, name);
        model.group_sort_by(rk, name, true);

        let json = model.dump_ranking(rk, &desc_ref).unwrap().to_json().unwrap();

        let restored_model = RankingModel::new();
        let dump = RankingDump::from_json(&json).unwrap();
        let rk2 = restored_model.restore_ranking(&dump, &desc_resolver);

        assert_eq!(restored_model.ranking_id(rk2).as_deref(), Some("r"));
        let cols = restored_model.ranking_columns(rk2);
        assert_eq!(cols.len(), 2);
        let name2 = cols[0];
        let nested2 = cols[1];
        let age2 = restored_model.children(nested2)[0];

        assert_eq!(restored_model.id(name2).as_deref(), Some("name"));
        assert_eq!(restored_model.width(age2), Some(60.0));
        assert_eq!(restored_model.fqid(age2).as_deref(), Some("r_n_age"));
        assert!(restored_model.is_filtered(name2));
        assert!(restored_model.is_filtered(nested2));

        let sort = restored_model.sort_criteria(rk2);
        assert_eq!(sort.len(), 1);
        assert_eq!(sort[0].column, age2);
        assert!(!sort[0].asc);
        assert_eq!(restored_model.group_criteria(rk2), vec![name2]);
        let group_sort = restored_model.group_sort_criteria(rk2);
        assert_eq!(group_sort.len(), 1);
        assert_eq!(group_sort[0].column, name2);
        assert!(group_sort[0].asc);
    }

    #[test]
    fn test_restore_skips_unresolvable_and_unknown_criteria() {
        let dump = RankingDump {
            id: "r".into(),
            columns: vec![
                ColumnDump {
                    id: "good".into(),
                    desc: desc_ref(&ColumnDesc::string("x")),
                    width: 100.0,
                    label: None,
                    description: None,
                    color: None,
                    renderer: None,
                    group_renderer: None,
                    summary_renderer: None,
                    filter: None,
                    sort_method: None,
                    group_thresholds: None,
                    children: vec![],
                },
                ColumnDump {
                    id: "bad".into(),
                    desc: json!({"bogus": true}),
                    width: 100.0,
                    label: None,
                    description: None,
                    color: None,
                    renderer: None,
                    group_renderer: None,
                    summary_renderer: None,
                    filter: None,
                    sort_method: None,
                    group_thresholds: None,
                    children: vec![],
                },
            ],
            sort_criteria: vec![CriterionDump { col: "bad".into(), asc: true }],
            group_criteria: vec!["good".into(), "bad".into()],
            group_sort_criteria: vec![],
        };

        let model = RankingModel::new();
        let rk = model.restore_ranking(&dump, &desc_resolver);
        let cols = model.ranking_columns(rk);
        assert_eq!(cols.len(), 1);
        assert_eq!(model.id(cols[0]).as_deref(), Some("good"));
        assert!(model.sort_criteria(rk).is_empty());
        assert_eq!(model.group_criteria(rk), vec![cols[0]]);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            RankingDump::from_json("{not json"),
            Err(RestoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_restore_tolerates_missing_optionals() {
        let json = r#"{"id":"r","columns":[{"id":"c","desc":{"kind":"string","column":"name"},"width":120.0}]}"#;
        let dump = RankingDump::from_json(json).unwrap();
        let model = RankingModel::new();
        let rk = model.restore_ranking(&dump, &desc_resolver);
        let col = model.ranking_columns(rk)[0];
        assert_eq!(model.width(col), Some(120.0));
        assert_eq!(model.label(col).as_deref(), Some("c"));
        assert!(model.sort_criteria(rk).is_empty());
    }
}
