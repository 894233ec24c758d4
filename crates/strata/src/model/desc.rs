//! Column descriptions.
//!
//! A [`ColumnDesc`] is the immutable, externally supplied description a
//! column is created from: its kind, the row field it reads, and optional
//! presentation defaults. The model never mutates a description; mutable
//! state (width, metadata, renderer tags, filters) lives on the column and
//! is serialized separately by the dump codec when it differs from the
//! description-derived defaults.

use serde::{Deserialize, Serialize};

/// Default color for columns without an explicit one.
pub const DEFAULT_COLOR: &str = "#C1C1C1";

/// Width assigned to columns whose description carries none.
pub const DEFAULT_WIDTH: f64 = 100.0;

/// The kind of a column, selecting its value/compare/group/filter behavior
/// and its default renderer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Free-text leaf column.
    String,
    /// Numeric leaf column.
    Number,
    /// Leaf column over a fixed category set.
    Categorical,
    /// Composite showing its children side by side.
    Nested,
    /// Composite combining its children into a width-weighted sum.
    Stack,
}

impl ColumnKind {
    /// The renderer-selection tag this kind defaults to.
    pub fn tag(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Categorical => "categorical",
            Self::Nested => "nested",
            Self::Stack => "stack",
        }
    }

    /// Whether columns of this kind own child columns.
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Nested | Self::Stack)
    }
}

/// Mutable presentation metadata of a column.
///
/// Defaults are derived from the description at construction time: the label
/// falls back to the column id, the color to [`DEFAULT_COLOR`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetaData {
    /// Header label.
    pub label: String,
    /// Longer description shown in header tooltips.
    pub description: String,
    /// Column color, used by cell renderers.
    pub color: String,
}

/// Immutable description a column is created from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDesc {
    /// Column kind (type tag).
    pub kind: ColumnKind,
    /// Row field this column reads. Composites leave this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Default header label; falls back to the column id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Default long description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Default color; falls back to [`DEFAULT_COLOR`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Fixed initial width; falls back to [`DEFAULT_WIDTH`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Frozen columns cannot be removed from their parent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub frozen: bool,
    /// Fixed renderer tag overriding the kind default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    /// Fixed group renderer tag overriding the kind default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_renderer: Option<String>,
    /// Fixed summary renderer tag overriding the kind default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_renderer: Option<String>,
    /// Category set, in display/compare order. Categorical columns only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Initial grouping thresholds. Number columns only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_thresholds: Vec<f64>,
}

impl ColumnDesc {
    fn of_kind(kind: ColumnKind, column: Option<&str>) -> Self {
        Self {
            kind,
            column: column.map(str::to_string),
            label: None,
            description: String::new(),
            color: None,
            width: None,
            frozen: false,
            renderer: None,
            group_renderer: None,
            summary_renderer: None,
            categories: Vec::new(),
            group_thresholds: Vec::new(),
        }
    }

    /// A string column reading the given row field.
    pub fn string(column: &str) -> Self {
        Self::of_kind(ColumnKind::String, Some(column))
    }

    /// A number column reading the given row field.
    pub fn number(column: &str) -> Self {
        Self::of_kind(ColumnKind::Number, Some(column))
    }

    /// A categorical column reading the given row field.
    pub fn categorical(column: &str, categories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut desc = Self::of_kind(ColumnKind::Categorical, Some(column));
        desc.categories = categories.into_iter().map(Into::into).collect();
        desc
    }

    /// A nested composite column.
    pub fn nested() -> Self {
        Self::of_kind(ColumnKind::Nested, None)
    }

    /// A stacked composite column.
    pub fn stack() -> Self {
        Self::of_kind(ColumnKind::Stack, None)
    }

    /// Sets the default label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the default long description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the default color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Sets the initial width.
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    /// Marks the column as not removable.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Sets a fixed renderer tag.
    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = Some(renderer.into());
        self
    }

    /// Sets the initial grouping thresholds (number columns).
    pub fn with_group_thresholds(mut self, thresholds: impl IntoIterator<Item = f64>) -> Self {
        self.group_thresholds = thresholds.into_iter().collect();
        self
    }

    /// The initial width derived from this description.
    pub fn default_width(&self) -> f64 {
        match self.width {
            Some(w) if w >= 0.0 => w,
            _ => DEFAULT_WIDTH,
        }
    }

    /// The initial metadata derived from this description and the column id.
    pub fn default_metadata(&self, id: &str) -> ColumnMetaData {
        ColumnMetaData {
            label: self.label.clone().unwrap_or_else(|| id.to_string()),
            description: self.description.clone(),
            color: self.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        }
    }

    /// Initial renderer tag: the description override or the kind tag.
    pub fn default_renderer(&self) -> String {
        self.renderer.clone().unwrap_or_else(|| self.kind.tag().to_string())
    }

    /// Initial group renderer tag.
    pub fn default_group_renderer(&self) -> String {
        self.group_renderer
            .clone()
            .unwrap_or_else(|| self.kind.tag().to_string())
    }

    /// Initial summary renderer tag.
    pub fn default_summary_renderer(&self) -> String {
        self.summary_renderer
            .clone()
            .unwrap_or_else(|| self.kind.tag().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_defaults() {
        let desc = ColumnDesc::number("age");
        assert_eq!(desc.default_width(), DEFAULT_WIDTH);
        assert_eq!(desc.default_renderer(), "number");

        let meta = desc.default_metadata("col1");
        assert_eq!(meta.label, "col1");
        assert_eq!(meta.color, DEFAULT_COLOR);

        let desc = ColumnDesc::string("name")
            .with_label("Name")
            .with_color("#123456")
            .with_width(80.0);
        assert_eq!(desc.default_width(), 80.0);
        let meta = desc.default_metadata("col2");
        assert_eq!(meta.label, "Name");
        assert_eq!(meta.color, "#123456");
    }

    #[test]
    fn test_negative_desc_width_falls_back() {
        let desc = ColumnDesc::string("name").with_width(-5.0);
        assert_eq!(desc.default_width(), DEFAULT_WIDTH);
    }

    #[test]
    fn test_desc_serialization_skips_defaults() {
        let desc = ColumnDesc::string("name");
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["kind"], "string");
        assert_eq!(json["column"], "name");
        assert!(json.get("label").is_none());
        assert!(json.get("frozen").is_none());
        assert!(json.get("categories").is_none());
    }
}
