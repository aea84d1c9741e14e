//! Core field types.
//!
//! All types serialize to/from YAML and JSON via serde. A `FieldDef` is one
//! column of a user-defined table; `FieldOptions` is the kind-specific bag of
//! settings attached to it.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldsError, Result};
use crate::ids::{FieldId, TableId};

/// The kind of a field. Determines storage, options and editing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    SingleSelect,
    MultiSelect,
    Date,
    Currency,
    Percent,
    Checkbox,
    Attachment,
    /// Computed from sibling fields; stores nothing.
    Formula,
    /// Points at records of another table.
    Link,
    /// Shows a value reached through a link field; stores nothing.
    Lookup,
}

impl FieldKind {
    /// Every kind, in picker order.
    pub const ALL: [FieldKind; 12] = [
        FieldKind::Text,
        FieldKind::Number,
        FieldKind::SingleSelect,
        FieldKind::MultiSelect,
        FieldKind::Date,
        FieldKind::Currency,
        FieldKind::Percent,
        FieldKind::Checkbox,
        FieldKind::Attachment,
        FieldKind::Formula,
        FieldKind::Link,
        FieldKind::Lookup,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::SingleSelect => "single_select",
            FieldKind::MultiSelect => "multi_select",
            FieldKind::Date => "date",
            FieldKind::Currency => "currency",
            FieldKind::Percent => "percent",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Attachment => "attachment",
            FieldKind::Formula => "formula",
            FieldKind::Link => "link",
            FieldKind::Lookup => "lookup",
        }
    }

    /// Virtual kinds compute their value and never store one.
    pub fn is_virtual(&self) -> bool {
        matches!(self, FieldKind::Formula | FieldKind::Lookup)
    }

    /// Scalar stored kinds whose values convert between each other.
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            FieldKind::Text
                | FieldKind::Number
                | FieldKind::Date
                | FieldKind::Checkbox
                | FieldKind::Currency
                | FieldKind::Percent
        )
    }

    /// Kinds whose options carry a choice list.
    pub fn is_select(&self) -> bool {
        matches!(self, FieldKind::SingleSelect | FieldKind::MultiSelect)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        FieldKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| FieldsError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// How many records a link field may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    #[default]
    OneToMany,
    ManyToMany,
}

/// Kind-specific settings of a field.
///
/// Every key is optional so partially configured drafts and legacy records
/// deserialize; `validate_options` decides what a kind actually requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    /// Source link field of a lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_field_id: Option<FieldId>,
    /// Copied from the source link field; never set directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_target_table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_result_field_id: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

/// A field definition: one column of a user-defined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub table_id: TableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Built-in columns such as creation timestamps.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    /// Legacy ordering key, read only when `order_index` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default)]
    pub options: FieldOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl FieldDef {
    /// Build a field from a draft at the given order index.
    pub fn from_draft(id: FieldId, table_id: TableId, draft: FieldDraft, order_index: i64) -> Self {
        let mut def = Self {
            id,
            table_id,
            name: draft.name.trim().to_string(),
            label: draft.label,
            kind: draft.kind,
            required: draft.required,
            system: draft.system,
            group_name: draft.group_name,
            order_index: Some(order_index),
            position: None,
            options: draft.options,
            default_value: draft.default_value,
        };
        def.normalize();
        def
    }

    /// Display label, falling back to the name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Sort key: `order_index`, else legacy `position`, else the raw list index.
    pub fn sort_key(&self, raw_index: usize) -> i64 {
        self.order_index
            .or(self.position)
            .unwrap_or(raw_index as i64)
    }

    /// Enforce kind-level invariants that are not options.
    pub fn normalize(&mut self) {
        if self.kind.is_virtual() {
            self.required = false;
        }
        if let Some(group) = &self.group_name {
            if group.trim().is_empty() {
                self.group_name = None;
            }
        }
    }
}

/// Fields paired with their effective sort key, in display order.
///
/// `order_index` wins, then `position`, then the raw list index; ties break by
/// case-insensitive name. The sort is stable.
pub fn ordered_fields(fields: &[FieldDef]) -> Vec<(i64, &FieldDef)> {
    let mut keyed: Vec<(i64, String, &FieldDef)> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.sort_key(i), f.name.to_lowercase(), f))
        .collect();
    keyed.sort_by(|a, b| match a.0.cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    keyed.into_iter().map(|(key, _, f)| (key, f)).collect()
}

/// Sort fields by the ordering invariant; see [`ordered_fields`].
pub fn sort_fields(fields: &[FieldDef]) -> Vec<FieldDef> {
    ordered_fields(fields)
        .into_iter()
        .map(|(_, f)| f.clone())
        .collect()
}

/// Input for creating a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDraft {
    pub name: String,
    pub label: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub system: bool,
    pub group_name: Option<String>,
    pub options: FieldOptions,
    pub default_value: Option<Value>,
}

impl FieldDraft {
    /// Create a draft with default options
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: false,
            system: false,
            group_name: None,
            options: FieldOptions::default(),
            default_value: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group_name = Some(group.into());
        self
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A partial update to a field. `None` leaves the attribute untouched; the
/// nested `Option`s distinguish "clear" (`Some(None)`) from "keep".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub label: Option<Option<String>>,
    pub kind: Option<FieldKind>,
    pub required: Option<bool>,
    pub system: Option<bool>,
    pub group_name: Option<Option<String>>,
    pub order_index: Option<i64>,
    pub options: Option<FieldOptions>,
    pub default_value: Option<Option<Value>>,
}

impl FieldPatch {
    /// A patch that recreates `def` in full; used to create fields at the boundary.
    pub fn from_def(def: &FieldDef) -> Self {
        Self {
            name: Some(def.name.clone()),
            label: Some(def.label.clone()),
            kind: Some(def.kind),
            required: Some(def.required),
            system: Some(def.system),
            group_name: Some(def.group_name.clone()),
            order_index: def.order_index,
            options: Some(def.options.clone()),
            default_value: Some(def.default_value.clone()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group_name = Some(group);
        self
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_order_index(mut self, order_index: i64) -> Self {
        self.order_index = Some(order_index);
        self
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch in place and re-normalize.
    pub fn apply(&self, def: &mut FieldDef) {
        if let Some(name) = &self.name {
            def.name = name.trim().to_string();
        }
        if let Some(label) = &self.label {
            def.label = label.clone();
        }
        if let Some(kind) = self.kind {
            def.kind = kind;
        }
        if let Some(required) = self.required {
            def.required = required;
        }
        if let Some(system) = self.system {
            def.system = system;
        }
        if let Some(group) = &self.group_name {
            def.group_name = group.clone();
        }
        if let Some(order_index) = self.order_index {
            def.order_index = Some(order_index);
        }
        if let Some(options) = &self.options {
            def.options = options.clone();
        }
        if let Some(default_value) = &self.default_value {
            def.default_value = default_value.clone();
        }
        def.normalize();
    }

    /// Turn a creation patch into a new field. Name and kind are mandatory.
    pub fn into_new_field(self, id: FieldId, table_id: TableId) -> Result<FieldDef> {
        let name = self
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| FieldsError::validation("name", "field name is required"))?;
        let kind = self
            .kind
            .ok_or_else(|| FieldsError::validation(&name, "field kind is required"))?;
        let mut def = FieldDef::from_draft(id, table_id, FieldDraft::new(name, kind), 0);
        def.order_index = None;
        self.apply(&mut def);
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, order_index: Option<i64>, position: Option<i64>) -> FieldDef {
        FieldDef {
            id: FieldId::new(),
            table_id: TableId::from_string("orders"),
            name: name.to_string(),
            label: None,
            kind: FieldKind::Text,
            required: false,
            system: false,
            group_name: None,
            order_index,
            position,
            options: FieldOptions::default(),
            default_value: None,
        }
    }

    fn names(fields: &[FieldDef]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn kind_parses_snake_and_kebab_case() {
        assert_eq!(
            "single_select".parse::<FieldKind>().unwrap(),
            FieldKind::SingleSelect
        );
        assert_eq!(
            "multi-select".parse::<FieldKind>().unwrap(),
            FieldKind::MultiSelect
        );
        assert_eq!(" Link ".parse::<FieldKind>().unwrap(), FieldKind::Link);
    }

    #[test]
    fn unknown_kind_never_defaults() {
        let err = "rollup".parse::<FieldKind>().unwrap_err();
        assert_eq!(
            err,
            FieldsError::UnknownKind {
                kind: "rollup".into()
            }
        );
    }

    #[test]
    fn virtual_kinds() {
        let virtual_kinds: Vec<_> = FieldKind::ALL
            .iter()
            .filter(|k| k.is_virtual())
            .collect();
        assert_eq!(virtual_kinds, vec![&FieldKind::Formula, &FieldKind::Lookup]);
        assert!(FieldKind::Currency.is_simple());
        assert!(!FieldKind::Attachment.is_simple());
    }

    #[test]
    fn sort_prefers_order_index_then_position_then_raw_index() {
        let fields = vec![
            field("raw", None, None),
            field("legacy", None, Some(0)),
            field("indexed", Some(1), Some(99)),
        ];
        // raw sorts by its list index 0, tied with legacy position 0 -> name breaks tie
        assert_eq!(names(&sort_fields(&fields)), vec!["legacy", "raw", "indexed"]);
    }

    #[test]
    fn sort_breaks_ties_case_insensitively() {
        let fields = vec![
            field("beta", Some(0), None),
            field("Alpha", Some(0), None),
            field("gamma", Some(0), None),
        ];
        assert_eq!(names(&sort_fields(&fields)), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn sort_tolerates_gaps() {
        let fields = vec![field("c", Some(40), None), field("a", Some(3), None)];
        assert_eq!(names(&sort_fields(&fields)), vec!["a", "c"]);
    }

    #[test]
    fn virtual_fields_are_never_required() {
        let draft = FieldDraft::new("Total", FieldKind::Formula).required();
        let def = FieldDef::from_draft(FieldId::new(), TableId::new(), draft, 0);
        assert!(!def.required);
    }

    #[test]
    fn blank_group_means_default_section() {
        let draft = FieldDraft::new("Notes", FieldKind::Text).with_group("  ");
        let def = FieldDef::from_draft(FieldId::new(), TableId::new(), draft, 0);
        assert_eq!(def.group_name, None);
    }

    #[test]
    fn patch_clears_group() {
        let mut def = field("Notes", Some(0), None);
        def.group_name = Some("Billing".into());
        FieldPatch::default().with_group(None).apply(&mut def);
        assert_eq!(def.group_name, None);
    }

    #[test]
    fn creation_patch_requires_name() {
        let err = FieldPatch::default()
            .with_kind(FieldKind::Text)
            .into_new_field(FieldId::new(), TableId::new())
            .unwrap_err();
        assert!(matches!(err, FieldsError::Validation { .. }));
    }

    #[test]
    fn creation_patch_round_trips_def() {
        let mut def = field("Amount", Some(3), None);
        def.kind = FieldKind::Currency;
        def.options.currency_symbol = Some("€".into());
        let rebuilt = FieldPatch::from_def(&def)
            .into_new_field(def.id.clone(), def.table_id.clone())
            .unwrap();
        assert_eq!(rebuilt, def);
    }

    #[test]
    fn legacy_yaml_without_order_index_loads() {
        let yaml = r#"
id: fld_1
table_id: orders
name: Customer
kind: link
position: 4
options:
  linked_table_id: customers
  cardinality: many_to_many
"#;
        let def: FieldDef = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(def.order_index, None);
        assert_eq!(def.sort_key(0), 4);
        assert_eq!(def.options.cardinality, Some(Cardinality::ManyToMany));
        assert_eq!(
            def.options.linked_table_id,
            Some(TableId::from_string("customers"))
        );
    }
}
