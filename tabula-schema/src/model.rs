//! Sections, table settings and the plain records that cross the
//! persistence boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tabula_fields::{FieldDef, FieldId, SectionId, TableId};

fn default_true() -> bool {
    true
}

/// A section stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDef {
    pub id: SectionId,
    pub table_id: TableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default)]
    pub default_collapsed: bool,
    #[serde(default = "default_true")]
    pub default_visible: bool,
    /// Role lists keyed by permission name, e.g. `edit: [admin]`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, Vec<String>>,
}

impl SectionDef {
    /// A fresh, unordered section.
    pub fn new(id: SectionId, table_id: TableId, name: impl Into<String>) -> Self {
        Self {
            id,
            table_id,
            name: name.into(),
            display_name: None,
            order_index: None,
            default_collapsed: false,
            default_visible: true,
            permissions: BTreeMap::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A section implied by field `group_name`s that has never been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSection {
    pub name: String,
}

/// A section as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Section {
    Persisted(SectionDef),
    Virtual(VirtualSection),
}

impl Section {
    pub fn name(&self) -> &str {
        match self {
            Section::Persisted(def) => &def.name,
            Section::Virtual(v) => &v.name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Section::Persisted(def) => def.display_name(),
            Section::Virtual(v) => &v.name,
        }
    }

    /// Storage id; virtual sections have none until materialized.
    pub fn id(&self) -> Option<&SectionId> {
        match self {
            Section::Persisted(def) => Some(&def.id),
            Section::Virtual(_) => None,
        }
    }

    pub fn order_index(&self) -> Option<i64> {
        match self {
            Section::Persisted(def) => def.order_index,
            Section::Virtual(_) => None,
        }
    }

    pub fn default_collapsed(&self) -> bool {
        match self {
            Section::Persisted(def) => def.default_collapsed,
            Section::Virtual(_) => false,
        }
    }

    pub fn default_visible(&self) -> bool {
        match self {
            Section::Persisted(def) => def.default_visible,
            Section::Virtual(_) => true,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Section::Virtual(_))
    }
}

/// Partial update of a section. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeMap<String, Vec<String>>>,
}

impl SectionPatch {
    /// A patch that only names the section; used to materialize it.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = Some(display_name);
        self
    }

    pub fn with_order_index(mut self, order_index: i64) -> Self {
        self.order_index = Some(order_index);
        self
    }

    pub fn collapsed(mut self, collapsed: bool) -> Self {
        self.default_collapsed = Some(collapsed);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.default_visible = Some(visible);
        self
    }

    pub fn apply(&self, def: &mut SectionDef) {
        if let Some(name) = &self.name {
            def.name = name.trim().to_string();
        }
        if let Some(display_name) = &self.display_name {
            def.display_name = display_name.clone();
        }
        if let Some(order_index) = self.order_index {
            def.order_index = Some(order_index);
        }
        if let Some(collapsed) = self.default_collapsed {
            def.default_collapsed = collapsed;
        }
        if let Some(visible) = self.default_visible {
            def.default_visible = visible;
        }
        if let Some(permissions) = &self.permissions {
            def.permissions = permissions.clone();
        }
    }

    /// Build a new section from a creation patch. The name is mandatory.
    pub fn into_new_section(&self, id: SectionId, table_id: TableId) -> Option<SectionDef> {
        let name = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        let mut def = SectionDef::new(id, table_id, name);
        self.apply(&mut def);
        Some(def)
    }
}

/// Which field identifies a record in headers and link pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "field_id", rename_all = "snake_case")]
pub enum PrimaryField {
    /// First eligible field in display order
    #[default]
    Auto,
    /// The record id itself
    Id,
    Field(FieldId),
}

/// Per-table settings stored alongside the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSettings {
    #[serde(default)]
    pub primary_field: PrimaryField,
}

/// The effective primary display after resolving `Auto` and stale choices.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryDisplay {
    Id,
    Field(FieldDef),
    /// `Auto` with no eligible field
    None,
}

/// A table known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub id: TableId,
    pub name: String,
}

/// One entry of a bulk order write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry<I> {
    pub id: I,
    pub order_index: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_yaml_defaults() {
        let yaml = "id: sec_1\ntable_id: orders\nname: Billing\n";
        let def: SectionDef = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(def.default_visible);
        assert!(!def.default_collapsed);
        assert_eq!(def.order_index, None);
        assert_eq!(def.display_name(), "Billing");
    }

    #[test]
    fn patch_requires_a_name_to_create() {
        let id = SectionId::new();
        let table = TableId::from_string("orders");
        assert!(SectionPatch::default()
            .into_new_section(id.clone(), table.clone())
            .is_none());
        assert!(SectionPatch::named("   ")
            .into_new_section(id.clone(), table.clone())
            .is_none());

        let def = SectionPatch::named(" Billing ")
            .collapsed(true)
            .with_order_index(2)
            .into_new_section(id, table)
            .unwrap();
        assert_eq!(def.name, "Billing");
        assert!(def.default_collapsed);
        assert_eq!(def.order_index, Some(2));
    }

    #[test]
    fn virtual_section_has_no_id() {
        let section = Section::Virtual(VirtualSection {
            name: "Shipping".into(),
        });
        assert!(section.is_virtual());
        assert!(section.id().is_none());
        assert!(section.default_visible());
        assert_eq!(section.display_name(), "Shipping");
    }

    #[test]
    fn primary_field_round_trips_through_yaml() {
        let settings = TableSettings {
            primary_field: PrimaryField::Field(FieldId::from_string("fld_name")),
        };
        let yaml = serde_yaml_ng::to_string(&settings).unwrap();
        let back: TableSettings = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, settings);

        let empty: TableSettings = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(empty.primary_field, PrimaryField::Auto);
    }
}
