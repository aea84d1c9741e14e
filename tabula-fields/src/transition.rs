//! Type transition policy.
//!
//! Decides whether a field may switch kinds and what the user should be told.
//! The checker only reports; callers block or proceed.

use serde::Serialize;

use crate::relationship::lookup_dependents;
use crate::types::{FieldDef, FieldKind};

/// Outcome of a kind change check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeChange {
    pub can_change: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl TypeChange {
    fn allowed() -> Self {
        Self {
            can_change: true,
            warning: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            can_change: true,
            warning: Some(message.into()),
        }
    }

    fn blocked(message: impl Into<String>) -> Self {
        Self {
            can_change: false,
            warning: Some(message.into()),
        }
    }
}

/// Kind-only policy; see `can_change_field_type` for dependency checks.
pub fn can_change_type(from: FieldKind, to: FieldKind) -> TypeChange {
    if from == to {
        return TypeChange::allowed();
    }

    match (from.is_virtual(), to.is_virtual()) {
        (true, true) => TypeChange::warn(format!(
            "values will be recomputed as {to} instead of {from}"
        )),
        (false, true) => TypeChange::warn(format!(
            "stored {from} values will be hidden while the field is a {to}"
        )),
        (true, false) => TypeChange::warn(format!(
            "the field will start empty; computed {from} values are not copied"
        )),
        (false, false) if from.is_simple() && to.is_simple() => TypeChange::warn(format!(
            "existing values will be reformatted from {from} to {to}"
        )),
        (false, false) => TypeChange::warn(format!(
            "values that cannot be converted from {from} to {to} will be cleared"
        )),
    }
}

/// Full check for an existing field, including fields that depend on it.
///
/// A link field that lookups read through cannot stop being a link.
pub fn can_change_field_type(field: &FieldDef, to: FieldKind, siblings: &[FieldDef]) -> TypeChange {
    if field.kind == FieldKind::Link && to != FieldKind::Link {
        let dependents = lookup_dependents(&field.id, siblings);
        if !dependents.is_empty() {
            let names: Vec<&str> = dependents.iter().map(|f| f.name.as_str()).collect();
            return TypeChange::blocked(format!(
                "'{}' is used by lookup field(s) {}; remove or repoint them first",
                field.name,
                names.join(", ")
            ));
        }
    }
    can_change_type(field.kind, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{FieldId, TableId};
    use crate::types::{FieldDraft, FieldOptions};

    fn def(name: &str, kind: FieldKind, options: FieldOptions) -> FieldDef {
        let draft = FieldDraft::new(name, kind).with_options(options);
        FieldDef::from_draft(FieldId::new(), TableId::from_string("orders"), draft, 0)
    }

    #[test]
    fn same_kind_is_silent() {
        assert_eq!(
            can_change_type(FieldKind::Text, FieldKind::Text),
            TypeChange::allowed()
        );
    }

    #[test]
    fn formula_to_lookup_warns_but_allows() {
        let change = can_change_type(FieldKind::Formula, FieldKind::Lookup);
        assert!(change.can_change);
        assert!(change.warning.is_some());
    }

    #[test]
    fn simple_kinds_warn_about_reformatting() {
        let change = can_change_type(FieldKind::Number, FieldKind::Currency);
        assert!(change.can_change);
        assert!(change.warning.unwrap().contains("reformatted"));
    }

    #[test]
    fn stored_to_virtual_warns_values_hidden() {
        let change = can_change_type(FieldKind::Text, FieldKind::Formula);
        assert!(change.can_change);
        assert!(change.warning.unwrap().contains("hidden"));
    }

    #[test]
    fn select_to_text_warns_about_clearing() {
        let change = can_change_type(FieldKind::MultiSelect, FieldKind::Checkbox);
        assert!(change.can_change);
        assert!(change.warning.unwrap().contains("cleared"));
    }

    #[test]
    fn link_with_dependent_lookup_is_blocked() {
        let link = def(
            "Customer",
            FieldKind::Link,
            FieldOptions {
                linked_table_id: Some(TableId::from_string("customers")),
                ..Default::default()
            },
        );
        let lookup = def(
            "Customer Email",
            FieldKind::Lookup,
            FieldOptions {
                lookup_field_id: Some(link.id.clone()),
                lookup_result_field_id: Some(FieldId::from_string("email")),
                ..Default::default()
            },
        );
        let siblings = vec![link.clone(), lookup];

        let change = can_change_field_type(&link, FieldKind::Text, &siblings);
        assert!(!change.can_change);
        assert!(change.warning.unwrap().contains("Customer Email"));

        // staying a link is fine
        assert!(can_change_field_type(&link, FieldKind::Link, &siblings).can_change);
    }

    #[test]
    fn link_without_dependents_may_change() {
        let link = def(
            "Customer",
            FieldKind::Link,
            FieldOptions {
                linked_table_id: Some(TableId::from_string("customers")),
                ..Default::default()
            },
        );
        let change = can_change_field_type(&link, FieldKind::Text, &[link.clone()]);
        assert!(change.can_change);
    }
}
