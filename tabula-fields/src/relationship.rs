//! Relationship resolution for link, lookup and formula fields.
//!
//! Lookups read through a link field of the same table into the linked table.
//! Formulas may reference any sibling that is not itself a formula. Both rules
//! are structural: candidate lists are filtered so that cycles and chains
//! cannot be expressed, rather than detected after the fact.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FieldsError, Result};
use crate::ids::{FieldId, TableId};
use crate::types::{FieldDef, FieldKind};

static FORMULA_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("formula reference pattern"));

/// Target table of a link field, if it is one and has a target.
pub fn resolve_link_target(field: &FieldDef) -> Option<&TableId> {
    if field.kind != FieldKind::Link {
        return None;
    }
    field
        .options
        .linked_table_id
        .as_ref()
        .filter(|t| !t.as_str().trim().is_empty())
}

/// Target table a lookup reaches through its source link field.
pub fn lookup_target(lookup: &FieldDef, siblings: &[FieldDef]) -> Option<TableId> {
    let source = lookup.options.lookup_field_id.as_ref()?;
    siblings
        .iter()
        .find(|f| &f.id == source)
        .and_then(resolve_link_target)
        .cloned()
}

/// Fields of the lookup's target table that may be shown as its result.
///
/// Lookups are excluded: a lookup of a lookup is never offered.
pub fn candidate_result_fields<'a>(
    lookup: &FieldDef,
    target_fields: &'a [FieldDef],
) -> Vec<&'a FieldDef> {
    let Some(target) = lookup.options.lookup_target_table_id.as_ref() else {
        return Vec::new();
    };
    target_fields
        .iter()
        .filter(|f| &f.table_id == target && f.kind != FieldKind::Lookup)
        .collect()
}

/// Siblings a formula may reference: everything but formulas and itself.
pub fn formula_eligible_siblings<'a>(
    all: &'a [FieldDef],
    excluding: &FieldId,
) -> Vec<&'a FieldDef> {
    all.iter()
        .filter(|f| &f.id != excluding && f.kind != FieldKind::Formula)
        .collect()
}

/// Lookup fields that read through `field_id`.
pub fn lookup_dependents<'a>(field_id: &FieldId, fields: &'a [FieldDef]) -> Vec<&'a FieldDef> {
    fields
        .iter()
        .filter(|f| {
            f.kind == FieldKind::Lookup && f.options.lookup_field_id.as_ref() == Some(field_id)
        })
        .collect()
}

/// Point a lookup at a new source link field.
///
/// The derived target table is copied from the link. Picking a different link
/// resets the result field since the candidate set changed.
pub fn set_lookup_source(lookup: &mut FieldDef, link: &FieldDef) -> Result<()> {
    if link.kind != FieldKind::Link {
        return Err(FieldsError::validation(
            &lookup.name,
            format!("'{}' is not a link field", link.name),
        ));
    }
    if link.table_id != lookup.table_id {
        return Err(FieldsError::validation(
            &lookup.name,
            format!("'{}' belongs to another table", link.name),
        ));
    }
    let target = resolve_link_target(link).cloned().ok_or_else(|| {
        FieldsError::validation(&lookup.name, format!("'{}' has no linked table", link.name))
    })?;

    if lookup.options.lookup_field_id.as_ref() != Some(&link.id) {
        lookup.options.lookup_result_field_id = None;
    }
    lookup.options.lookup_field_id = Some(link.id.clone());
    lookup.options.lookup_target_table_id = Some(target);
    Ok(())
}

/// Check a lookup against its table and the linked table, returning the
/// derived target table id.
pub fn validate_lookup(
    lookup: &FieldDef,
    siblings: &[FieldDef],
    target_fields: &[FieldDef],
) -> Result<TableId> {
    let name = lookup.name.as_str();
    let source_id = lookup
        .options
        .lookup_field_id
        .as_ref()
        .ok_or_else(|| FieldsError::validation(name, "a source link field is required"))?;

    let source = siblings
        .iter()
        .find(|f| &f.id == source_id)
        .ok_or_else(|| {
            FieldsError::validation(name, format!("source link field {source_id} does not exist"))
        })?;
    if source.kind != FieldKind::Link || source.table_id != lookup.table_id {
        return Err(FieldsError::validation(
            name,
            format!("'{}' is not a link field of this table", source.name),
        ));
    }
    let target = resolve_link_target(source).cloned().ok_or_else(|| {
        FieldsError::validation(name, format!("'{}' has no linked table", source.name))
    })?;

    let result_id = lookup.options.lookup_result_field_id.as_ref().ok_or_else(|| {
        FieldsError::validation(name, "a result field is required once a link field is chosen")
    })?;
    let result = target_fields
        .iter()
        .find(|f| &f.id == result_id)
        .ok_or_else(|| {
            FieldsError::validation(
                name,
                format!("result field {result_id} is not a field of table {target}"),
            )
        })?;
    if result.table_id != target {
        return Err(FieldsError::validation(
            name,
            format!("result field '{}' is not a field of table {target}", result.name),
        ));
    }
    if result.kind == FieldKind::Lookup {
        return Err(FieldsError::validation(
            name,
            format!("'{}' is itself a lookup; lookups cannot be chained", result.name),
        ));
    }

    Ok(target)
}

/// Field names referenced as `{Name}` in formula text, first occurrence order.
pub fn formula_references(formula: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for cap in FORMULA_REF.captures_iter(formula) {
        let name = cap[1].trim().to_string();
        if !name.is_empty() && !refs.contains(&name) {
            refs.push(name);
        }
    }
    refs
}

/// Check that every reference of a formula field names an eligible sibling.
pub fn validate_formula(formula: &FieldDef, siblings: &[FieldDef]) -> Result<()> {
    let text = formula.options.formula.as_deref().unwrap_or_default();
    for reference in formula_references(text) {
        if reference.eq_ignore_ascii_case(&formula.name) {
            return Err(FieldsError::validation(
                &formula.name,
                "a formula cannot reference itself",
            ));
        }
        let target = siblings
            .iter()
            .find(|f| f.id != formula.id && f.name.eq_ignore_ascii_case(&reference))
            .ok_or_else(|| {
                FieldsError::validation(
                    &formula.name,
                    format!("formula references unknown field '{reference}'"),
                )
            })?;
        if target.kind == FieldKind::Formula {
            return Err(FieldsError::validation(
                &formula.name,
                format!("formula cannot reference another formula ('{}')", target.name),
            ));
        }
    }
    Ok(())
}

/// Formula fields whose text references `field` by name.
pub fn formula_dependents<'a>(field: &FieldDef, fields: &'a [FieldDef]) -> Vec<&'a FieldDef> {
    fields
        .iter()
        .filter(|f| f.kind == FieldKind::Formula && f.id != field.id)
        .filter(|f| {
            formula_references(f.options.formula.as_deref().unwrap_or_default())
                .iter()
                .any(|r| r.eq_ignore_ascii_case(&field.name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDraft, FieldOptions};

    fn def(table: &str, name: &str, kind: FieldKind, options: FieldOptions) -> FieldDef {
        let draft = FieldDraft::new(name, kind).with_options(options);
        FieldDef::from_draft(FieldId::new(), TableId::from_string(table), draft, 0)
    }

    fn link(table: &str, name: &str, target: &str) -> FieldDef {
        def(
            table,
            name,
            FieldKind::Link,
            FieldOptions {
                linked_table_id: Some(TableId::from_string(target)),
                ..Default::default()
            },
        )
    }

    fn formula(table: &str, name: &str, text: &str) -> FieldDef {
        def(
            table,
            name,
            FieldKind::Formula,
            FieldOptions {
                formula: Some(text.into()),
                ..Default::default()
            },
        )
    }

    fn plain(table: &str, name: &str, kind: FieldKind) -> FieldDef {
        def(table, name, kind, FieldOptions::default())
    }

    #[test]
    fn link_target_only_for_links() {
        let l = link("orders", "Customer", "customers");
        assert_eq!(
            resolve_link_target(&l),
            Some(&TableId::from_string("customers"))
        );
        assert_eq!(resolve_link_target(&plain("orders", "Note", FieldKind::Text)), None);
    }

    #[test]
    fn set_source_copies_target_and_resets_result() {
        let customer = link("orders", "Customer", "customers");
        let vendor = link("orders", "Vendor", "vendors");
        let mut lookup = plain("orders", "Who", FieldKind::Lookup);

        set_lookup_source(&mut lookup, &customer).unwrap();
        lookup.options.lookup_result_field_id = Some(FieldId::from_string("email"));

        // re-selecting the same link keeps the result
        set_lookup_source(&mut lookup, &customer).unwrap();
        assert!(lookup.options.lookup_result_field_id.is_some());

        set_lookup_source(&mut lookup, &vendor).unwrap();
        assert_eq!(lookup.options.lookup_result_field_id, None);
        assert_eq!(
            lookup.options.lookup_target_table_id,
            Some(TableId::from_string("vendors"))
        );
    }

    #[test]
    fn set_source_rejects_non_link() {
        let text = plain("orders", "Note", FieldKind::Text);
        let mut lookup = plain("orders", "Who", FieldKind::Lookup);
        assert!(set_lookup_source(&mut lookup, &text).is_err());
    }

    #[test]
    fn candidates_exclude_lookups_and_other_tables() {
        let customer = link("orders", "Customer", "customers");
        let mut lookup = plain("orders", "Who", FieldKind::Lookup);
        set_lookup_source(&mut lookup, &customer).unwrap();

        let target_fields = vec![
            plain("customers", "Email", FieldKind::Text),
            plain("customers", "Nested", FieldKind::Lookup),
            formula("customers", "Label", "{Email}"),
            plain("vendors", "Phone", FieldKind::Text),
        ];
        let names: Vec<_> = candidate_result_fields(&lookup, &target_fields)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Email", "Label"]);
    }

    #[test]
    fn formula_siblings_exclude_formulas_and_self() {
        let total = formula("orders", "Total", "{Price}");
        let fields = vec![
            plain("orders", "Price", FieldKind::Number),
            total.clone(),
            formula("orders", "Tax", "{Price} * 0.2"),
            plain("orders", "Paid", FieldKind::Checkbox),
        ];
        let names: Vec<_> = formula_eligible_siblings(&fields, &total.id)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Price", "Paid"]);
    }

    #[test]
    fn references_are_extracted_once_in_order() {
        assert_eq!(
            formula_references("{Price} * { Quantity } + {Price} - {}"),
            vec!["Price", "Quantity"]
        );
    }

    #[test]
    fn formula_validation() {
        let price = plain("orders", "Price", FieldKind::Number);
        let tax = formula("orders", "Tax", "{Price} * 0.2");
        let siblings = vec![price, tax];

        assert!(validate_formula(&formula("orders", "Total", "{Price} + 1"), &siblings).is_ok());
        assert!(validate_formula(&formula("orders", "Total", "{Tax} + 1"), &siblings).is_err());
        assert!(validate_formula(&formula("orders", "Total", "{Total}"), &siblings).is_err());
        assert!(validate_formula(&formula("orders", "Total", "{Missing}"), &siblings).is_err());
    }

    #[test]
    fn formula_dependents_by_name() {
        let price = plain("orders", "Price", FieldKind::Number);
        let fields = vec![
            price.clone(),
            formula("orders", "Total", "{price} * 2"),
            formula("orders", "Other", "1"),
        ];
        let deps: Vec<_> = formula_dependents(&price, &fields)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(deps, vec!["Total"]);
    }

    #[test]
    fn validate_lookup_checks_result_table() {
        let customer = link("orders", "Customer", "customers");
        let email = plain("customers", "Email", FieldKind::Text);
        let phone = plain("vendors", "Phone", FieldKind::Text);

        let mut lookup = plain("orders", "Who", FieldKind::Lookup);
        set_lookup_source(&mut lookup, &customer).unwrap();
        let siblings = vec![customer.clone(), lookup.clone()];

        lookup.options.lookup_result_field_id = Some(email.id.clone());
        let target = validate_lookup(&lookup, &siblings, &[email.clone(), phone.clone()]).unwrap();
        assert_eq!(target, TableId::from_string("customers"));

        lookup.options.lookup_result_field_id = Some(phone.id.clone());
        assert!(validate_lookup(&lookup, &siblings, &[email, phone]).is_err());
    }

    #[test]
    fn validate_lookup_flags_missing_source() {
        let mut lookup = plain("orders", "Who", FieldKind::Lookup);
        lookup.options.lookup_field_id = Some(FieldId::from_string("deleted"));
        lookup.options.lookup_result_field_id = Some(FieldId::from_string("email"));
        let err = validate_lookup(&lookup, &[], &[]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
