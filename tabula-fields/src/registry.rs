//! Field kind registry and option validation.
//!
//! The registry is a static catalog: every `FieldKind` has a descriptor saying
//! whether it is virtual, how its values are stored, and which option keys it
//! understands. `validate_options` checks a kind's options and returns the
//! normalized form (trimmed choices, cleared meaningless keys).

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{FieldsError, Result};
use crate::types::{Cardinality, FieldKind, FieldOptions};

/// Largest decimal precision accepted for numeric kinds.
pub const MAX_PRECISION: u8 = 8;

/// How a kind's values are represented in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageHint {
    Text,
    Decimal,
    Boolean,
    Date,
    TextArray,
    /// Structured payload: attachments, link targets.
    Json,
    /// Virtual kinds have no stored column.
    None,
}

/// One option key a kind understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    pub key: &'static str,
    pub required: bool,
    pub description: &'static str,
}

const fn opt(key: &'static str, required: bool, description: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        required,
        description,
    }
}

const NO_OPTIONS: &[OptionSpec] = &[];
const NUMBER_OPTIONS: &[OptionSpec] = &[opt("precision", false, "decimal places")];
const PERCENT_OPTIONS: &[OptionSpec] = &[opt("precision", false, "decimal places")];
const CURRENCY_OPTIONS: &[OptionSpec] = &[
    opt("precision", false, "decimal places"),
    opt("currency_symbol", false, "symbol shown before the amount"),
];
const DATE_OPTIONS: &[OptionSpec] = &[opt("date_format", false, "display format")];
const SINGLE_SELECT_OPTIONS: &[OptionSpec] = &[opt("choices", true, "allowed values")];
const MULTI_SELECT_OPTIONS: &[OptionSpec] = &[
    opt("choices", true, "allowed values"),
    opt("max_selections", false, "upper bound on selected values"),
];
const FORMULA_OPTIONS: &[OptionSpec] = &[opt(
    "formula",
    true,
    "expression over sibling fields, references written as {Field Name}",
)];
const LINK_OPTIONS: &[OptionSpec] = &[
    opt("linked_table_id", true, "table whose records are linked"),
    opt("cardinality", false, "one_to_one, one_to_many or many_to_many"),
    opt("max_selections", false, "cap on linked records"),
];
const LOOKUP_OPTIONS: &[OptionSpec] = &[
    opt("lookup_field_id", true, "link field in this table"),
    opt("lookup_result_field_id", true, "field of the linked table to show"),
];

/// Static description of a field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindDescriptor {
    pub kind: FieldKind,
    pub is_virtual: bool,
    pub storage: StorageHint,
    pub option_schema: &'static [OptionSpec],
}

impl KindDescriptor {
    /// Option keys the kind cannot be saved without.
    pub fn required_options(&self) -> impl Iterator<Item = &'static str> {
        self.option_schema
            .iter()
            .filter(|o| o.required)
            .map(|o| o.key)
    }
}

impl FieldKind {
    /// The registry entry for this kind.
    pub fn descriptor(&self) -> KindDescriptor {
        let (storage, option_schema) = match self {
            FieldKind::Text => (StorageHint::Text, NO_OPTIONS),
            FieldKind::Number => (StorageHint::Decimal, NUMBER_OPTIONS),
            FieldKind::SingleSelect => (StorageHint::Text, SINGLE_SELECT_OPTIONS),
            FieldKind::MultiSelect => (StorageHint::TextArray, MULTI_SELECT_OPTIONS),
            FieldKind::Date => (StorageHint::Date, DATE_OPTIONS),
            FieldKind::Currency => (StorageHint::Decimal, CURRENCY_OPTIONS),
            FieldKind::Percent => (StorageHint::Decimal, PERCENT_OPTIONS),
            FieldKind::Checkbox => (StorageHint::Boolean, NO_OPTIONS),
            FieldKind::Attachment => (StorageHint::Json, NO_OPTIONS),
            FieldKind::Formula => (StorageHint::None, FORMULA_OPTIONS),
            FieldKind::Link => (StorageHint::Json, LINK_OPTIONS),
            FieldKind::Lookup => (StorageHint::None, LOOKUP_OPTIONS),
        };
        KindDescriptor {
            kind: *self,
            is_virtual: self.is_virtual(),
            storage,
            option_schema,
        }
    }
}

/// Look up a kind by name. Unknown names are an error, never a default.
pub fn describe_kind(name: &str) -> Result<KindDescriptor> {
    let kind: FieldKind = name.parse()?;
    Ok(kind.descriptor())
}

/// Validate `options` for `kind`, returning the normalized options.
///
/// Normalization trims choice entries and drops blank ones, and clears
/// `max_selections` on one-to-one links. Nothing else is rewritten.
pub fn validate_options(kind: FieldKind, options: &FieldOptions) -> Result<FieldOptions> {
    let mut normalized = options.clone();
    let field = kind.as_str();

    match kind {
        FieldKind::SingleSelect | FieldKind::MultiSelect => {
            normalized.choices = normalize_choices(field, &options.choices)?;
            if kind == FieldKind::MultiSelect && normalized.max_selections == Some(0) {
                return Err(FieldsError::validation(
                    field,
                    "max_selections must be at least 1",
                ));
            }
        }
        FieldKind::Link => {
            let target = options
                .linked_table_id
                .as_ref()
                .filter(|t| !t.as_str().trim().is_empty());
            if target.is_none() {
                return Err(FieldsError::validation(
                    field,
                    "a linked table is required",
                ));
            }
            let cardinality = options.cardinality.unwrap_or_default();
            if cardinality == Cardinality::OneToOne {
                normalized.max_selections = None;
            } else if normalized.max_selections == Some(0) {
                return Err(FieldsError::validation(
                    field,
                    "max_selections must be at least 1",
                ));
            }
        }
        FieldKind::Lookup => {
            if options.lookup_field_id.is_none() {
                return Err(FieldsError::validation(
                    field,
                    "a source link field is required",
                ));
            }
            if options.lookup_result_field_id.is_none() {
                return Err(FieldsError::validation(
                    field,
                    "a result field is required once a link field is chosen",
                ));
            }
        }
        FieldKind::Formula => {
            let blank = options
                .formula
                .as_deref()
                .map(|f| f.trim().is_empty())
                .unwrap_or(true);
            if blank {
                return Err(FieldsError::validation(field, "formula text is required"));
            }
        }
        FieldKind::Number | FieldKind::Currency | FieldKind::Percent => {
            if let Some(precision) = options.precision {
                if precision > MAX_PRECISION {
                    return Err(FieldsError::validation(
                        field,
                        format!("precision must be between 0 and {MAX_PRECISION}"),
                    ));
                }
            }
        }
        FieldKind::Text | FieldKind::Date | FieldKind::Checkbox | FieldKind::Attachment => {}
    }

    Ok(normalized)
}

fn normalize_choices(field: &str, choices: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(choices.len());
    for choice in choices {
        let trimmed = choice.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(FieldsError::validation(
                field,
                format!("duplicate choice '{trimmed}'"),
            ));
        }
        out.push(trimmed.to_string());
    }
    if out.is_empty() {
        return Err(FieldsError::validation(
            field,
            "at least one non-empty choice is required",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{FieldId, TableId};

    fn choices(values: &[&str]) -> FieldOptions {
        FieldOptions {
            choices: values.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn describe_known_kind() {
        let d = describe_kind("lookup").unwrap();
        assert!(d.is_virtual);
        assert_eq!(d.storage, StorageHint::None);
        let required: Vec<_> = d.required_options().collect();
        assert_eq!(required, vec!["lookup_field_id", "lookup_result_field_id"]);
    }

    #[test]
    fn describe_unknown_kind_fails() {
        assert!(matches!(
            describe_kind("barcode"),
            Err(FieldsError::UnknownKind { .. })
        ));
    }

    #[test]
    fn every_kind_has_a_descriptor() {
        for kind in FieldKind::ALL {
            let d = kind.descriptor();
            assert_eq!(d.kind, kind);
            assert_eq!(d.is_virtual, d.storage == StorageHint::None);
        }
    }

    #[test]
    fn blank_choices_are_invalid() {
        let err = validate_options(FieldKind::SingleSelect, &choices(&[" ", ""])).unwrap_err();
        assert!(matches!(err, FieldsError::Validation { .. }));
    }

    #[test]
    fn single_choice_is_valid() {
        let opts = validate_options(FieldKind::SingleSelect, &choices(&["A"])).unwrap();
        assert_eq!(opts.choices, vec!["A"]);
    }

    #[test]
    fn choices_are_trimmed_and_blank_entries_dropped() {
        let opts =
            validate_options(FieldKind::MultiSelect, &choices(&[" Red ", "", "Blue", "  "]))
                .unwrap();
        assert_eq!(opts.choices, vec!["Red", "Blue"]);
    }

    #[test]
    fn duplicate_choices_after_trim_are_invalid() {
        assert!(validate_options(FieldKind::SingleSelect, &choices(&["A", " A"])).is_err());
    }

    #[test]
    fn multi_select_rejects_zero_cap() {
        let mut opts = choices(&["A"]);
        opts.max_selections = Some(0);
        assert!(validate_options(FieldKind::MultiSelect, &opts).is_err());
    }

    #[test]
    fn link_requires_target_table() {
        assert!(validate_options(FieldKind::Link, &FieldOptions::default()).is_err());
        let blank = FieldOptions {
            linked_table_id: Some(TableId::from_string("  ")),
            ..Default::default()
        };
        assert!(validate_options(FieldKind::Link, &blank).is_err());
    }

    #[test]
    fn one_to_one_link_drops_selection_cap() {
        let opts = FieldOptions {
            linked_table_id: Some(TableId::from_string("customers")),
            cardinality: Some(Cardinality::OneToOne),
            max_selections: Some(3),
            ..Default::default()
        };
        let normalized = validate_options(FieldKind::Link, &opts).unwrap();
        assert_eq!(normalized.max_selections, None);
    }

    #[test]
    fn many_link_keeps_selection_cap() {
        let opts = FieldOptions {
            linked_table_id: Some(TableId::from_string("customers")),
            cardinality: Some(Cardinality::ManyToMany),
            max_selections: Some(3),
            ..Default::default()
        };
        let normalized = validate_options(FieldKind::Link, &opts).unwrap();
        assert_eq!(normalized.max_selections, Some(3));
    }

    #[test]
    fn lookup_needs_source_and_result() {
        assert!(validate_options(FieldKind::Lookup, &FieldOptions::default()).is_err());

        let source_only = FieldOptions {
            lookup_field_id: Some(FieldId::from_string("link")),
            ..Default::default()
        };
        let err = validate_options(FieldKind::Lookup, &source_only).unwrap_err();
        assert!(err.to_string().contains("result field"));

        let complete = FieldOptions {
            lookup_field_id: Some(FieldId::from_string("link")),
            lookup_result_field_id: Some(FieldId::from_string("email")),
            ..Default::default()
        };
        assert!(validate_options(FieldKind::Lookup, &complete).is_ok());
    }

    #[test]
    fn formula_needs_text() {
        assert!(validate_options(FieldKind::Formula, &FieldOptions::default()).is_err());
        let opts = FieldOptions {
            formula: Some("{Price} * {Quantity}".into()),
            ..Default::default()
        };
        assert!(validate_options(FieldKind::Formula, &opts).is_ok());
    }

    #[test]
    fn precision_is_bounded() {
        let opts = FieldOptions {
            precision: Some(MAX_PRECISION + 1),
            ..Default::default()
        };
        assert!(validate_options(FieldKind::Currency, &opts).is_err());
        assert!(validate_options(FieldKind::Text, &opts).is_ok());
    }
}
