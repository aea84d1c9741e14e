//! Field kind registry and relationship rules
//!
//! `tabula-fields` is the pure, stateless half of the schema engine. It knows
//! what kinds of columns exist, which options each kind needs, which kind
//! changes are safe, and how link/lookup/formula fields relate to their
//! siblings. It never touches storage; `tabula-schema` owns state.
//!
//! # Architecture
//!
//! - **Closed kind set**: `FieldKind` is an enum and every rule is an exhaustive `match`
//! - **Options as data**: each kind publishes its option schema through `KindDescriptor`
//! - **Structural relationships**: formula and lookup rules are enforced by filtering
//!   candidate fields, not by evaluating anything

pub mod error;
pub mod ids;
pub mod registry;
pub mod relationship;
pub mod transition;
pub mod types;

pub use error::{FieldsError, Result};
pub use ids::{FieldId, SectionId, TableId};
pub use registry::{describe_kind, validate_options, KindDescriptor, OptionSpec, StorageHint};
pub use relationship::{
    candidate_result_fields, formula_dependents, formula_eligible_siblings, formula_references,
    lookup_dependents, lookup_target, resolve_link_target, set_lookup_source, validate_formula,
    validate_lookup,
};
pub use transition::{can_change_field_type, can_change_type, TypeChange};
pub use types::{
    ordered_fields, sort_fields, Cardinality, FieldDef, FieldDraft, FieldKind, FieldOptions,
    FieldPatch,
};
