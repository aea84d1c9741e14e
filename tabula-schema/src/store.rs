//! The per-table field schema store.
//!
//! Owns the authoritative in-memory copy of one table's fields, sections and
//! settings. Every mutation validates first and fails closed; then it writes
//! through the backend. Reorders are applied locally before the write. When
//! the backend rejects a write, the store refetches and replaces its state
//! and returns the original error.

use std::sync::Arc;

use tabula_fields::{
    can_change_field_type, candidate_result_fields, formula_dependents, formula_eligible_siblings,
    lookup_dependents, lookup_target, ordered_fields, resolve_link_target, set_lookup_source,
    sort_fields, validate_formula, validate_lookup, validate_options, FieldDef, FieldDraft,
    FieldId, FieldKind, FieldPatch, TableId, TypeChange,
};
use tabula_order::{
    append_index, densify, plan_move, Anchor, MoveIntent, OrderedItem, ReorderPlan,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{SchemaBackend, TableCatalog};
use crate::config::{SchemaConfig, DEFAULT_SECTION};
use crate::error::{Result, SchemaError};
use crate::model::{OrderEntry, PrimaryDisplay, PrimaryField, SectionDef, TableSettings};
use crate::sections::normalize_group;

/// A lookup that fails validation against the current schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidLookup {
    pub field: FieldDef,
    pub reason: String,
}

/// Builder for [`FieldSchemaStore`]. Created by [`FieldSchemaStore::open`].
pub struct SchemaStoreBuilder {
    table_id: TableId,
    backend: Arc<dyn SchemaBackend>,
    catalog: Arc<dyn TableCatalog>,
    default_section: String,
}

impl SchemaStoreBuilder {
    /// Resolve link and lookup targets through a different catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn TableCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_config(mut self, config: &SchemaConfig) -> Self {
        self.default_section = config.default_section.clone();
        self
    }

    pub fn with_default_section(mut self, name: impl Into<String>) -> Self {
        self.default_section = name.into();
        self
    }

    /// Load the table and return a ready store.
    pub async fn build(self) -> Result<FieldSchemaStore> {
        let default_section = self.default_section.trim().to_string();
        if default_section.is_empty() {
            return Err(SchemaError::validation(
                "default_section",
                "the default section name cannot be blank",
            ));
        }

        let mut store = FieldSchemaStore {
            table_id: self.table_id,
            backend: self.backend,
            catalog: self.catalog,
            default_section,
            fields: Vec::new(),
            sections: Vec::new(),
            settings: TableSettings::default(),
        };
        store.refetch().await?;

        debug!(
            table = %store.table_id,
            fields = store.fields.len(),
            sections = store.sections.len(),
            "schema store opened"
        );
        Ok(store)
    }
}

/// Field definitions, sections and settings of one table.
pub struct FieldSchemaStore {
    table_id: TableId,
    backend: Arc<dyn SchemaBackend>,
    catalog: Arc<dyn TableCatalog>,
    default_section: String,
    fields: Vec<FieldDef>,
    sections: Vec<SectionDef>,
    settings: TableSettings,
}

impl FieldSchemaStore {
    /// Open a store over a backend that also serves as the table catalog.
    pub fn open<B>(table_id: impl Into<TableId>, backend: Arc<B>) -> SchemaStoreBuilder
    where
        B: SchemaBackend + TableCatalog + 'static,
    {
        SchemaStoreBuilder {
            table_id: table_id.into(),
            backend: backend.clone(),
            catalog: backend,
            default_section: DEFAULT_SECTION.to_string(),
        }
    }

    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    /// Name of the protected section that holds ungrouped fields.
    pub fn default_section(&self) -> &str {
        &self.default_section
    }

    pub fn settings(&self) -> &TableSettings {
        &self.settings
    }

    /// All fields in display order.
    pub fn list_fields(&self) -> Vec<FieldDef> {
        sort_fields(&self.fields)
    }

    /// Fields of one section in display order. The default section's name
    /// selects ungrouped fields.
    pub fn fields_in_section(&self, name: &str) -> Vec<FieldDef> {
        let container = self.container_of(Some(name));
        ordered_fields(&self.fields)
            .into_iter()
            .filter(|(_, f)| self.container_of(f.group_name.as_deref()) == container)
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn get_field(&self, id: &FieldId) -> Option<&FieldDef> {
        self.fields.iter().find(|f| &f.id == id)
    }

    /// Case-insensitive name lookup.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        let name = name.trim();
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Create a field at the end of its section.
    pub async fn create_field(&mut self, draft: FieldDraft) -> Result<FieldDef> {
        let name = self.check_name(&draft.name, None)?;
        let options = validate_options(draft.kind, &draft.options)?;
        let container = self.container_of(draft.group_name.as_deref());

        let mut def = FieldDef::from_draft(FieldId::new(), self.table_id.clone(), draft, 0);
        def.name = name;
        def.options = options;
        def.group_name = container.clone();
        def.normalize();
        self.check_relationships(&mut def).await?;

        if let Some(group) = &container {
            self.ensure_section(group).await?;
        }

        // Legacy positions and gaps must not outrank the appended field.
        let gaps = densify(&self.field_items(), &container);
        self.persist_field_plan(&gaps).await?;
        def.order_index = Some(append_index(&self.field_items(), &container));

        let result = self
            .backend
            .save_field(&self.table_id, None, &FieldPatch::from_def(&def))
            .await;
        let saved = match result {
            Ok(saved) => saved,
            Err(e) => return Err(self.recover(e).await),
        };
        debug!(
            table = %self.table_id,
            field = %saved.id,
            name = %saved.name,
            kind = %saved.kind,
            order_index = ?saved.order_index,
            "created field"
        );
        self.fields.push(saved.clone());
        Ok(saved)
    }

    /// Update a field's attributes. A `group_name` in the patch moves the
    /// field to the end of that section; `order_index` is ignored, use
    /// [`move_field`](Self::move_field) instead.
    pub async fn update_field(&mut self, id: &FieldId, patch: FieldPatch) -> Result<FieldDef> {
        let current = self
            .get_field(id)
            .cloned()
            .ok_or_else(|| SchemaError::not_found("field", id.as_str()))?;

        let mut attributes = patch;
        let group_change = attributes.group_name.take();
        attributes.order_index = None;

        let mut next = current.clone();
        attributes.apply(&mut next);

        if next.kind != current.kind {
            self.check_kind_change(&current, next.kind)?;
        }
        next.name = self.check_name(&next.name, Some(id))?;
        if !next.name.eq_ignore_ascii_case(&current.name) {
            let formulas = formula_dependents(&current, &self.fields);
            if !formulas.is_empty() {
                return Err(SchemaError::Dependency {
                    field: current.name.clone(),
                    dependents: formulas.iter().map(|f| f.name.clone()).collect(),
                });
            }
        }

        // A new source resets the result unless the patch picks one too.
        if next.kind == FieldKind::Lookup
            && next.options.lookup_field_id != current.options.lookup_field_id
        {
            let source = next.options.lookup_field_id.take();
            let requested = next.options.lookup_result_field_id.take();
            next.options.lookup_field_id = current.options.lookup_field_id.clone();
            match source.as_ref().and_then(|id| self.get_field(id)) {
                Some(link) => set_lookup_source(&mut next, link)?,
                // unknown sources are rejected by check_relationships
                None => next.options.lookup_field_id = source,
            }
            if requested != current.options.lookup_result_field_id {
                next.options.lookup_result_field_id = requested;
            }
        }
        next.options = validate_options(next.kind, &next.options)?;
        self.check_relationships(&mut next).await?;

        let target = group_change.map(|group| self.container_of(group.as_deref()));

        if next != current {
            let mut write = FieldPatch::from_def(&next);
            write.group_name = None;
            write.order_index = None;
            let result = self.backend.save_field(&self.table_id, Some(id), &write).await;
            let saved = match result {
                Ok(saved) => saved,
                Err(e) => return Err(self.recover(e).await),
            };
            debug!(table = %self.table_id, field = %saved.id, name = %saved.name, "updated field");
            if let Some(slot) = self.fields.iter_mut().find(|f| &f.id == id) {
                *slot = saved;
            }
        }

        if let Some(target) = target {
            if target != self.container_of(current.group_name.as_deref()) {
                self.move_field(id, target.as_deref(), Anchor::End).await?;
            }
        }

        self.get_field(id)
            .cloned()
            .ok_or_else(|| SchemaError::not_found("field", id.as_str()))
    }

    /// Delete a field nothing depends on, then close the gap it leaves.
    pub async fn delete_field(&mut self, id: &FieldId) -> Result<()> {
        let field = self
            .get_field(id)
            .cloned()
            .ok_or_else(|| SchemaError::not_found("field", id.as_str()))?;

        let mut dependents: Vec<String> = lookup_dependents(id, &self.fields)
            .iter()
            .map(|f| f.name.clone())
            .collect();
        dependents.extend(
            formula_dependents(&field, &self.fields)
                .iter()
                .map(|f| f.name.clone()),
        );
        dependents.extend(self.foreign_lookup_dependents(id).await?);
        if !dependents.is_empty() {
            return Err(SchemaError::Dependency {
                field: field.name,
                dependents,
            });
        }

        if let Err(e) = self.backend.delete_field(&self.table_id, id).await {
            return Err(self.recover(e).await);
        }
        self.fields.retain(|f| &f.id != id);
        debug!(table = %self.table_id, field = %id, name = %field.name, "deleted field");

        let container = self.container_of(field.group_name.as_deref());
        let plan = densify(&self.field_items(), &container);
        self.persist_field_plan(&plan).await
    }

    /// Move a field within or across sections.
    ///
    /// `target_group == None` (or the default section's name) is the
    /// ungrouped container. Returns the applied plan.
    pub async fn move_field(
        &mut self,
        id: &FieldId,
        target_group: Option<&str>,
        anchor: Anchor<FieldId>,
    ) -> Result<ReorderPlan<FieldId, String>> {
        let field = self
            .get_field(id)
            .ok_or_else(|| SchemaError::not_found("field", id.as_str()))?;
        let source = self.container_of(field.group_name.as_deref());
        let target = self.container_of(target_group);

        if let Some(group) = &target {
            self.ensure_section(group).await?;
        }

        let intent = MoveIntent::between(id.clone(), source, target, anchor);
        let plan = plan_move(&self.field_items(), &intent)?;
        self.persist_field_plan(&plan).await?;
        Ok(plan)
    }

    /// Whether a field may switch to `to`, with the warning to show.
    pub fn check_type_change(&self, id: &FieldId, to: FieldKind) -> Result<TypeChange> {
        let field = self
            .get_field(id)
            .ok_or_else(|| SchemaError::not_found("field", id.as_str()))?;
        Ok(can_change_field_type(field, to, &self.fields))
    }

    /// Fields a new formula (or the formula `excluding`) may reference.
    pub fn formula_candidates(&self, excluding: Option<&FieldId>) -> Vec<FieldDef> {
        let none = FieldId::from_string("");
        let ordered = self.list_fields();
        formula_eligible_siblings(&ordered, excluding.unwrap_or(&none))
            .into_iter()
            .cloned()
            .collect()
    }

    /// Fields of the linked table a lookup through `link_id` may show.
    pub async fn result_field_candidates(&self, link_id: &FieldId) -> Result<Vec<FieldDef>> {
        let link = self
            .get_field(link_id)
            .ok_or_else(|| SchemaError::not_found("field", link_id.as_str()))?;

        let mut probe = FieldDef::from_draft(
            FieldId::new(),
            self.table_id.clone(),
            FieldDraft::new("lookup", FieldKind::Lookup),
            0,
        );
        set_lookup_source(&mut probe, link)?;
        let Some(target) = probe.options.lookup_target_table_id.clone() else {
            return Ok(Vec::new());
        };

        let target_fields = sort_fields(&self.catalog.list_fields_of(&target).await?);
        Ok(candidate_result_fields(&probe, &target_fields)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Choose the primary display: `"auto"`, `"id"`, or a field name.
    ///
    /// The keywords win over fields of the same name.
    pub async fn select_primary_field(&mut self, selection: &str) -> Result<PrimaryField> {
        let selection = selection.trim();
        let choice = if selection.eq_ignore_ascii_case("auto") {
            PrimaryField::Auto
        } else if selection.eq_ignore_ascii_case("id") {
            PrimaryField::Id
        } else {
            let field = self
                .field_by_name(selection)
                .filter(|f| primary_eligible(f))
                .ok_or_else(|| SchemaError::not_found("primary field candidate", selection))?;
            PrimaryField::Field(field.id.clone())
        };

        self.settings.primary_field = choice.clone();
        let settings = self.settings.clone();
        if let Err(e) = self
            .backend
            .save_table_settings(&self.table_id, &settings)
            .await
        {
            return Err(self.recover(e).await);
        }
        debug!(table = %self.table_id, primary = ?choice, "selected primary field");
        Ok(choice)
    }

    /// The effective primary display.
    ///
    /// A stored choice that no longer names an eligible field falls back to
    /// `Auto`.
    pub fn primary_field(&self) -> PrimaryDisplay {
        match &self.settings.primary_field {
            PrimaryField::Id => return PrimaryDisplay::Id,
            PrimaryField::Field(id) => match self.get_field(id) {
                Some(field) if primary_eligible(field) => {
                    return PrimaryDisplay::Field(field.clone())
                }
                _ => debug!(field = %id, "stale primary field, using auto"),
            },
            PrimaryField::Auto => {}
        }
        ordered_fields(&self.fields)
            .into_iter()
            .map(|(_, f)| f)
            .find(|f| primary_eligible(f))
            .map(|f| PrimaryDisplay::Field(f.clone()))
            .unwrap_or(PrimaryDisplay::None)
    }

    /// Lookups of this table that no longer resolve: a missing or non-link
    /// source, a deleted linked table, or a result field that is gone.
    pub async fn invalid_lookups(&self) -> Result<Vec<InvalidLookup>> {
        let mut invalid = Vec::new();
        for lookup in sort_fields(&self.fields)
            .into_iter()
            .filter(|f| f.kind == FieldKind::Lookup)
        {
            let target_fields = match lookup_target(&lookup, &self.fields) {
                Some(target) => match self.catalog.list_fields_of(&target).await {
                    Ok(fields) => fields,
                    Err(e) if e.is_not_found() => Vec::new(),
                    Err(e) => return Err(e),
                },
                None => Vec::new(),
            };
            if let Err(e) = validate_lookup(&lookup, &self.fields, &target_fields) {
                warn!(table = %self.table_id, field = %lookup.name, error = %e, "invalid lookup");
                invalid.push(InvalidLookup {
                    field: lookup,
                    reason: e.to_string(),
                });
            }
        }
        Ok(invalid)
    }

    /// Replace fields, sections and settings with the backend's copy.
    pub async fn refetch(&mut self) -> Result<()> {
        let fields = self.backend.load_fields(&self.table_id).await?;
        let sections = self.backend.load_sections(&self.table_id).await?;
        let settings = self.backend.load_table_settings(&self.table_id).await?;
        self.fields = fields;
        self.sections = sections;
        self.settings = settings;
        debug!(table = %self.table_id, fields = self.fields.len(), "refetched schema");
        Ok(())
    }

    // -- crate-internal accessors used by the section manager --

    pub(crate) fn raw_fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Vec<FieldDef> {
        &mut self.fields
    }

    pub(crate) fn stored_sections(&self) -> &[SectionDef] {
        &self.sections
    }

    pub(crate) fn sections_mut(&mut self) -> &mut Vec<SectionDef> {
        &mut self.sections
    }

    pub(crate) fn backend(&self) -> Arc<dyn SchemaBackend> {
        Arc::clone(&self.backend)
    }

    pub(crate) fn container_of(&self, group: Option<&str>) -> Option<String> {
        normalize_group(group, &self.default_section)
    }

    /// Refetch after a boundary failure and hand back the original error.
    pub(crate) async fn recover(&mut self, error: SchemaError) -> SchemaError {
        warn!(table = %self.table_id, %error, "write failed, refetching schema");
        if let Err(refetch_error) = self.refetch().await {
            warn!(table = %self.table_id, error = %refetch_error, "refetch failed");
        }
        error
    }

    fn field_items(&self) -> Vec<OrderedItem<FieldId, String>> {
        ordered_fields(&self.fields)
            .into_iter()
            .map(|(key, f)| {
                OrderedItem::new(f.id.clone(), self.container_of(f.group_name.as_deref()), key)
            })
            .collect()
    }

    /// Lookups in other tables that show `id` as their result, named
    /// `Table.Field`.
    async fn foreign_lookup_dependents(&self, id: &FieldId) -> Result<Vec<String>> {
        let mut dependents = Vec::new();
        for table in self.catalog.list_tables().await? {
            if table.id == self.table_id {
                continue;
            }
            let fields = self.catalog.list_fields_of(&table.id).await?;
            dependents.extend(
                fields
                    .iter()
                    .filter(|f| {
                        f.kind == FieldKind::Lookup
                            && f.options.lookup_result_field_id.as_ref() == Some(id)
                    })
                    .map(|f| format!("{}.{}", table.name, f.name)),
            );
        }
        Ok(dependents)
    }

    fn check_name(&self, name: &str, except: Option<&FieldId>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchemaError::validation("name", "field name is required"));
        }
        let taken = self
            .fields
            .iter()
            .any(|f| Some(&f.id) != except && f.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(SchemaError::validation(
                name,
                "a field with this name already exists",
            ));
        }
        Ok(name.to_string())
    }

    fn check_kind_change(&self, current: &FieldDef, to: FieldKind) -> Result<()> {
        let change = can_change_field_type(current, to, &self.fields);
        if !change.can_change {
            return Err(SchemaError::Dependency {
                field: current.name.clone(),
                dependents: lookup_dependents(&current.id, &self.fields)
                    .iter()
                    .map(|f| f.name.clone())
                    .collect(),
            });
        }
        if to == FieldKind::Formula {
            let formulas = formula_dependents(current, &self.fields);
            if !formulas.is_empty() {
                return Err(SchemaError::Dependency {
                    field: current.name.clone(),
                    dependents: formulas.iter().map(|f| f.name.clone()).collect(),
                });
            }
        }
        if let Some(warning) = &change.warning {
            debug!(field = %current.name, from = %current.kind, %to, %warning, "changing kind");
        }
        Ok(())
    }

    /// Validate link, lookup and formula relationships; derives the lookup
    /// target table.
    async fn check_relationships(&self, def: &mut FieldDef) -> Result<()> {
        match def.kind {
            FieldKind::Lookup => {
                let target_fields = match lookup_target(def, &self.fields) {
                    Some(target) => self.catalog.list_fields_of(&target).await?,
                    None => Vec::new(),
                };
                let target = validate_lookup(def, &self.fields, &target_fields)?;
                def.options.lookup_target_table_id = Some(target);
            }
            FieldKind::Formula => validate_formula(def, &self.fields)?,
            FieldKind::Link => {
                if let Some(target) = resolve_link_target(def) {
                    let tables = self.catalog.list_tables().await?;
                    if !tables.iter().any(|t| &t.id == target) {
                        return Err(SchemaError::validation(
                            &def.name,
                            format!("linked table {target} does not exist"),
                        ));
                    }
                }
            }
            FieldKind::Text
            | FieldKind::Number
            | FieldKind::SingleSelect
            | FieldKind::MultiSelect
            | FieldKind::Date
            | FieldKind::Currency
            | FieldKind::Percent
            | FieldKind::Checkbox
            | FieldKind::Attachment => {}
        }
        Ok(())
    }

    /// Apply a field plan locally, then write it.
    ///
    /// Fields that change section are saved one by one; the rest go out as a
    /// single order write.
    async fn persist_field_plan(&mut self, plan: &ReorderPlan<FieldId, String>) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        let mut relocated = Vec::new();
        let mut order = Vec::new();
        for update in plan.iter() {
            let Some(field) = self.get_field(&update.id) else {
                continue;
            };
            if self.container_of(field.group_name.as_deref()) != update.container {
                relocated.push(update.clone());
            } else {
                order.push(OrderEntry {
                    id: update.id.clone(),
                    order_index: update.order_index,
                });
            }
        }

        for update in plan.iter() {
            let relocating = relocated.iter().any(|r| r.id == update.id);
            if let Some(field) = self.fields.iter_mut().find(|f| f.id == update.id) {
                field.order_index = Some(update.order_index);
                if relocating {
                    field.group_name = update.container.clone();
                }
            }
        }

        for update in &relocated {
            let patch = FieldPatch::default()
                .with_group(update.container.clone())
                .with_order_index(update.order_index);
            let result = self
                .backend
                .save_field(&self.table_id, Some(&update.id), &patch)
                .await;
            if let Err(e) = result {
                return Err(self.recover(e).await);
            }
        }
        if !order.is_empty() {
            let result = self.backend.save_field_order(&self.table_id, &order).await;
            if let Err(e) = result {
                return Err(self.recover(e).await);
            }
        }

        debug!(
            table = %self.table_id,
            relocated = relocated.len(),
            reordered = order.len(),
            "wrote field order"
        );
        Ok(())
    }
}

fn primary_eligible(field: &FieldDef) -> bool {
    !field.kind.is_virtual() && !field.system
}
