//! Section resolution and the section half of the store.
//!
//! Sections exist in two states. A persisted section has a stored record; a
//! virtual one is only implied by field `group_name`s. Structural writes
//! (reorder, update) materialize virtual sections first, then write order.

use tabula_fields::{FieldDef, FieldPatch};
use tabula_order::{
    apply_plan, container_items, plan_move, reorder_container, Anchor, MoveIntent, OrderError,
    OrderedItem, ReorderPlan,
};
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::model::{OrderEntry, Section, SectionDef, SectionPatch, VirtualSection};
use crate::store::FieldSchemaStore;

/// Normalize a field group to its container: blank and the default section
/// both mean "ungrouped".
pub(crate) fn normalize_group(group: Option<&str>, default_name: &str) -> Option<String> {
    let group = group.map(str::trim).filter(|g| !g.is_empty())?;
    if group == default_name {
        None
    } else {
        Some(group.to_string())
    }
}

/// Merge stored sections with the groups fields actually use.
///
/// The default section comes first whenever it is stored or any field is
/// ungrouped. The rest sort by `order_index` (absent last), then name.
/// Duplicate stored names keep the first record.
pub fn resolve_sections(
    persisted: &[SectionDef],
    fields: &[FieldDef],
    default_name: &str,
) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::with_capacity(persisted.len() + 1);
    for def in persisted {
        if sections.iter().any(|s| s.name() == def.name) {
            debug!(section = %def.name, "ignoring duplicate section record");
            continue;
        }
        sections.push(Section::Persisted(def.clone()));
    }

    let has_ungrouped = fields
        .iter()
        .any(|f| normalize_group(f.group_name.as_deref(), default_name).is_none());
    if has_ungrouped && !sections.iter().any(|s| s.name() == default_name) {
        sections.push(Section::Virtual(VirtualSection {
            name: default_name.to_string(),
        }));
    }

    for field in fields {
        if let Some(group) = normalize_group(field.group_name.as_deref(), default_name) {
            if !sections.iter().any(|s| s.name() == group) {
                sections.push(Section::Virtual(VirtualSection { name: group }));
            }
        }
    }

    sections.sort_by(|a, b| {
        let rank = |s: &Section| {
            (
                s.name() != default_name,
                s.order_index().is_none(),
                s.order_index().unwrap_or_default(),
                s.name().to_lowercase(),
            )
        };
        rank(a).cmp(&rank(b))
    });
    sections
}

fn section_items(resolved: &[Section]) -> Vec<OrderedItem<String, ()>> {
    resolved
        .iter()
        .enumerate()
        .map(|(i, s)| OrderedItem::new(s.name().to_string(), None, i as i64))
        .collect()
}

fn unknown_section(error: OrderError) -> SchemaError {
    match error {
        OrderError::ItemNotFound { id } => SchemaError::not_found("section", id),
        other => other.into(),
    }
}

impl FieldSchemaStore {
    /// Sections in display order, virtual ones included.
    pub fn sections(&self) -> Vec<Section> {
        resolve_sections(self.stored_sections(), self.raw_fields(), self.default_section())
    }

    pub fn section(&self, name: &str) -> Option<Section> {
        self.sections().into_iter().find(|s| s.name() == name.trim())
    }

    /// Return the stored section with this name, creating it if needed.
    pub async fn ensure_section(&mut self, name: &str) -> Result<SectionDef> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchemaError::validation("section", "section name is required"));
        }
        if let Some(def) = self.stored_sections().iter().find(|s| s.name == name) {
            return Ok(def.clone());
        }

        let table = self.table_id().clone();
        match self
            .backend()
            .save_section(&table, None, &SectionPatch::named(name))
            .await
        {
            Ok(def) => {
                debug!(table = %table, section = %def.name, "materialized section");
                self.sections_mut().push(def.clone());
                Ok(def)
            }
            Err(e) => Err(self.recover(e).await),
        }
    }

    /// Put sections in the given order; unlisted sections follow in their
    /// current order.
    ///
    /// Naming the default section makes this a no-op: it never leaves first
    /// place.
    pub async fn reorder_sections(&mut self, ordered_names: &[String]) -> Result<Vec<Section>> {
        let default_name = self.default_section().to_string();
        if ordered_names.iter().any(|n| n.trim() == default_name) {
            debug!(section = %default_name, "ignoring reorder involving the default section");
            return Ok(self.sections());
        }

        let resolved = self.sections();
        let mut full: Vec<String> = Vec::with_capacity(ordered_names.len() + 1);
        if resolved.first().is_some_and(|s| s.name() == default_name) {
            full.push(default_name);
        }
        full.extend(ordered_names.iter().map(|n| n.trim().to_string()));

        let plan = reorder_container(&section_items(&resolved), &None, &full)
            .map_err(unknown_section)?;
        self.commit_section_order(&resolved, &plan).await?;
        Ok(self.sections())
    }

    /// Move one section. Moves of, or ahead of, the default section are
    /// ignored.
    pub async fn move_section(&mut self, name: &str, anchor: Anchor<String>) -> Result<Vec<Section>> {
        let name = name.trim();
        let default_name = self.default_section().to_string();
        if name == default_name {
            debug!(section = %name, "ignoring move of the default section");
            return Ok(self.sections());
        }

        let resolved = self.sections();
        let plan = plan_move(
            &section_items(&resolved),
            &MoveIntent::within(name.to_string(), None, anchor),
        )
        .map_err(unknown_section)?;

        let default_first = resolved.first().is_some_and(|s| s.name() == default_name);
        if default_first && plan.get(&default_name).is_some() {
            debug!(section = %name, "ignoring move ahead of the default section");
            return Ok(self.sections());
        }

        self.commit_section_order(&resolved, &plan).await?;
        Ok(self.sections())
    }

    /// Change a section's attributes. A rename carries its fields along.
    pub async fn update_section(&mut self, name: &str, patch: SectionPatch) -> Result<SectionDef> {
        let name = name.trim().to_string();
        let default_name = self.default_section().to_string();
        let mut patch = patch;
        patch.order_index = None;

        let rename = patch
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| *n != name)
            .map(str::to_string);
        if let Some(new_name) = &rename {
            if name == default_name {
                return Err(SchemaError::validation(
                    &name,
                    "the default section cannot be renamed",
                ));
            }
            if new_name.is_empty() {
                return Err(SchemaError::validation(&name, "section name is required"));
            }
            if *new_name == default_name || self.section(new_name).is_some() {
                return Err(SchemaError::validation(
                    new_name,
                    "a section with this name already exists",
                ));
            }
        }
        patch.name = rename.clone();
        if name != default_name && self.section(&name).is_none() {
            return Err(SchemaError::not_found("section", name));
        }

        let def = self.ensure_section(&name).await?;
        let table = self.table_id().clone();
        let saved = match self
            .backend()
            .save_section(&table, Some(&def.id), &patch)
            .await
        {
            Ok(saved) => saved,
            Err(e) => return Err(self.recover(e).await),
        };
        if let Some(slot) = self.sections_mut().iter_mut().find(|s| s.id == saved.id) {
            *slot = saved.clone();
        }

        if let Some(new_name) = rename {
            let members: Vec<_> = self
                .raw_fields()
                .iter()
                .filter(|f| {
                    self.container_of(f.group_name.as_deref()).as_deref() == Some(name.as_str())
                })
                .map(|f| f.id.clone())
                .collect();
            for id in members {
                if let Some(field) = self.fields_mut().iter_mut().find(|f| f.id == id) {
                    field.group_name = Some(new_name.clone());
                }
                let patch = FieldPatch::default().with_group(Some(new_name.clone()));
                if let Err(e) = self.backend().save_field(&table, Some(&id), &patch).await {
                    return Err(self.recover(e).await);
                }
            }
            debug!(table = %table, from = %name, to = %new_name, "renamed section");
        }

        Ok(saved)
    }

    /// Delete a section; its fields move to the end of the default section.
    pub async fn delete_section(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name == self.default_section() {
            return Err(SchemaError::validation(
                name,
                "the default section cannot be deleted",
            ));
        }
        let section = self
            .section(name)
            .ok_or_else(|| SchemaError::not_found("section", name))?;

        let members = self.fields_in_section(name);
        for field in members {
            self.move_field(&field.id, None, Anchor::End).await?;
        }

        if let Some(id) = section.id() {
            let table = self.table_id().clone();
            if let Err(e) = self.backend().delete_section(&table, id).await {
                return Err(self.recover(e).await);
            }
            self.sections_mut().retain(|s| &s.id != id);
        }
        debug!(section = %name, "deleted section");
        Ok(())
    }

    /// Two-phase write of a section order: materialize, then store indices.
    ///
    /// Every non-default section whose stored index differs from its new
    /// position is written, so unordered sections get explicit indices.
    async fn commit_section_order(
        &mut self,
        resolved: &[Section],
        plan: &ReorderPlan<String, ()>,
    ) -> Result<()> {
        let mut items = section_items(resolved);
        apply_plan(&mut items, plan);
        let ordered: Vec<String> = container_items(&items, &None)
            .into_iter()
            .map(|i| i.id.clone())
            .collect();

        let default_name = self.default_section().to_string();
        let mut entries = Vec::new();
        for (index, name) in ordered.iter().enumerate() {
            if *name == default_name {
                continue;
            }
            let index = index as i64;
            let stored = self
                .stored_sections()
                .iter()
                .find(|s| &s.name == name)
                .and_then(|s| s.order_index);
            if stored == Some(index) {
                continue;
            }
            let def = self.ensure_section(name).await?;
            entries.push(OrderEntry {
                id: def.id,
                order_index: index,
            });
        }
        if entries.is_empty() {
            return Ok(());
        }

        for entry in &entries {
            if let Some(def) = self.sections_mut().iter_mut().find(|s| s.id == entry.id) {
                def.order_index = Some(entry.order_index);
            }
        }
        let table = self.table_id().clone();
        if let Err(e) = self.backend().save_section_order(&table, &entries).await {
            return Err(self.recover(e).await);
        }
        debug!(table = %table, updates = entries.len(), "wrote section order");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_fields::{FieldDraft, FieldId, FieldKind, SectionId, TableId};

    fn field(name: &str, group: Option<&str>) -> FieldDef {
        let mut draft = FieldDraft::new(name, FieldKind::Text);
        if let Some(group) = group {
            draft = draft.with_group(group);
        }
        FieldDef::from_draft(FieldId::new(), TableId::from_string("orders"), draft, 0)
    }

    fn stored(name: &str, order_index: Option<i64>) -> SectionDef {
        let mut def = SectionDef::new(SectionId::new(), TableId::from_string("orders"), name);
        def.order_index = order_index;
        def
    }

    fn names(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn default_section_is_synthesized_first() {
        let fields = vec![field("Shipping Date", Some("Shipping")), field("Title", None)];
        let sections = resolve_sections(&[], &fields, "General");
        assert_eq!(names(&sections), vec!["General", "Shipping"]);
        assert!(sections.iter().all(Section::is_virtual));
    }

    #[test]
    fn default_section_beats_lower_order_index() {
        let persisted = vec![stored("Billing", Some(0)), stored("General", Some(7))];
        let fields = vec![field("Title", None)];
        let sections = resolve_sections(&persisted, &fields, "General");
        assert_eq!(names(&sections), vec!["General", "Billing"]);
        assert!(!sections[0].is_virtual());
    }

    #[test]
    fn unordered_sections_sort_after_ordered_by_name() {
        let persisted = vec![
            stored("Zeta", None),
            stored("Beta", Some(2)),
            stored("Alpha", None),
            stored("Gamma", Some(1)),
        ];
        let sections = resolve_sections(&persisted, &[], "General");
        assert_eq!(names(&sections), vec!["Gamma", "Beta", "Alpha", "Zeta"]);
    }

    #[test]
    fn no_default_section_without_ungrouped_fields() {
        let fields = vec![field("Amount", Some("Billing"))];
        let sections = resolve_sections(&[], &fields, "General");
        assert_eq!(names(&sections), vec!["Billing"]);
    }

    #[test]
    fn explicit_default_group_counts_as_ungrouped() {
        let fields = vec![field("Title", Some("General"))];
        let sections = resolve_sections(&[], &fields, "General");
        assert_eq!(names(&sections), vec!["General"]);
        assert_eq!(normalize_group(Some(" General "), "General"), None);
        assert_eq!(normalize_group(Some("  "), "General"), None);
        assert_eq!(
            normalize_group(Some("Billing"), "General"),
            Some("Billing".to_string())
        );
    }

    #[test]
    fn duplicate_stored_names_keep_first() {
        let first = stored("Billing", Some(0));
        let persisted = vec![first.clone(), stored("Billing", Some(1))];
        let sections = resolve_sections(&persisted, &[], "General");
        assert_eq!(sections, vec![Section::Persisted(first)]);
    }
}
