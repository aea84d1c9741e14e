//! In-memory backend.
//!
//! Holds every table behind a tokio `RwLock`. Any boundary operation can be
//! told to fail exactly once, which is how rollback paths are exercised.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tabula_fields::{FieldDef, FieldId, FieldPatch, SectionId, TableId};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::backend::{SchemaBackend, TableCatalog};
use crate::error::{Result, SchemaError};
use crate::model::{OrderEntry, SectionDef, SectionPatch, TableSettings, TableSummary};

/// Boundary operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    LoadFields,
    SaveField,
    DeleteField,
    SaveFieldOrder,
    LoadSections,
    SaveSection,
    DeleteSection,
    SaveSectionOrder,
    LoadSettings,
    SaveSettings,
    ListTables,
    ListFields,
}

impl BackendOp {
    fn as_str(&self) -> &'static str {
        match self {
            BackendOp::LoadFields => "load_fields",
            BackendOp::SaveField => "save_field",
            BackendOp::DeleteField => "delete_field",
            BackendOp::SaveFieldOrder => "save_field_order",
            BackendOp::LoadSections => "load_sections",
            BackendOp::SaveSection => "save_section",
            BackendOp::DeleteSection => "delete_section",
            BackendOp::SaveSectionOrder => "save_section_order",
            BackendOp::LoadSettings => "load_table_settings",
            BackendOp::SaveSettings => "save_table_settings",
            BackendOp::ListTables => "list_tables",
            BackendOp::ListFields => "list_fields_of",
        }
    }
}

#[derive(Debug, Default)]
struct TableState {
    name: String,
    fields: Vec<FieldDef>,
    sections: Vec<SectionDef>,
    settings: TableSettings,
}

/// Backend and catalog over plain vectors.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<BTreeMap<TableId, TableState>>,
    failures: Mutex<HashSet<BackendOp>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty table.
    pub async fn add_table(&self, id: impl Into<TableId>, name: impl Into<String>) -> TableId {
        let id = id.into();
        let mut tables = self.tables.write().await;
        tables.entry(id.clone()).or_default().name = name.into();
        id
    }

    /// Seed a raw record as-is, bypassing every rule. Used for legacy data.
    pub async fn insert_field(&self, def: FieldDef) {
        let mut tables = self.tables.write().await;
        tables.entry(def.table_id.clone()).or_default().fields.push(def);
    }

    /// Seed a raw section record as-is.
    pub async fn insert_section(&self, def: SectionDef) {
        let mut tables = self.tables.write().await;
        tables
            .entry(def.table_id.clone())
            .or_default()
            .sections
            .push(def);
    }

    /// Make the next call of `op` fail with a persistence error.
    pub async fn fail_next(&self, op: BackendOp) {
        self.failures.lock().await.insert(op);
    }

    /// Current stored fields, for assertions.
    pub async fn stored_fields(&self, table: &TableId) -> Vec<FieldDef> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.fields.clone())
            .unwrap_or_default()
    }

    /// Current stored sections, for assertions.
    pub async fn stored_sections(&self, table: &TableId) -> Vec<SectionDef> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.sections.clone())
            .unwrap_or_default()
    }

    async fn check(&self, op: BackendOp) -> Result<()> {
        if self.failures.lock().await.remove(&op) {
            debug!(op = op.as_str(), "injected failure");
            return Err(SchemaError::persistence(op.as_str(), "injected failure"));
        }
        Ok(())
    }
}

fn missing_table(table: &TableId) -> SchemaError {
    SchemaError::not_found("table", table.as_str())
}

#[async_trait]
impl SchemaBackend for MemoryBackend {
    async fn load_fields(&self, table: &TableId) -> Result<Vec<FieldDef>> {
        self.check(BackendOp::LoadFields).await?;
        let tables = self.tables.read().await;
        let state = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(state.fields.clone())
    }

    async fn save_field(
        &self,
        table: &TableId,
        field_id: Option<&FieldId>,
        patch: &FieldPatch,
    ) -> Result<FieldDef> {
        self.check(BackendOp::SaveField).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        match field_id {
            None => {
                let def = patch.clone().into_new_field(FieldId::new(), table.clone())?;
                state.fields.push(def.clone());
                Ok(def)
            }
            Some(id) => {
                let def = state
                    .fields
                    .iter_mut()
                    .find(|f| &f.id == id)
                    .ok_or_else(|| SchemaError::not_found("field", id.as_str()))?;
                patch.apply(def);
                Ok(def.clone())
            }
        }
    }

    async fn delete_field(&self, table: &TableId, field_id: &FieldId) -> Result<()> {
        self.check(BackendOp::DeleteField).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let before = state.fields.len();
        state.fields.retain(|f| &f.id != field_id);
        if state.fields.len() == before {
            return Err(SchemaError::not_found("field", field_id.as_str()));
        }
        Ok(())
    }

    async fn save_field_order(
        &self,
        table: &TableId,
        order: &[OrderEntry<FieldId>],
    ) -> Result<()> {
        self.check(BackendOp::SaveFieldOrder).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        for entry in order {
            let def = state
                .fields
                .iter_mut()
                .find(|f| f.id == entry.id)
                .ok_or_else(|| SchemaError::not_found("field", entry.id.as_str()))?;
            def.order_index = Some(entry.order_index);
        }
        Ok(())
    }

    async fn load_sections(&self, table: &TableId) -> Result<Vec<SectionDef>> {
        self.check(BackendOp::LoadSections).await?;
        let tables = self.tables.read().await;
        let state = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(state.sections.clone())
    }

    async fn save_section(
        &self,
        table: &TableId,
        section_id: Option<&SectionId>,
        patch: &SectionPatch,
    ) -> Result<SectionDef> {
        self.check(BackendOp::SaveSection).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        match section_id {
            None => {
                let def = patch
                    .into_new_section(SectionId::new(), table.clone())
                    .ok_or_else(|| SchemaError::validation("section", "section name is required"))?;
                state.sections.push(def.clone());
                Ok(def)
            }
            Some(id) => {
                let def = state
                    .sections
                    .iter_mut()
                    .find(|s| &s.id == id)
                    .ok_or_else(|| SchemaError::not_found("section", id.as_str()))?;
                patch.apply(def);
                Ok(def.clone())
            }
        }
    }

    async fn delete_section(&self, table: &TableId, section_id: &SectionId) -> Result<()> {
        self.check(BackendOp::DeleteSection).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let before = state.sections.len();
        state.sections.retain(|s| &s.id != section_id);
        if state.sections.len() == before {
            return Err(SchemaError::not_found("section", section_id.as_str()));
        }
        Ok(())
    }

    async fn save_section_order(
        &self,
        table: &TableId,
        order: &[OrderEntry<SectionId>],
    ) -> Result<()> {
        self.check(BackendOp::SaveSectionOrder).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        for entry in order {
            let def = state
                .sections
                .iter_mut()
                .find(|s| s.id == entry.id)
                .ok_or_else(|| SchemaError::not_found("section", entry.id.as_str()))?;
            def.order_index = Some(entry.order_index);
        }
        Ok(())
    }

    async fn load_table_settings(&self, table: &TableId) -> Result<TableSettings> {
        self.check(BackendOp::LoadSettings).await?;
        let tables = self.tables.read().await;
        let state = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(state.settings.clone())
    }

    async fn save_table_settings(&self, table: &TableId, settings: &TableSettings) -> Result<()> {
        self.check(BackendOp::SaveSettings).await?;
        let mut tables = self.tables.write().await;
        let state = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        state.settings = settings.clone();
        Ok(())
    }
}

#[async_trait]
impl TableCatalog for MemoryBackend {
    async fn list_tables(&self) -> Result<Vec<TableSummary>> {
        self.check(BackendOp::ListTables).await?;
        let tables = self.tables.read().await;
        Ok(tables
            .iter()
            .map(|(id, state)| TableSummary {
                id: id.clone(),
                name: state.name.clone(),
            })
            .collect())
    }

    async fn list_fields_of(&self, table: &TableId) -> Result<Vec<FieldDef>> {
        self.check(BackendOp::ListFields).await?;
        let tables = self.tables.read().await;
        let state = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(state.fields.clone())
    }
}
