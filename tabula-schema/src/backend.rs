//! The persistence boundary.
//!
//! The store never touches storage directly. Everything it reads or writes
//! goes through these two traits, so the same store runs over the in-memory
//! backend in tests and the YAML backend on disk.

use async_trait::async_trait;
use tabula_fields::{FieldDef, FieldId, FieldPatch, SectionId, TableId};

use crate::error::Result;
use crate::model::{OrderEntry, SectionDef, SectionPatch, TableSettings, TableSummary};

/// Load and save one table's schema.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// All field records of the table, in storage order.
    async fn load_fields(&self, table: &TableId) -> Result<Vec<FieldDef>>;

    /// Create (`field_id == None`) or update a field; returns the stored record.
    async fn save_field(
        &self,
        table: &TableId,
        field_id: Option<&FieldId>,
        patch: &FieldPatch,
    ) -> Result<FieldDef>;

    async fn delete_field(&self, table: &TableId, field_id: &FieldId) -> Result<()>;

    /// Bulk-write order indices; containers are unchanged.
    async fn save_field_order(&self, table: &TableId, order: &[OrderEntry<FieldId>])
        -> Result<()>;

    async fn load_sections(&self, table: &TableId) -> Result<Vec<SectionDef>>;

    /// Create (`section_id == None`) or update a section; returns the stored record.
    async fn save_section(
        &self,
        table: &TableId,
        section_id: Option<&SectionId>,
        patch: &SectionPatch,
    ) -> Result<SectionDef>;

    async fn delete_section(&self, table: &TableId, section_id: &SectionId) -> Result<()>;

    async fn save_section_order(
        &self,
        table: &TableId,
        order: &[OrderEntry<SectionId>],
    ) -> Result<()>;

    async fn load_table_settings(&self, table: &TableId) -> Result<TableSettings>;

    async fn save_table_settings(&self, table: &TableId, settings: &TableSettings) -> Result<()>;
}

/// Read-only view of every table, used to resolve link and lookup targets.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<TableSummary>>;

    async fn list_fields_of(&self, table: &TableId) -> Result<Vec<FieldDef>>;
}
