//! Per-table schema state for Tabula
//!
//! `tabula-schema` owns the mutable half of the engine: one
//! [`FieldSchemaStore`] per table holds its fields, sections and settings,
//! validates every change through `tabula-fields`, orders things through
//! `tabula-order`, and writes through a [`SchemaBackend`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula_fields::{FieldDraft, FieldKind};
//! use tabula_schema::{FieldSchemaStore, MemoryBackend};
//!
//! # async fn demo() -> tabula_schema::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! let table = backend.add_table("orders", "Orders").await;
//!
//! let mut store = FieldSchemaStore::open(table, backend).build().await?;
//! store
//!     .create_field(FieldDraft::new("Title", FieldKind::Text))
//!     .await?;
//! assert_eq!(store.list_fields().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod navigation;
pub mod sections;
pub mod store;
pub mod yaml;

pub use backend::{SchemaBackend, TableCatalog};
pub use config::{SchemaConfig, DEFAULT_SECTION};
pub use error::{Result, SchemaError};
pub use memory::{BackendOp, MemoryBackend};
pub use model::{
    OrderEntry, PrimaryDisplay, PrimaryField, Section, SectionDef, SectionPatch, TableSettings,
    TableSummary, VirtualSection,
};
pub use navigation::{GroupId, NavGroup, NavPage, Navigation, PageId};
pub use sections::resolve_sections;
pub use store::{FieldSchemaStore, InvalidLookup, SchemaStoreBuilder};
pub use yaml::YamlBackend;
