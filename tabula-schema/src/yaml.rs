//! YAML file backend.
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/<table_id>/table.yaml          name and settings
//! <root>/<table_id>/fields/<id>.yaml    one file per field
//! <root>/<table_id>/sections/<id>.yaml  one file per section
//! ```
//!
//! Writes go to a temp file and are renamed into place. Files that fail to
//! parse are skipped with a warning so one bad record never hides a table.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tabula_fields::{FieldDef, FieldId, FieldPatch, SectionId, TableId};
use tokio::fs;
use tracing::{debug, warn};

use crate::backend::{SchemaBackend, TableCatalog};
use crate::error::{Result, SchemaError};
use crate::model::{OrderEntry, SectionDef, SectionPatch, TableSettings, TableSummary};

const TABLE_FILE: &str = "table.yaml";
const FIELDS_DIR: &str = "fields";
const SECTIONS_DIR: &str = "sections";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableMeta {
    id: TableId,
    name: String,
    #[serde(default)]
    settings: TableSettings,
}

/// Backend and catalog over a directory of YAML files.
#[derive(Debug, Clone)]
pub struct YamlBackend {
    root: PathBuf,
}

impl YamlBackend {
    /// Open a data directory, creating it if missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "yaml backend opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty table with a fresh id.
    pub async fn create_table(&self, name: &str) -> Result<TableSummary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchemaError::validation("table", "table name is required"));
        }
        if self
            .list_tables()
            .await?
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(name))
        {
            return Err(SchemaError::validation(
                name,
                "a table with this name already exists",
            ));
        }

        let id = TableId::new();
        let dir = self.table_dir(&id);
        fs::create_dir_all(dir.join(FIELDS_DIR)).await?;
        fs::create_dir_all(dir.join(SECTIONS_DIR)).await?;

        let meta = TableMeta {
            id: id.clone(),
            name: name.to_string(),
            settings: TableSettings::default(),
        };
        write_yaml(&dir.join(TABLE_FILE), &meta).await?;
        debug!(table = %id, name, "created table");

        Ok(TableSummary {
            id,
            name: meta.name,
        })
    }

    fn table_dir(&self, table: &TableId) -> PathBuf {
        self.root.join(table.as_str())
    }

    fn field_path(&self, table: &TableId, id: &FieldId) -> PathBuf {
        self.table_dir(table)
            .join(FIELDS_DIR)
            .join(format!("{id}.yaml"))
    }

    fn section_path(&self, table: &TableId, id: &SectionId) -> PathBuf {
        self.table_dir(table)
            .join(SECTIONS_DIR)
            .join(format!("{id}.yaml"))
    }

    async fn read_meta(&self, table: &TableId) -> Result<TableMeta> {
        let path = self.table_dir(table).join(TABLE_FILE);
        if !fs::try_exists(&path).await? {
            return Err(SchemaError::not_found("table", table.as_str()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    async fn read_field(&self, table: &TableId, id: &FieldId) -> Result<FieldDef> {
        let path = self.field_path(table, id);
        if !fs::try_exists(&path).await? {
            return Err(SchemaError::not_found("field", id.as_str()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    async fn read_section(&self, table: &TableId, id: &SectionId) -> Result<SectionDef> {
        let path = self.section_path(table, id);
        if !fs::try_exists(&path).await? {
            return Err(SchemaError::not_found("section", id.as_str()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }
}

/// Load every `.yaml` file of a directory, sorted by file name.
async fn load_dir<T: DeserializeOwned>(dir: &Path, kind: &str) -> Result<Vec<T>> {
    let mut paths = Vec::new();
    if !fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path).await?;
        match serde_yaml_ng::from_str::<T>(&content) {
            Ok(record) => records.push(record),
            Err(e) => warn!(?path, %e, "skipping invalid {kind} file"),
        }
    }
    Ok(records)
}

async fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml_ng::to_string(value)?;
    atomic_write(path, yaml.as_bytes()).await
}

/// Write to a temp file then rename for atomic persistence.
async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl SchemaBackend for YamlBackend {
    async fn load_fields(&self, table: &TableId) -> Result<Vec<FieldDef>> {
        self.read_meta(table).await?;
        load_dir(&self.table_dir(table).join(FIELDS_DIR), "field").await
    }

    async fn save_field(
        &self,
        table: &TableId,
        field_id: Option<&FieldId>,
        patch: &FieldPatch,
    ) -> Result<FieldDef> {
        self.read_meta(table).await?;
        let def = match field_id {
            None => patch.clone().into_new_field(FieldId::new(), table.clone())?,
            Some(id) => {
                let mut def = self.read_field(table, id).await?;
                patch.apply(&mut def);
                def
            }
        };
        fs::create_dir_all(self.table_dir(table).join(FIELDS_DIR)).await?;
        write_yaml(&self.field_path(table, &def.id), &def).await?;
        debug!(table = %table, field = %def.id, name = %def.name, "wrote field");
        Ok(def)
    }

    async fn delete_field(&self, table: &TableId, field_id: &FieldId) -> Result<()> {
        let path = self.field_path(table, field_id);
        if !fs::try_exists(&path).await? {
            return Err(SchemaError::not_found("field", field_id.as_str()));
        }
        fs::remove_file(&path).await?;
        debug!(table = %table, field = %field_id, "deleted field");
        Ok(())
    }

    async fn save_field_order(
        &self,
        table: &TableId,
        order: &[OrderEntry<FieldId>],
    ) -> Result<()> {
        for entry in order {
            let mut def = self.read_field(table, &entry.id).await?;
            def.order_index = Some(entry.order_index);
            write_yaml(&self.field_path(table, &entry.id), &def).await?;
        }
        debug!(table = %table, count = order.len(), "wrote field order");
        Ok(())
    }

    async fn load_sections(&self, table: &TableId) -> Result<Vec<SectionDef>> {
        self.read_meta(table).await?;
        load_dir(&self.table_dir(table).join(SECTIONS_DIR), "section").await
    }

    async fn save_section(
        &self,
        table: &TableId,
        section_id: Option<&SectionId>,
        patch: &SectionPatch,
    ) -> Result<SectionDef> {
        self.read_meta(table).await?;
        let def = match section_id {
            None => patch
                .into_new_section(SectionId::new(), table.clone())
                .ok_or_else(|| SchemaError::validation("section", "section name is required"))?,
            Some(id) => {
                let mut def = self.read_section(table, id).await?;
                patch.apply(&mut def);
                def
            }
        };
        fs::create_dir_all(self.table_dir(table).join(SECTIONS_DIR)).await?;
        write_yaml(&self.section_path(table, &def.id), &def).await?;
        debug!(table = %table, section = %def.id, name = %def.name, "wrote section");
        Ok(def)
    }

    async fn delete_section(&self, table: &TableId, section_id: &SectionId) -> Result<()> {
        let path = self.section_path(table, section_id);
        if !fs::try_exists(&path).await? {
            return Err(SchemaError::not_found("section", section_id.as_str()));
        }
        fs::remove_file(&path).await?;
        debug!(table = %table, section = %section_id, "deleted section");
        Ok(())
    }

    async fn save_section_order(
        &self,
        table: &TableId,
        order: &[OrderEntry<SectionId>],
    ) -> Result<()> {
        for entry in order {
            let mut def = self.read_section(table, &entry.id).await?;
            def.order_index = Some(entry.order_index);
            write_yaml(&self.section_path(table, &entry.id), &def).await?;
        }
        Ok(())
    }

    async fn load_table_settings(&self, table: &TableId) -> Result<TableSettings> {
        Ok(self.read_meta(table).await?.settings)
    }

    async fn save_table_settings(&self, table: &TableId, settings: &TableSettings) -> Result<()> {
        let mut meta = self.read_meta(table).await?;
        meta.settings = settings.clone();
        write_yaml(&self.table_dir(table).join(TABLE_FILE), &meta).await
    }
}

#[async_trait]
impl TableCatalog for YamlBackend {
    async fn list_tables(&self) -> Result<Vec<TableSummary>> {
        let mut tables = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join(TABLE_FILE);
            if !fs::try_exists(&path).await? {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match serde_yaml_ng::from_str::<TableMeta>(&content) {
                Ok(meta) => tables.push(TableSummary {
                    id: meta.id,
                    name: meta.name,
                }),
                Err(e) => warn!(?path, %e, "skipping invalid table file"),
            }
        }
        tables.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(tables)
    }

    async fn list_fields_of(&self, table: &TableId) -> Result<Vec<FieldDef>> {
        self.load_fields(table).await
    }
}
