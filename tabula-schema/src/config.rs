//! Configuration for the schema store.
//!
//! Sources are merged in precedence order, later overriding earlier:
//! 1. Built-in defaults
//! 2. `tabula.toml` in the working directory
//! 3. `tabula.yaml` in the working directory
//! 4. `TABULA_*` environment variables

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SchemaError};

/// Name of the protected section that holds ungrouped fields.
pub const DEFAULT_SECTION: &str = "General";

const DEFAULT_DATA_DIR: &str = ".tabula";

/// Settings shared by the store and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub default_section: String,
    pub data_dir: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            default_section: DEFAULT_SECTION.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl SchemaConfig {
    /// Load from the current directory and environment.
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::load_from(&cwd)
    }

    /// Load with config files looked up in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(SchemaConfig::default()))
            .merge(Toml::file(dir.join("tabula.toml")))
            .merge(Yaml::file(dir.join("tabula.yaml")))
            .merge(Env::prefixed("TABULA_"));

        let config: SchemaConfig = figment.extract()?;
        config.validate()?;
        debug!(
            default_section = %config.default_section,
            data_dir = %config.data_dir.display(),
            "loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_section.trim().is_empty() {
            return Err(SchemaError::validation(
                "default_section",
                "the default section name cannot be blank",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn defaults_without_files() {
        let temp = TempDir::new().unwrap();
        let config = SchemaConfig::load_from(temp.path()).unwrap();
        assert_eq!(config, SchemaConfig::default());
    }

    #[test]
    #[serial]
    fn yaml_overrides_toml() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("tabula.toml"),
            "default_section = \"Main\"\ndata_dir = \"toml-data\"\n",
        )
        .unwrap();
        fs::write(temp.path().join("tabula.yaml"), "default_section: Overview\n").unwrap();

        let config = SchemaConfig::load_from(temp.path()).unwrap();
        assert_eq!(config.default_section, "Overview");
        assert_eq!(config.data_dir, PathBuf::from("toml-data"));
    }

    #[test]
    #[serial]
    fn environment_overrides_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("tabula.toml"), "default_section = \"Main\"\n").unwrap();

        std::env::set_var("TABULA_DEFAULT_SECTION", "Basics");
        let config = SchemaConfig::load_from(temp.path());
        std::env::remove_var("TABULA_DEFAULT_SECTION");

        assert_eq!(config.unwrap().default_section, "Basics");
    }

    #[test]
    #[serial]
    fn blank_default_section_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("tabula.toml"), "default_section = \"  \"\n").unwrap();
        let err = SchemaConfig::load_from(temp.path()).unwrap_err();
        assert!(err.is_validation());
    }
}
