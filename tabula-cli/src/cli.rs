//! CLI definition for the Tabula command-line interface.
//!
//! This module only depends on `clap` and `std`, so the argument surface can
//! be tested without touching a data directory.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Tabula - schema editor for user-defined tables.
///
/// Manages the fields of each table, the sections that group them and the
/// field that identifies a record. Everything lives as YAML under the data
/// directory (`.tabula/` by default).
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(version)]
#[command(about = "Schema editor for user-defined tables")]
#[command(
    long_about = "Tabula edits the schema of user-defined tables: typed fields, the sections \
    that group them and the primary display field.\n\n\
    Configuration is read from tabula.toml and tabula.yaml in the current directory.\n\n\
    Environment variables:\n  \
    TABULA_DATA_DIR         Override the data directory\n  \
    TABULA_DEFAULT_SECTION  Override the name of the default section"
)]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Data directory (overrides configuration)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create and list tables
    Table {
        #[command(subcommand)]
        action: TableAction,
    },

    /// Add, edit, move and remove fields
    Field {
        #[command(subcommand)]
        action: FieldAction,
    },

    /// List, reorder, rename and remove sections
    Section {
        #[command(subcommand)]
        action: SectionAction,
    },

    /// Choose or show the primary display field
    Primary {
        #[command(subcommand)]
        action: PrimaryAction,
    },

    /// List the available field kinds and their options
    Kinds,
}

#[derive(Subcommand, Debug)]
pub enum TableAction {
    /// Create a new empty table
    Create {
        /// Table name
        name: String,
    },
    /// List tables
    List,
}

#[derive(Subcommand, Debug)]
pub enum FieldAction {
    /// List fields in display order, grouped by section
    List {
        /// Table name or id
        #[arg(short, long)]
        table: String,
    },

    /// Add a field to the end of its section
    Add {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Field name
        name: String,
        /// Field kind (see `tabula kinds`)
        #[arg(short, long)]
        kind: String,
        /// Section to place the field in (default section when omitted)
        #[arg(short, long)]
        group: Option<String>,
        #[command(flatten)]
        options: OptionArgs,
        /// Mark the field as required
        #[arg(long)]
        required: bool,
    },

    /// Change the name, kind or options of a field
    Update {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Current field name
        field: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// New kind
        #[arg(short, long)]
        kind: Option<String>,
        #[command(flatten)]
        options: OptionArgs,
        /// Set or clear the required flag
        #[arg(long)]
        required: Option<bool>,
    },

    /// Move a field within its section or into another one
    Move {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Field name
        field: String,
        /// Target section
        #[arg(short, long, conflicts_with = "ungroup")]
        group: Option<String>,
        /// Move into the default section
        #[arg(long)]
        ungroup: bool,
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Delete a field
    Delete {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Field name
        field: String,
    },

    /// Report whether a field may change to another kind
    CheckType {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Field name
        field: String,
        /// Proposed kind
        kind: String,
    },

    /// List fields a lookup through the given link field may show
    Candidates {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Link field name
        link: String,
    },
}

/// Kind-specific options shared by `field add` and `field update`.
#[derive(Args, Debug, Default, Clone)]
pub struct OptionArgs {
    /// Allowed value of a select field (repeatable)
    #[arg(long = "choice", value_name = "VALUE")]
    pub choices: Vec<String>,
    /// Upper bound on selected values or linked records
    #[arg(long)]
    pub max_selections: Option<u32>,
    /// Formula expression, references written as {Field Name}
    #[arg(long)]
    pub formula: Option<String>,
    /// Table (name or id) a link field points at
    #[arg(long, value_name = "TABLE")]
    pub link_table: Option<String>,
    /// How many records a link may point at
    #[arg(long, value_enum)]
    pub cardinality: Option<CardinalityArg>,
    /// Link field a lookup reads through
    #[arg(long, value_name = "LINK_FIELD")]
    pub lookup_via: Option<String>,
    /// Field of the linked table a lookup shows
    #[arg(long, value_name = "FIELD")]
    pub lookup_show: Option<String>,
    /// Decimal places of a number, currency or percent field
    #[arg(long)]
    pub precision: Option<u8>,
    /// Symbol of a currency field
    #[arg(long)]
    pub currency_symbol: Option<String>,
    /// Display format of a date field
    #[arg(long)]
    pub date_format: Option<String>,
}

impl OptionArgs {
    /// True when no option flag was given.
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
            && self.max_selections.is_none()
            && self.formula.is_none()
            && self.link_table.is_none()
            && self.cardinality.is_none()
            && self.lookup_via.is_none()
            && self.lookup_show.is_none()
            && self.precision.is_none()
            && self.currency_symbol.is_none()
            && self.date_format.is_none()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityArg {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// Where a moved item lands. With no flag it goes to the end.
#[derive(Args, Debug, Default, Clone)]
#[group(multiple = false)]
pub struct PositionArgs {
    /// Place before this sibling
    #[arg(long, value_name = "NAME")]
    pub before: Option<String>,
    /// Place after this sibling
    #[arg(long, value_name = "NAME")]
    pub after: Option<String>,
    /// Place at this position (0-based)
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum SectionAction {
    /// List sections in display order
    List {
        /// Table name or id
        #[arg(short, long)]
        table: String,
    },

    /// Move one section
    Move {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Section name
        section: String,
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Put sections in the given order; unnamed sections keep their place after them
    Reorder {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Section names in the wanted order
        #[arg(required = true)]
        sections: Vec<String>,
    },

    /// Rename a section or change how it is shown
    Update {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Section name
        section: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// Label shown instead of the name
        #[arg(long)]
        label: Option<String>,
        /// Start collapsed
        #[arg(long)]
        collapsed: Option<bool>,
        /// Show the section
        #[arg(long)]
        visible: Option<bool>,
    },

    /// Delete a section; its fields move to the default section
    Delete {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// Section name
        section: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrimaryAction {
    /// Choose the primary field: `auto`, `id` or a field name
    Set {
        /// Table name or id
        #[arg(short, long)]
        table: String,
        /// `auto`, `id` or a field name
        selection: String,
    },
    /// Show the effective primary field
    Show {
        /// Table name or id
        #[arg(short, long)]
        table: String,
    },
}
