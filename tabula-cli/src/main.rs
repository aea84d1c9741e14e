//! Tabula CLI - schema editor for user-defined tables.
//!
//! Commands:
//! - `tabula table create <name>` / `tabula table list`
//! - `tabula field list|add|update|move|delete|check-type|candidates --table <t>`
//! - `tabula section list|move|reorder|update|delete --table <t>`
//! - `tabula primary set|show --table <t>`
//! - `tabula kinds`: List field kinds and their options
//!
//! Environment variables:
//! - TABULA_DATA_DIR: Override the data directory
//! - TABULA_DEFAULT_SECTION: Override the default section name
//! - RUST_LOG: Log filter when `--debug` is not given
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error (storage, configuration, not found)
//! - 2: Rejected change (validation or dependency)

mod cli;
mod commands;
mod render;

use clap::Parser;
use tabula_schema::SchemaError;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::Context;

/// Log filter used with `--debug`; covers the binary and every library crate.
const DEBUG_FILTER: &str = "tabula=debug,tabula_fields=debug,tabula_order=debug,tabula_schema=debug";

/// Map a command result to an exit code, printing the error.
fn handle_result(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<SchemaError>() {
        Some(e) if e.is_validation() || e.is_dependency() => 2,
        _ => 1,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Kinds = cli.command {
        return commands::run_kinds(cli.json);
    }

    let ctx = Context::open(cli.data_dir, cli.json).await?;
    match cli.command {
        Commands::Table { action } => commands::run_table(&ctx, action).await,
        Commands::Field { action } => commands::run_field(&ctx, action).await,
        Commands::Section { action } => commands::run_section(&ctx, action).await,
        Commands::Primary { action } => commands::run_primary(&ctx, action).await,
        Commands::Kinds => commands::run_kinds(cli.json),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = handle_result(run(cli).await);
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{FieldAction, PrimaryAction, SectionAction, TableAction};

    #[test]
    fn test_cli_parsing_table_create() {
        let cli = Cli::parse_from(["tabula", "table", "create", "Orders"]);
        match cli.command {
            Commands::Table {
                action: TableAction::Create { name },
            } => assert_eq!(name, "Orders"),
            _ => panic!("Expected Table Create command"),
        }
    }

    #[test]
    fn test_cli_parsing_global_flags() {
        let cli = Cli::parse_from([
            "tabula",
            "table",
            "list",
            "--json",
            "--data-dir",
            "/tmp/data",
            "--debug",
        ]);
        assert!(cli.json);
        assert!(cli.debug);
        assert_eq!(cli.data_dir.unwrap().to_str(), Some("/tmp/data"));
    }

    #[test]
    fn test_cli_parsing_field_add_with_choices() {
        let cli = Cli::parse_from([
            "tabula", "field", "add", "--table", "Orders", "Status", "--kind", "single_select",
            "--choice", "Open", "--choice", "Done", "--group", "Tracking",
        ]);
        match cli.command {
            Commands::Field {
                action:
                    FieldAction::Add {
                        table,
                        name,
                        kind,
                        group,
                        options,
                        required,
                    },
            } => {
                assert_eq!(table, "Orders");
                assert_eq!(name, "Status");
                assert_eq!(kind, "single_select");
                assert_eq!(group.as_deref(), Some("Tracking"));
                assert_eq!(options.choices, vec!["Open", "Done"]);
                assert!(!required);
            }
            _ => panic!("Expected Field Add command"),
        }
    }

    #[test]
    fn test_cli_parsing_field_add_lookup() {
        let cli = Cli::parse_from([
            "tabula",
            "field",
            "add",
            "-t",
            "Orders",
            "Customer Email",
            "-k",
            "lookup",
            "--lookup-via",
            "Customer",
            "--lookup-show",
            "Email",
        ]);
        match cli.command {
            Commands::Field {
                action: FieldAction::Add { options, .. },
            } => {
                assert_eq!(options.lookup_via.as_deref(), Some("Customer"));
                assert_eq!(options.lookup_show.as_deref(), Some("Email"));
            }
            _ => panic!("Expected Field Add command"),
        }
    }

    #[test]
    fn test_cli_parsing_field_move_before() {
        let cli = Cli::parse_from([
            "tabula", "field", "move", "-t", "Orders", "Amount", "--before", "Title",
        ]);
        match cli.command {
            Commands::Field {
                action:
                    FieldAction::Move {
                        field,
                        group,
                        ungroup,
                        position,
                        ..
                    },
            } => {
                assert_eq!(field, "Amount");
                assert!(group.is_none());
                assert!(!ungroup);
                assert_eq!(position.before.as_deref(), Some("Title"));
            }
            _ => panic!("Expected Field Move command"),
        }
    }

    #[test]
    fn test_cli_rejects_two_positions() {
        let result = Cli::try_parse_from([
            "tabula", "field", "move", "-t", "Orders", "Amount", "--before", "Title", "--index",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_group_with_ungroup() {
        let result = Cli::try_parse_from([
            "tabula", "field", "move", "-t", "Orders", "Amount", "--group", "Billing",
            "--ungroup",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parsing_section_reorder() {
        let cli = Cli::parse_from([
            "tabula", "section", "reorder", "-t", "Orders", "Shipping", "Billing",
        ]);
        match cli.command {
            Commands::Section {
                action: SectionAction::Reorder { sections, .. },
            } => assert_eq!(sections, vec!["Shipping", "Billing"]),
            _ => panic!("Expected Section Reorder command"),
        }
    }

    #[test]
    fn test_cli_section_reorder_requires_names() {
        let result = Cli::try_parse_from(["tabula", "section", "reorder", "-t", "Orders"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parsing_primary_set() {
        let cli = Cli::parse_from(["tabula", "primary", "set", "-t", "Orders", "auto"]);
        match cli.command {
            Commands::Primary {
                action: PrimaryAction::Set { selection, .. },
            } => assert_eq!(selection, "auto"),
            _ => panic!("Expected Primary Set command"),
        }
    }

    #[test]
    fn test_cli_parsing_kinds() {
        let cli = Cli::parse_from(["tabula", "kinds"]);
        assert!(matches!(cli.command, Commands::Kinds));
    }

    #[test]
    fn test_debug_filter_covers_library_crates() {
        for target in ["tabula", "tabula_fields", "tabula_order", "tabula_schema"] {
            assert!(DEBUG_FILTER.contains(&format!("{target}=debug")), "{target}");
        }
        assert!(EnvFilter::try_new(DEBUG_FILTER).is_ok());
    }

    #[test]
    fn test_exit_codes() {
        let rejected = anyhow::Error::new(SchemaError::validation("name", "blank"));
        assert_eq!(exit_code_for(&rejected), 2);

        let missing = anyhow::Error::new(SchemaError::not_found("table", "ghost"));
        assert_eq!(exit_code_for(&missing), 1);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), 1);
    }
}
