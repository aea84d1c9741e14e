//! Command handlers.
//!
//! Each handler opens the store for one table over the YAML backend, runs a
//! single schema operation and renders the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use tabula_fields::{
    describe_kind, Cardinality, FieldDef, FieldDraft, FieldKind, FieldOptions, FieldPatch,
};
use tabula_order::Anchor;
use tabula_schema::{
    FieldSchemaStore, SchemaConfig, SchemaError, SectionPatch, TableCatalog, TableSummary,
    YamlBackend,
};
use tracing::debug;

use crate::cli::{
    CardinalityArg, FieldAction, OptionArgs, PositionArgs, PrimaryAction, SectionAction,
    TableAction,
};
use crate::render;

/// Shared state of one invocation.
pub struct Context {
    backend: Arc<YamlBackend>,
    config: SchemaConfig,
    json: bool,
}

impl Context {
    /// Load configuration from the working directory and open the data dir.
    pub async fn open(data_dir: Option<PathBuf>, json: bool) -> Result<Self> {
        let mut config = SchemaConfig::load().context("failed to load configuration")?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        debug!(data_dir = %config.data_dir.display(), "opening data directory");
        let backend = Arc::new(YamlBackend::open(&config.data_dir).await?);
        Ok(Self {
            backend,
            config,
            json,
        })
    }

    /// Find a table by id, then by case-insensitive name.
    async fn find_table(&self, needle: &str) -> Result<TableSummary> {
        let tables = self.backend.list_tables().await?;
        let needle = needle.trim();
        tables
            .iter()
            .find(|t| t.id.as_str() == needle)
            .or_else(|| tables.iter().find(|t| t.name.eq_ignore_ascii_case(needle)))
            .cloned()
            .ok_or_else(|| SchemaError::not_found("table", needle).into())
    }

    async fn store(&self, table: &str) -> Result<FieldSchemaStore> {
        let table = self.find_table(table).await?;
        let store = FieldSchemaStore::open(table.id, self.backend.clone())
            .with_config(&self.config)
            .build()
            .await?;
        Ok(store)
    }
}

fn field_named<'a>(store: &'a FieldSchemaStore, name: &str) -> Result<&'a FieldDef> {
    store
        .field_by_name(name)
        .ok_or_else(|| SchemaError::not_found("field", name).into())
}

fn parse_kind(name: &str) -> Result<FieldKind> {
    Ok(name.parse::<FieldKind>().map_err(SchemaError::from)?)
}

impl From<CardinalityArg> for Cardinality {
    fn from(arg: CardinalityArg) -> Self {
        match arg {
            CardinalityArg::OneToOne => Cardinality::OneToOne,
            CardinalityArg::OneToMany => Cardinality::OneToMany,
            CardinalityArg::ManyToMany => Cardinality::ManyToMany,
        }
    }
}

/// Overlay option flags onto `base`, resolving table and field names.
async fn merge_options(
    ctx: &Context,
    store: &FieldSchemaStore,
    args: &OptionArgs,
    mut base: FieldOptions,
) -> Result<FieldOptions> {
    if !args.choices.is_empty() {
        base.choices = args.choices.clone();
    }
    if let Some(max) = args.max_selections {
        base.max_selections = Some(max);
    }
    if let Some(formula) = &args.formula {
        base.formula = Some(formula.clone());
    }
    if let Some(table) = &args.link_table {
        base.linked_table_id = Some(ctx.find_table(table).await?.id);
    }
    if let Some(cardinality) = args.cardinality {
        base.cardinality = Some(cardinality.into());
    }
    if let Some(precision) = args.precision {
        base.precision = Some(precision);
    }
    if let Some(symbol) = &args.currency_symbol {
        base.currency_symbol = Some(symbol.clone());
    }
    if let Some(format) = &args.date_format {
        base.date_format = Some(format.clone());
    }

    if let Some(via) = &args.lookup_via {
        let link = field_named(store, via)?;
        base.lookup_field_id = Some(link.id.clone());
    }
    if let Some(show) = &args.lookup_show {
        let Some(link_id) = base.lookup_field_id.clone() else {
            bail!(SchemaError::validation(
                "lookup_show",
                "--lookup-show needs a link field (--lookup-via)"
            ));
        };
        let candidates = store.result_field_candidates(&link_id).await?;
        let result = candidates
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(show))
            .ok_or_else(|| SchemaError::not_found("lookup result field", show))?;
        base.lookup_result_field_id = Some(result.id.clone());
    }
    Ok(base)
}

fn anchor_for<I>(
    position: &PositionArgs,
    resolve: impl Fn(&str) -> Result<I>,
) -> Result<Anchor<I>> {
    Ok(if let Some(name) = &position.before {
        Anchor::Before(resolve(name)?)
    } else if let Some(name) = &position.after {
        Anchor::After(resolve(name)?)
    } else if let Some(index) = position.index {
        Anchor::Index(index)
    } else {
        Anchor::End
    })
}

pub async fn run_table(ctx: &Context, action: TableAction) -> Result<()> {
    match action {
        TableAction::Create { name } => {
            let table = ctx.backend.create_table(&name).await?;
            render::table_created(&table, ctx.json)
        }
        TableAction::List => {
            let tables = ctx.backend.list_tables().await?;
            render::tables(&tables, ctx.json)
        }
    }
}

pub async fn run_field(ctx: &Context, action: FieldAction) -> Result<()> {
    match action {
        FieldAction::List { table } => {
            let store = ctx.store(&table).await?;
            let invalid = store.invalid_lookups().await?;
            render::fields(&store, &invalid, ctx.json)
        }

        FieldAction::Add {
            table,
            name,
            kind,
            group,
            options,
            required,
        } => {
            let mut store = ctx.store(&table).await?;
            let kind = parse_kind(&kind)?;
            let options = merge_options(ctx, &store, &options, FieldOptions::default()).await?;
            let mut draft = FieldDraft::new(name, kind).with_options(options);
            if let Some(group) = group {
                draft = draft.with_group(group);
            }
            if required {
                draft = draft.required();
            }
            let field = store.create_field(draft).await?;
            render::field(&field, ctx.json)
        }

        FieldAction::Update {
            table,
            field,
            rename,
            kind,
            options,
            required,
        } => {
            let mut store = ctx.store(&table).await?;
            let current = field_named(&store, &field)?.clone();

            let mut patch = FieldPatch::default();
            if let Some(name) = rename {
                patch = patch.with_name(name);
            }
            if let Some(kind) = kind {
                patch = patch.with_kind(parse_kind(&kind)?);
            }
            if !options.is_empty() {
                let merged = merge_options(ctx, &store, &options, current.options.clone()).await?;
                patch = patch.with_options(merged);
            }
            patch.required = required;
            if patch.is_empty() {
                bail!(SchemaError::validation(
                    "field",
                    "nothing to update; pass --rename, --kind, --required or an option flag"
                ));
            }

            let updated = store.update_field(&current.id, patch).await?;
            render::field(&updated, ctx.json)
        }

        FieldAction::Move {
            table,
            field,
            group,
            ungroup,
            position,
        } => {
            let mut store = ctx.store(&table).await?;
            let current = field_named(&store, &field)?.clone();
            let target = if ungroup {
                None
            } else {
                group.or_else(|| current.group_name.clone())
            };

            let anchor = anchor_for(&position, |name| Ok(field_named(&store, name)?.id.clone()))?;

            let plan = store
                .move_field(&current.id, target.as_deref(), anchor)
                .await?;
            debug!(field = %current.id, updates = plan.len(), "field moved");
            let invalid = store.invalid_lookups().await?;
            render::fields(&store, &invalid, ctx.json)
        }

        FieldAction::Delete { table, field } => {
            let mut store = ctx.store(&table).await?;
            let current = field_named(&store, &field)?.clone();
            store.delete_field(&current.id).await?;
            render::done(&format!("Deleted field '{}'", current.name), ctx.json)
        }

        FieldAction::CheckType { table, field, kind } => {
            let store = ctx.store(&table).await?;
            let current = field_named(&store, &field)?;
            let change = store.check_type_change(&current.id, parse_kind(&kind)?)?;
            render::type_change(&change, ctx.json)
        }

        FieldAction::Candidates { table, link } => {
            let store = ctx.store(&table).await?;
            let link = field_named(&store, &link)?;
            let candidates = store.result_field_candidates(&link.id).await?;
            render::field_list(&candidates, ctx.json)
        }
    }
}

pub async fn run_section(ctx: &Context, action: SectionAction) -> Result<()> {
    match action {
        SectionAction::List { table } => {
            let store = ctx.store(&table).await?;
            render::sections(&store, ctx.json)
        }

        SectionAction::Move {
            table,
            section,
            position,
        } => {
            let mut store = ctx.store(&table).await?;
            let anchor = anchor_for(&position, |name| Ok(name.to_string()))?;
            store.move_section(&section, anchor).await?;
            render::sections(&store, ctx.json)
        }

        SectionAction::Reorder { table, sections } => {
            let mut store = ctx.store(&table).await?;
            store.reorder_sections(&sections).await?;
            render::sections(&store, ctx.json)
        }

        SectionAction::Update {
            table,
            section,
            rename,
            label,
            collapsed,
            visible,
        } => {
            let mut store = ctx.store(&table).await?;
            let mut patch = SectionPatch {
                name: rename,
                ..Default::default()
            };
            if let Some(label) = label {
                let label = (!label.trim().is_empty()).then_some(label);
                patch = patch.with_display_name(label);
            }
            if let Some(collapsed) = collapsed {
                patch = patch.collapsed(collapsed);
            }
            if let Some(visible) = visible {
                patch = patch.visible(visible);
            }
            let def = store.update_section(&section, patch).await?;
            render::done(&format!("Updated section '{}'", def.display_name()), ctx.json)
        }

        SectionAction::Delete { table, section } => {
            let mut store = ctx.store(&table).await?;
            store.delete_section(&section).await?;
            render::done(&format!("Deleted section '{section}'"), ctx.json)
        }
    }
}

pub async fn run_primary(ctx: &Context, action: PrimaryAction) -> Result<()> {
    match action {
        PrimaryAction::Set { table, selection } => {
            let mut store = ctx.store(&table).await?;
            store.select_primary_field(&selection).await?;
            render::primary(&store.primary_field(), ctx.json)
        }
        PrimaryAction::Show { table } => {
            let store = ctx.store(&table).await?;
            render::primary(&store.primary_field(), ctx.json)
        }
    }
}

/// Print the kind registry. Needs no data directory.
pub fn run_kinds(json: bool) -> Result<()> {
    let descriptors = FieldKind::ALL
        .iter()
        .map(|kind| describe_kind(kind.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(SchemaError::from)?;
    render::kinds(&descriptors, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CardinalityArg;

    #[test]
    fn test_parse_kind_accepts_dashes() {
        assert_eq!(parse_kind("single-select").unwrap(), FieldKind::SingleSelect);
        assert!(parse_kind("spreadsheet").is_err());
    }

    #[test]
    fn test_cardinality_conversion() {
        assert_eq!(
            Cardinality::from(CardinalityArg::ManyToMany),
            Cardinality::ManyToMany
        );
    }

    #[test]
    fn test_anchor_defaults_to_end() {
        let anchor: Anchor<String> =
            anchor_for(&PositionArgs::default(), |n| Ok(n.to_string())).unwrap();
        assert_eq!(anchor, Anchor::End);

        let position = PositionArgs {
            before: Some("Billing".into()),
            ..Default::default()
        };
        let anchor = anchor_for(&position, |n| Ok(n.to_uppercase())).unwrap();
        assert_eq!(anchor, Anchor::Before("BILLING".to_string()));
    }
}
