//! Terminal and JSON output.
//!
//! Tables respect the terminal width and fall back to 120 columns when not
//! connected to a TTY.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tabula_fields::{FieldDef, FieldKind, KindDescriptor, TypeChange};
use tabula_schema::{FieldSchemaStore, InvalidLookup, PrimaryDisplay, TableSummary};

fn new_table() -> Table {
    let width = crossterm::terminal::size()
        .map(|(w, _)| w)
        .unwrap_or(120);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width);
    table
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Short summary of the kind-specific options of a field.
fn options_summary(field: &FieldDef) -> String {
    let o = &field.options;
    let mut parts = Vec::new();
    if !o.choices.is_empty() {
        parts.push(format!("choices: {}", o.choices.join(", ")));
    }
    if let Some(formula) = &o.formula {
        parts.push(format!("= {formula}"));
    }
    if let Some(table) = &o.linked_table_id {
        parts.push(format!("-> {table}"));
    }
    if let (Some(via), Some(show)) = (&o.lookup_field_id, &o.lookup_result_field_id) {
        parts.push(format!("via {via} show {show}"));
    }
    if let Some(precision) = o.precision {
        parts.push(format!("precision {precision}"));
    }
    if let Some(symbol) = &o.currency_symbol {
        parts.push(format!("symbol {symbol}"));
    }
    parts.join("; ")
}

fn kind_label(kind: FieldKind) -> String {
    if kind.is_virtual() {
        format!("{kind} (virtual)")
    } else {
        kind.to_string()
    }
}

pub fn table_created(table: &TableSummary, json: bool) -> Result<()> {
    if json {
        return print_json(table);
    }
    println!("Created table '{}' ({})", table.name, table.id);
    Ok(())
}

pub fn tables(tables: &[TableSummary], json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "tables": tables }));
    }
    if tables.is_empty() {
        println!("No tables. Create one with `tabula table create <name>`.");
        return Ok(());
    }
    let mut table = new_table();
    table.set_header(vec!["Name", "Id"]);
    for t in tables {
        table.add_row(vec![t.name.clone(), t.id.to_string()]);
    }
    println!("{table}");
    Ok(())
}

/// Every field of a table, section by section, followed by broken lookups.
pub fn fields(store: &FieldSchemaStore, invalid: &[InvalidLookup], json: bool) -> Result<()> {
    let sections = store.sections();
    if json {
        let entries: Vec<serde_json::Value> = sections
            .iter()
            .map(|s| {
                serde_json::json!({
                    "section": s.name(),
                    "virtual": s.is_virtual(),
                    "fields": store.fields_in_section(s.name()),
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "sections": entries,
            "invalid_lookups": invalid,
        }));
    }

    let mut table = new_table();
    table.set_header(vec!["Section", "#", "Field", "Kind", "Required", "Options"]);
    for section in &sections {
        for field in store.fields_in_section(section.name()) {
            table.add_row(vec![
                section.display_name().to_string(),
                field
                    .order_index
                    .map(|i| i.to_string())
                    .unwrap_or_default(),
                field.display_name().to_string(),
                kind_label(field.kind),
                if field.required { "yes" } else { "" }.to_string(),
                options_summary(&field),
            ]);
        }
    }
    println!("{table}");
    for lookup in invalid {
        println!("{}", invalid_lookup_line(lookup));
    }
    Ok(())
}

fn invalid_lookup_line(lookup: &InvalidLookup) -> String {
    format!("warning: lookup '{}' is invalid: {}", lookup.field.name, lookup.reason)
}

pub fn field(field: &FieldDef, json: bool) -> Result<()> {
    if json {
        return print_json(field);
    }
    println!("{} [{}] {}", field.name, kind_label(field.kind), field.id);
    let options = options_summary(field);
    if !options.is_empty() {
        println!("  {options}");
    }
    Ok(())
}

/// A flat list of fields, in the order given.
pub fn field_list(fields: &[FieldDef], json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "fields": fields }));
    }
    let mut table = new_table();
    table.set_header(vec!["Field", "Kind", "Id"]);
    for f in fields {
        table.add_row(vec![f.name.clone(), kind_label(f.kind), f.id.to_string()]);
    }
    println!("{table}");
    Ok(())
}

pub fn sections(store: &FieldSchemaStore, json: bool) -> Result<()> {
    let sections = store.sections();
    if json {
        return print_json(&serde_json::json!({ "sections": sections }));
    }
    let mut table = new_table();
    table.set_header(vec!["Section", "Fields", "Stored", "Collapsed", "Visible"]);
    for section in &sections {
        let stored = if section.is_virtual() { "no" } else { "yes" };
        table.add_row(vec![
            section.display_name().to_string(),
            store.fields_in_section(section.name()).len().to_string(),
            stored.to_string(),
            section.default_collapsed().to_string(),
            section.default_visible().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn type_change(change: &TypeChange, json: bool) -> Result<()> {
    if json {
        return print_json(change);
    }
    let verdict = if change.can_change { "allowed" } else { "blocked" };
    match &change.warning {
        Some(warning) => println!("{verdict}: {warning}"),
        None => println!("{verdict}"),
    }
    Ok(())
}

pub fn primary(display: &PrimaryDisplay, json: bool) -> Result<()> {
    let (mode, field) = match display {
        PrimaryDisplay::Id => ("id", None),
        PrimaryDisplay::Field(f) => ("field", Some(f)),
        PrimaryDisplay::None => ("none", None),
    };
    if json {
        return print_json(&serde_json::json!({
            "mode": mode,
            "field": field.map(|f| serde_json::json!({ "id": f.id, "name": f.name })),
        }));
    }
    match field {
        Some(f) => println!("{} ({})", f.display_name(), f.id),
        None if mode == "id" => println!("record id"),
        None => println!("no eligible field"),
    }
    Ok(())
}

pub fn kinds(descriptors: &[KindDescriptor], json: bool) -> Result<()> {
    if json {
        return print_json(descriptors);
    }
    let mut table = new_table();
    table.set_header(vec!["Kind", "Storage", "Options"]);
    for d in descriptors {
        let storage = serde_json::to_value(d.storage)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let options: Vec<String> = d
            .option_schema
            .iter()
            .map(|o| {
                if o.required {
                    format!("{}*", o.key)
                } else {
                    o.key.to_string()
                }
            })
            .collect();
        table.add_row(vec![kind_label(d.kind), storage, options.join(", ")]);
    }
    println!("{table}");
    println!("* required");
    Ok(())
}

pub fn done(message: &str, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "ok": true, "message": message }));
    }
    println!("{message}");
    Ok(())
}
