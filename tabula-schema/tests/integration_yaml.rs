//! Integration tests for the store over the YAML file backend

use std::sync::Arc;

use tabula_fields::{FieldDraft, FieldKind, FieldOptions};
use tabula_order::Anchor;
use tabula_schema::{FieldSchemaStore, PrimaryDisplay, TableCatalog, YamlBackend};
use tempfile::TempDir;

#[tokio::test]
async fn test_schema_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join(".tabula");
    let backend = Arc::new(YamlBackend::open(&data).await.unwrap());
    let orders = backend.create_table("Orders").await.unwrap();
    let customers = backend.create_table("Customers").await.unwrap();

    let mut customer_store = FieldSchemaStore::open(customers.id.clone(), backend.clone())
        .build()
        .await
        .unwrap();
    let email = customer_store
        .create_field(FieldDraft::new("Email", FieldKind::Text))
        .await
        .unwrap();

    let mut store = FieldSchemaStore::open(orders.id.clone(), backend.clone())
        .build()
        .await
        .unwrap();
    let title = store
        .create_field(FieldDraft::new("Title", FieldKind::Text))
        .await
        .unwrap();
    let customer = store
        .create_field(
            FieldDraft::new("Customer", FieldKind::Link).with_options(FieldOptions {
                linked_table_id: Some(customers.id.clone()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    store
        .create_field(
            FieldDraft::new("Customer Email", FieldKind::Lookup)
                .with_group("Contact")
                .with_options(FieldOptions {
                    lookup_field_id: Some(customer.id.clone()),
                    lookup_result_field_id: Some(email.id.clone()),
                    ..Default::default()
                }),
        )
        .await
        .unwrap();
    store
        .move_field(&customer.id, None, Anchor::Before(title.id.clone()))
        .await
        .unwrap();
    store.select_primary_field("Title").await.unwrap();

    // a fresh backend over the same directory sees everything
    let reopened = Arc::new(YamlBackend::open(&data).await.unwrap());
    let tables: Vec<String> = reopened
        .list_tables()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tables, vec!["Customers", "Orders"]);

    let store = FieldSchemaStore::open(orders.id.clone(), reopened)
        .build()
        .await
        .unwrap();
    let names: Vec<String> = store.list_fields().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["Customer", "Customer Email", "Title"]);

    let sections: Vec<String> = store
        .sections()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(sections, vec!["General", "Contact"]);
    assert!(!store.section("Contact").unwrap().is_virtual());

    match store.primary_field() {
        PrimaryDisplay::Field(field) => assert_eq!(field.id, title.id),
        other => panic!("expected Title as primary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_field_files_are_named_by_id() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(YamlBackend::open(temp.path()).await.unwrap());
    let table = backend.create_table("Orders").await.unwrap();

    let mut store = FieldSchemaStore::open(table.id.clone(), backend.clone())
        .build()
        .await
        .unwrap();
    let field = store
        .create_field(FieldDraft::new("Title", FieldKind::Text))
        .await
        .unwrap();

    let path = temp
        .path()
        .join(table.id.as_str())
        .join("fields")
        .join(format!("{}.yaml", field.id));
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("name: Title"));
    assert!(content.contains("kind: text"));

    store.delete_field(&field.id).await.unwrap();
    assert!(!path.exists());
}
