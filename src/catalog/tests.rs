use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::TempDir;

use crate::schema::{ColumnKind, ColumnSpec, SchemaDefinition};

use super::*;

fn column(name: &str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        kind,
        default: None,
    }
}

fn small_schema() -> Arc<SchemaDefinition> {
    Arc::new(
        SchemaDefinition::new(
            vec![
                column("id", ColumnKind::AutoKey),
                column("name", ColumnKind::Text),
                column("filepath", ColumnKind::Text),
                column("laser_wavelength", ColumnKind::Integer),
            ],
            vec![],
            vec!["name".to_string()],
        )
        .unwrap(),
    )
}

fn grown_schema() -> Arc<SchemaDefinition> {
    Arc::new(
        SchemaDefinition::new(
            vec![
                column("id", ColumnKind::AutoKey),
                column("name", ColumnKind::Text),
                column("filepath", ColumnKind::Text),
                column("laser_wavelength", ColumnKind::Integer),
                column("tfp_range", ColumnKind::Real),
                column("sample", ColumnKind::Text),
            ],
            vec![],
            vec!["name".to_string()],
        )
        .unwrap(),
    )
}

fn text(value: &str) -> CatalogValue {
    CatalogValue::Text(value.to_string())
}

#[test]
fn test_insert_applies_documented_defaults() {
    let catalog = CatalogStore::in_memory(Arc::new(SchemaDefinition::standard())).unwrap();

    let mut supplied = BTreeMap::new();
    supplied.insert("name".to_string(), text("gel1"));
    supplied.insert("filepath".to_string(), text("/tmp/gel1.bls"));
    let row = catalog.insert_row(&supplied).unwrap();

    assert_eq!(row.id(), Some(1));
    assert_eq!(row.name(), Some("gel1"));
    assert_eq!(row.get("sample"), Some(&text("Not specified")));
    assert_eq!(row.get("laser_wavelength"), Some(&CatalogValue::Integer(0)));
    assert_eq!(row.get("scattering_angle"), Some(&CatalogValue::Real(180.0)));
    assert_eq!(row.get("info"), Some(&text("")));
}

#[test]
fn test_name_existence_check() {
    let catalog = CatalogStore::in_memory(small_schema()).unwrap();
    let mut supplied = BTreeMap::new();
    supplied.insert("name".to_string(), text("m1"));
    supplied.insert("filepath".to_string(), text("/tmp/m1.bls"));
    catalog.insert_row(&supplied).unwrap();

    assert!(catalog.name_exists("m1").unwrap());
    assert!(!catalog.name_exists("m2").unwrap());
}

#[test]
fn test_insert_rejects_unknown_and_auto_key_columns() {
    let catalog = CatalogStore::in_memory(small_schema()).unwrap();

    let mut unknown = BTreeMap::new();
    unknown.insert("nope".to_string(), text("x"));
    assert!(matches!(
        catalog.insert_row(&unknown),
        Err(CatalogError::UnknownColumn { .. })
    ));

    let mut auto = BTreeMap::new();
    auto.insert("id".to_string(), CatalogValue::Integer(7));
    assert!(matches!(
        catalog.insert_row(&auto),
        Err(CatalogError::UnknownColumn { .. })
    ));
}

#[test]
fn test_update_and_delete_by_filepath() {
    let catalog = CatalogStore::in_memory(small_schema()).unwrap();
    let mut supplied = BTreeMap::new();
    supplied.insert("name".to_string(), text("m1"));
    supplied.insert("filepath".to_string(), text("/tmp/m1.bls"));
    catalog.insert_row(&supplied).unwrap();

    let mut update = BTreeMap::new();
    update.insert("laser_wavelength".to_string(), CatalogValue::Integer(660));
    catalog.update_by_filepath("/tmp/m1.bls", &update).unwrap();

    let row = catalog.find_by_filepath("/tmp/m1.bls").unwrap().unwrap();
    assert_eq!(row.get("laser_wavelength"), Some(&CatalogValue::Integer(660)));

    assert!(matches!(
        catalog.update_by_filepath("/tmp/other.bls", &update),
        Err(CatalogError::RowNotFound { .. })
    ));

    catalog.delete_by_filepath("/tmp/m1.bls").unwrap();
    assert!(catalog.find_by_filepath("/tmp/m1.bls").unwrap().is_none());
    assert!(matches!(
        catalog.delete_by_filepath("/tmp/m1.bls"),
        Err(CatalogError::RowNotFound { .. })
    ));
}

#[test]
fn test_additive_migration_preserves_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.db");

    {
        let catalog = CatalogStore::create(&path, small_schema()).unwrap();
        let mut supplied = BTreeMap::new();
        supplied.insert("name".to_string(), text("m1"));
        supplied.insert("filepath".to_string(), text("/tmp/m1.bls"));
        supplied.insert("laser_wavelength".to_string(), CatalogValue::Integer(532));
        catalog.insert_row(&supplied).unwrap();
    }

    let (catalog, sync) = CatalogStore::open(&path, grown_schema()).unwrap();
    assert_eq!(
        sync,
        SchemaSync::ColumnsAdded(vec!["tfp_range".to_string(), "sample".to_string()])
    );

    // Old cells untouched, new cells absent.
    let rows = catalog.fetch_all().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.name(), Some("m1"));
    assert_eq!(row.get("laser_wavelength"), Some(&CatalogValue::Integer(532)));
    assert_eq!(row.get("tfp_range"), Some(&CatalogValue::Null));
    assert_eq!(row.get("sample"), Some(&CatalogValue::Null));

    // Second open is a no-op.
    drop(catalog);
    let (_, sync) = CatalogStore::open(&path, grown_schema()).unwrap();
    assert_eq!(sync, SchemaSync::UpToDate);
}

#[test]
fn test_non_additive_drift_is_surfaced_not_repaired() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.db");

    {
        CatalogStore::create(&path, grown_schema()).unwrap();
    }

    // Opening with a schema that lacks live columns must not drop them.
    match CatalogStore::open(&path, small_schema()) {
        Err(CatalogError::SchemaInconsistency { columns }) => {
            assert!(columns.contains("sample"));
            assert!(columns.contains("tfp_range"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected SchemaInconsistency"),
    }

    // And the original schema still opens cleanly afterwards.
    let (_, sync) = CatalogStore::open(&path, grown_schema()).unwrap();
    assert_eq!(sync, SchemaSync::UpToDate);
}

#[test]
fn test_open_missing_file_creates_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.db");

    let (catalog, sync) = CatalogStore::open(&path, small_schema()).unwrap();
    assert_eq!(sync, SchemaSync::Created);
    assert!(catalog.fetch_all().unwrap().is_empty());
}
