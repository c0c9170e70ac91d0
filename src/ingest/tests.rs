use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::catalog::{CatalogStore, CatalogValue};
use crate::container::{Category, Container, DatasetKind, Payload, RAW_DATASET};
use crate::schema::SchemaDefinition;

use super::*;

fn catalog_in(dir: &TempDir) -> CatalogStore {
    CatalogStore::create(
        dir.path().join("catalog.db"),
        Arc::new(SchemaDefinition::standard()),
    )
    .unwrap()
}

fn write_ghost(dir: &TempDir, file_name: &str) -> PathBuf {
    let path = dir.path().join(file_name);
    std::fs::write(
        &path,
        "Sample: Gel\nWavelength: 532\nScan amplitude: 10\n\n10\n20\n30\n",
    )
    .unwrap();
    path
}

#[test]
fn test_ghost_ingestion_end_to_end() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let raw = write_ghost(&dir, "sample1.DAT");

    let row = Ingestor::new(&catalog).ingest(&raw).unwrap();

    assert_eq!(row.name(), Some("sample1"));
    assert_eq!(row.get("sample"), Some(&CatalogValue::Text("Gel".to_string())));
    assert_eq!(row.get("laser_wavelength"), Some(&CatalogValue::Integer(532)));
    assert_eq!(row.get("tfp_range"), Some(&CatalogValue::Real(10.0)));
    assert_eq!(
        row.get("data_shape"),
        Some(&CatalogValue::Text("(3,)".to_string()))
    );
    // Unsupplied columns got their documented defaults.
    assert_eq!(row.get("laser_model"), Some(&CatalogValue::Text("Not specified".to_string())));
    assert_eq!(row.get("scattering_angle"), Some(&CatalogValue::Real(180.0)));

    let container_path = dir.path().join("containers").join("sample1.bls");
    assert_eq!(row.filepath(), Some(container_path.display().to_string().as_str()));

    let container = Container::load(&container_path).unwrap();
    let raw_ds = container.dataset(RAW_DATASET).unwrap();
    assert_eq!(raw_ds.kind, DatasetKind::Raw);
    assert_eq!(raw_ds.payload, Payload::OneD(vec![10.0, 20.0, 30.0]));
    let resolution = container
        .attributes
        .get(Category::Spectrometer, "Spectral_Resolution")
        .unwrap();
    assert!(resolution.starts_with("3.333"));
    assert_eq!(
        container.attributes.get(Category::Spectrometer, "Type"),
        Some("TFP")
    );
    assert_eq!(
        container.attributes.get(Category::FileProperties, "Name"),
        Some("sample1")
    );
}

#[test]
fn test_duplicate_name_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let raw = write_ghost(&dir, "sample1.DAT");

    let ingestor = Ingestor::new(&catalog);
    ingestor.ingest(&raw).unwrap();

    let container_path = dir.path().join("containers").join("sample1.bls");
    let written_at = std::fs::metadata(&container_path).unwrap().modified().unwrap();

    match ingestor.ingest(&raw) {
        Err(IngestError::DuplicateName { name }) => assert_eq!(name, "sample1"),
        other => panic!("expected DuplicateName, got {other:?}"),
    }

    // Exactly one row, and the container was not rewritten.
    assert_eq!(catalog.fetch_all().unwrap().len(), 1);
    assert_eq!(
        std::fs::metadata(&container_path).unwrap().modified().unwrap(),
        written_at
    );
}

#[test]
fn test_unrecognized_extension_has_no_side_effects() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let raw = dir.path().join("sample1.npy");
    std::fs::write(&raw, b"whatever").unwrap();

    match Ingestor::new(&catalog).ingest(&raw) {
        Err(IngestError::UnsupportedFormat { extension, .. }) => assert_eq!(extension, "npy"),
        other => panic!("expected UnsupportedFormat, got {other:?}"),
    }
    assert!(catalog.fetch_all().unwrap().is_empty());
    assert!(!dir.path().join("containers").exists());
}

#[test]
fn test_missing_header_key_fails_before_container() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let raw = dir.path().join("nosample.DAT");
    std::fs::write(&raw, "Wavelength: 532\nScan amplitude: 10\n1\n2\n").unwrap();

    match Ingestor::new(&catalog).ingest(&raw) {
        Err(IngestError::MissingAttribute { name, key }) => {
            assert_eq!(name, "nosample");
            assert_eq!(key, "Sample");
        }
        other => panic!("expected MissingAttribute, got {other:?}"),
    }
    assert!(!dir.path().join("containers").join("nosample.bls").exists());
    assert!(catalog.fetch_all().unwrap().is_empty());
}

#[test]
fn test_empty_body_is_invalid() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let raw = dir.path().join("empty.DAT");
    std::fs::write(&raw, "Sample: Gel\nWavelength: 532\nScan amplitude: 10\n").unwrap();

    assert!(matches!(
        Ingestor::new(&catalog).ingest(&raw),
        Err(IngestError::InvalidData { .. })
    ));
}

#[test]
fn test_map_ingestion() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let raw = dir.path().join("scan_xy.csv");
    std::fs::write(&raw, "1,2,3\n4,5,6\n").unwrap();

    let row = Ingestor::new(&catalog).ingest(&raw).unwrap();
    assert_eq!(row.name(), Some("scan_xy"));
    assert_eq!(
        row.get("scanning_strategy"),
        Some(&CatalogValue::Text("map".to_string()))
    );
    assert_eq!(
        row.get("data_shape"),
        Some(&CatalogValue::Text("(2, 3)".to_string()))
    );

    let container = Container::load(dir.path().join("containers").join("scan_xy.bls")).unwrap();
    assert_eq!(
        container.dataset(RAW_DATASET).unwrap().payload,
        Payload::TwoD {
            rows: 2,
            cols: 3,
            values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        }
    );
}

#[test]
fn test_map_rejects_non_numeric_and_ragged_grids() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let ingestor = Ingestor::new(&catalog);

    let bad_cell = dir.path().join("bad.csv");
    std::fs::write(&bad_cell, "1,2\n3,x\n").unwrap();
    assert!(matches!(
        ingestor.ingest(&bad_cell),
        Err(IngestError::InvalidData { .. })
    ));

    let ragged = dir.path().join("ragged.csv");
    std::fs::write(&ragged, "1,2,3\n4,5\n").unwrap();
    assert!(matches!(
        ingestor.ingest(&ragged),
        Err(IngestError::InvalidData { .. })
    ));
}

#[test]
fn test_bulk_ingestion_reports_and_continues() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    let good = write_ghost(&dir, "good.DAT");
    let bad = dir.path().join("bad.npy");
    std::fs::write(&bad, b"nope").unwrap();

    let mut failures = Vec::new();
    let rows = Ingestor::new(&catalog).ingest_all(&[bad, good], |path, error| {
        failures.push((path.to_path_buf(), error.to_string()));
    });

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name(), Some("good"));
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.contains("unsupported raw format"));
}
