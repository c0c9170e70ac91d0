//! # Ingestion Pipeline
//!
//! Turns one raw instrument file into one container plus one catalog row:
//!
//! 1. the measurement name is the raw file's base name (extension stripped);
//! 2. a pre-insert existence check rejects duplicate names before any side
//!    effect, so a failed ingestion is idempotent;
//! 3. the file dispatches on its extension against the schema's registered
//!    raw formats ([`ghost`] delimited-text spectra, [`map`] 2-D CSV maps);
//! 4. the container is written under `containers/` next to the catalog file,
//!    with the raw dataset and the standard attribute set;
//! 5. the catalog row is inserted **last**, after the container is fully on
//!    disk - a mid-pipeline failure can leave an orphan container (reported,
//!    not auto-repaired) but never a catalog row pointing at an unwritten
//!    container.

mod ghost;
mod map;

#[cfg(test)]
mod tests;

use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogError, CatalogRow, CatalogStore, CatalogValue};
use crate::container::{
    Category, Container, ContainerError, Payload, BLS_FORMAT_VERSION, CONTAINER_EXTENSION,
};
use crate::schema::ColumnKind;

/// Errors that can occur during ingestion
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A measurement with the same name is already catalogued
    #[error(
        "the catalog already has a measurement named '{name}'; \
         rename the raw file to ingest it"
    )]
    DuplicateName {
        /// The colliding measurement name
        name: String,
    },

    /// The raw file's extension matches no registered format
    #[error("unsupported raw format '.{extension}' for file '{path}'")]
    UnsupportedFormat {
        /// The raw file path
        path: String,
        /// The unrecognized extension (possibly empty)
        extension: String,
    },

    /// A header key the format requires is absent from the raw file
    #[error("raw file for measurement '{name}' is missing header key '{key}'")]
    MissingAttribute {
        /// The measurement name
        name: String,
        /// The missing header key
        key: String,
    },

    /// The raw file's contents could not be interpreted
    #[error("invalid data in '{path}': {reason}")]
    InvalidData {
        /// The raw file path
        path: String,
        /// What was wrong
        reason: String,
    },

    /// I/O or permission failure
    #[error("storage error at '{path}': {source}")]
    Storage {
        /// The affected path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Error from the catalog store
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Error from the container store
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// The ingestion pipeline, bound to one catalog.
pub struct Ingestor<'a> {
    catalog: &'a CatalogStore,
}

impl<'a> Ingestor<'a> {
    /// Create a pipeline over the given catalog.
    pub fn new(catalog: &'a CatalogStore) -> Self {
        Self { catalog }
    }

    /// Ingest one raw file; returns the inserted catalog row.
    pub fn ingest(&self, raw_path: &Path) -> Result<CatalogRow, IngestError> {
        let name = raw_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IngestError::UnsupportedFormat {
                path: raw_path.display().to_string(),
                extension: String::new(),
            })?
            .to_string();

        // Duplicate check before any filesystem side effect.
        if self.catalog.name_exists(&name)? {
            return Err(IngestError::DuplicateName { name });
        }

        let extension = raw_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let format = self
            .catalog
            .schema()
            .format_for_extension(&extension)
            .ok_or_else(|| IngestError::UnsupportedFormat {
                path: raw_path.display().to_string(),
                extension: extension.clone(),
            })?
            .clone();

        let acquired_at = file_creation_time(raw_path)?;
        match format.label.as_str() {
            "ghost" => self.ingest_ghost(raw_path, &name, &acquired_at),
            "map" => self.ingest_map(raw_path, &name, &acquired_at),
            other => {
                warn!("format '{other}' is registered but has no parser");
                Err(IngestError::UnsupportedFormat {
                    path: raw_path.display().to_string(),
                    extension,
                })
            }
        }
    }

    /// Ingest a batch of raw files (the caller's path provider supplies the
    /// list), reporting per-file failures to `report` and continuing.
    pub fn ingest_all<F>(&self, paths: &[PathBuf], mut report: F) -> Vec<CatalogRow>
    where
        F: FnMut(&Path, &IngestError),
    {
        let mut rows = Vec::new();
        for path in paths {
            match self.ingest(path) {
                Ok(row) => rows.push(row),
                Err(error) => report(path, &error),
            }
        }
        rows
    }

    /// Delimited-text spectrum from a point-scanning (TFP) instrument.
    fn ingest_ghost(
        &self,
        raw_path: &Path,
        name: &str,
        acquired_at: &str,
    ) -> Result<CatalogRow, IngestError> {
        let spectrum = ghost::parse_file(raw_path)?;

        let require = |key: &str| -> Result<&str, IngestError> {
            spectrum
                .metadata
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| IngestError::MissingAttribute {
                    name: name.to_string(),
                    key: key.to_string(),
                })
        };
        let sample = require("Sample")?.to_string();
        let wavelength = require("Wavelength")?.to_string();
        let amplitude_text = require("Scan amplitude")?.to_string();
        let amplitude =
            amplitude_text
                .trim()
                .parse::<f64>()
                .map_err(|_| IngestError::InvalidData {
                    path: raw_path.display().to_string(),
                    reason: format!("Scan amplitude '{amplitude_text}' is not numeric"),
                })?;

        if spectrum.samples.is_empty() {
            return Err(IngestError::InvalidData {
                path: raw_path.display().to_string(),
                reason: "no integer samples after the header block".to_string(),
            });
        }
        let sample_count = spectrum.samples.len();
        let payload = Payload::OneD(spectrum.samples.iter().map(|&v| v as f64).collect());
        let spectral_resolution = amplitude / sample_count as f64;

        let mut container = self.new_container(name, payload, acquired_at)?;
        let attrs = &mut container.attributes;
        attrs.set(Category::Measurement, "Sample", &sample);
        attrs.set(Category::Measurement, "Acquisition_Time", "0");
        attrs.set(Category::Measurement, "Scattering_Angle", "180");
        attrs.set(Category::Spectrometer, "Scanning_Strategy", "point_scanning");
        attrs.set(Category::Spectrometer, "Type", "TFP");
        attrs.set(Category::Spectrometer, "Illumination_Type", "CW");
        attrs.set(Category::Spectrometer, "Detector_Type", "Photon Counter");
        attrs.set(Category::Spectrometer, "Filtering_Module", "None");
        attrs.set(Category::Spectrometer, "Laser_Model", "Not specified");
        attrs.set(Category::Spectrometer, "Laser_Power", "0");
        attrs.set(Category::Spectrometer, "Lens_NA", "0");
        attrs.set(Category::Spectrometer, "Wavelength_nm", &wavelength);
        attrs.set(Category::Spectrometer, "Scan_Amplitude", &amplitude_text);
        attrs.set(
            Category::Spectrometer,
            "Spectral_Resolution",
            spectral_resolution.to_string(),
        );
        // Remaining header pairs populate measurement metadata verbatim,
        // with spaces folded to underscores.
        for (key, value) in &spectrum.metadata {
            if matches!(key.as_str(), "Sample" | "Wavelength" | "Scan amplitude") {
                continue;
            }
            attrs.set(Category::Measurement, &key.replace(' ', "_"), value);
        }
        container.save()?;

        let mut supplied = BTreeMap::new();
        self.put_text(&mut supplied, "name", name);
        self.put_text(&mut supplied, "filepath", &container.path().display().to_string());
        self.put_text(&mut supplied, "date", acquired_at);
        self.put_text(&mut supplied, "sample", &sample);
        self.put_text(&mut supplied, "signal_type", "spontaneous");
        self.put_text(&mut supplied, "scanning_strategy", "point_scanning");
        self.put_text(&mut supplied, "spectrometer_type", "TFP");
        self.put_parsed(&mut supplied, "laser_wavelength", &wavelength)?;
        self.put_text(&mut supplied, "data_shape", &format!("({sample_count},)"));
        if self.catalog.schema().column("tfp_range").is_some() {
            supplied.insert("tfp_range".to_string(), CatalogValue::Real(amplitude));
        }

        self.insert_last(container.path(), name, supplied)
    }

    /// 2-D numeric map decoded from CSV; no header metadata beyond the file
    /// creation time.
    fn ingest_map(
        &self,
        raw_path: &Path,
        name: &str,
        acquired_at: &str,
    ) -> Result<CatalogRow, IngestError> {
        let payload = map::parse_file(raw_path)?;
        let shape = payload.shape_string();

        let mut container = self.new_container(name, payload, acquired_at)?;
        container
            .attributes
            .set(Category::Spectrometer, "Scanning_Strategy", "map");
        container.save()?;

        let mut supplied = BTreeMap::new();
        self.put_text(&mut supplied, "name", name);
        self.put_text(&mut supplied, "filepath", &container.path().display().to_string());
        self.put_text(&mut supplied, "date", acquired_at);
        self.put_text(&mut supplied, "scanning_strategy", "map");
        self.put_text(&mut supplied, "data_shape", &shape);

        self.insert_last(container.path(), name, supplied)
    }

    /// Build the container skeleton at its deterministic path, creating the
    /// managed `containers/` subdirectory if absent.
    fn new_container(
        &self,
        name: &str,
        payload: Payload,
        acquired_at: &str,
    ) -> Result<Container, IngestError> {
        let dir = self
            .catalog
            .path()
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("containers");
        std::fs::create_dir_all(&dir).map_err(|source| IngestError::Storage {
            path: dir.display().to_string(),
            source,
        })?;

        let path = dir.join(format!("{name}.{CONTAINER_EXTENSION}"));
        let shape = payload.shape_string();
        let mut container = Container::create(path, payload, acquired_at.to_string());
        let attrs = &mut container.attributes;
        attrs.set(Category::FileProperties, "BLS_Version", BLS_FORMAT_VERSION);
        attrs.set(Category::FileProperties, "Name", name);
        attrs.set(Category::FileProperties, "Data_Shape", shape);
        attrs.set(Category::Measurement, "Date_of_measure", acquired_at);
        Ok(container)
    }

    /// Insert the catalog row; the container is already fully written, so a
    /// failure here leaves at worst an orphan container on disk.
    fn insert_last(
        &self,
        container_path: &Path,
        name: &str,
        supplied: BTreeMap<String, CatalogValue>,
    ) -> Result<CatalogRow, IngestError> {
        match self.catalog.insert_row(&supplied) {
            Ok(row) => {
                info!(
                    "ingested '{name}' -> {} (row {})",
                    container_path.display(),
                    row.id().unwrap_or(-1)
                );
                Ok(row)
            }
            Err(error) => {
                warn!(
                    "container {} written but catalog insert failed; \
                     an orphan container remains on disk",
                    container_path.display()
                );
                Err(error.into())
            }
        }
    }

    fn put_text(&self, supplied: &mut BTreeMap<String, CatalogValue>, column: &str, value: &str) {
        if self.catalog.schema().column(column).is_some() {
            supplied.insert(column.to_string(), CatalogValue::Text(value.to_string()));
        }
    }

    fn put_parsed(
        &self,
        supplied: &mut BTreeMap<String, CatalogValue>,
        column: &str,
        text: &str,
    ) -> Result<(), IngestError> {
        let Some(spec) = self.catalog.schema().column(column) else {
            return Ok(());
        };
        let kind = match spec.kind {
            ColumnKind::AutoKey => return Ok(()),
            kind => kind,
        };
        supplied.insert(
            column.to_string(),
            CatalogValue::parse(kind, column, text)?,
        );
        Ok(())
    }
}

/// Creation time of the raw file, formatted as a container timestamp.
/// Falls back to the modification time where birth time is unavailable.
fn file_creation_time(path: &Path) -> Result<String, IngestError> {
    let meta = std::fs::metadata(path).map_err(|source| IngestError::Storage {
        path: path.display().to_string(),
        source,
    })?;
    let when = meta
        .created()
        .or_else(|_| meta.modified())
        .map_err(|source| IngestError::Storage {
            path: path.display().to_string(),
            source,
        })?;
    let local: chrono::DateTime<chrono::Local> = when.into();
    Ok(local.format("%Y-%m-%d %H:%M:%S").to_string())
}
