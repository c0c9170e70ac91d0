//! # Catalog-Container Synchronization
//!
//! A container is the authoritative record of a measurement; its catalog row
//! is a denormalized index over it. After attribute edits, [`sync_row`]
//! pushes the mapped attributes back into the row whose `filepath` equals
//! the container's path, in one update.
//!
//! The mapping is fixed and covers the attributes point-scanning ingestion
//! writes, so containers from `.dat` acquisitions synchronize as-is. Map
//! containers carry only a subset of those attributes and fail with
//! [`SyncError::MissingAttribute`] until the rest are filled in by hand.
//! Mapped columns absent from a trimmed-down schema are skipped; mapped
//! attributes absent from the container are an error.

use std::collections::BTreeMap;

use log::info;

use crate::catalog::{CatalogError, CatalogStore, CatalogValue};
use crate::container::{Attributes, Category, Container};

/// Errors raised while synchronizing a catalog row from its container.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A mapped attribute is absent from the container
    #[error("container '{container}' has no attribute '{key}'")]
    MissingAttribute {
        /// The namespaced attribute key
        key: String,
        /// The container path
        container: String,
    },

    /// Error from the catalog store, including the no-matching-row case
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Attribute to catalog-column mapping, in column order.
const ATTRIBUTE_COLUMNS: &[(Category, &str, &str)] = &[
    (Category::Measurement, "Sample", "sample"),
    (Category::Measurement, "Date_of_measure", "date"),
    (Category::Measurement, "Acquisition_Time", "acquisition_time"),
    (Category::Measurement, "Scattering_Angle", "scattering_angle"),
    (Category::Spectrometer, "Scanning_Strategy", "scanning_strategy"),
    (Category::Spectrometer, "Type", "spectrometer_type"),
    (Category::Spectrometer, "Wavelength_nm", "laser_wavelength"),
    (Category::Spectrometer, "Laser_Model", "laser_model"),
    (Category::Spectrometer, "Laser_Power", "laser_power"),
    (Category::Spectrometer, "Lens_NA", "lens_na"),
    (Category::FileProperties, "Data_Shape", "data_shape"),
];

/// Propagate a container's attributes into its catalog row.
///
/// Fails with [`SyncError::MissingAttribute`] before touching the catalog if
/// any mapped attribute is absent, and with [`CatalogError::RowNotFound`]
/// (wrapped) if no row's `filepath` matches the container path.
pub fn sync_row(catalog: &CatalogStore, container: &Container) -> Result<(), SyncError> {
    let filepath = container.path().display().to_string();

    let mut values = BTreeMap::new();
    for &(category, property, column) in ATTRIBUTE_COLUMNS {
        let Some(spec) = catalog.schema().column(column) else {
            continue;
        };
        let text = container
            .attributes
            .get(category, property)
            .ok_or_else(|| SyncError::MissingAttribute {
                key: Attributes::key(category, property),
                container: filepath.clone(),
            })?;
        values.insert(
            column.to_string(),
            CatalogValue::parse(spec.kind, column, text)?,
        );
    }

    catalog.update_by_filepath(&filepath, &values)?;
    info!(
        "synchronized {} column(s) for {filepath} from its container",
        values.len()
    );
    Ok(())
}
