//! # blscat - Brillouin Spectroscopy Catalog & Container Core
//!
//! `blscat` catalogs and manages Brillouin light scattering (BLS) acquisition
//! files. Each measurement lives in a self-describing hierarchical container
//! (`.bls`, a JSON document) and is indexed by a row in a relational SQLite
//! catalog whose schema is derived from a configuration object.
//!
//! ## Key Concepts
//!
//! - **Catalog**: a single SQLite file with one `spectra` table. Columns are
//!   generated from a [`schema::SchemaDefinition`], and an existing catalog is
//!   additively migrated when the schema has grown since the catalog was
//!   created. Columns are never dropped or renamed.
//!
//! - **Container**: one file per measurement holding namespaced string
//!   attributes (`FILEPROP`, `MEASURE`, `SPECTROMETER`) and a `Data`
//!   compartment of named numeric datasets. Exactly one dataset is the raw
//!   acquisition; every other dataset is derived from a parent dataset and
//!   records its lineage (operation, parameters, timestamp, parent name).
//!
//! - **Ingestion**: a raw instrument file (`Key: Value` header plus one
//!   integer per line, or a 2-D numeric map) becomes one container and one
//!   catalog row. The container is fully written before the row is inserted,
//!   so a mid-ingestion failure can leave an orphan container but never a
//!   catalog row pointing at an unwritten container.
//!
//! - **Provenance**: derived datasets (frequency axes, binned projections,
//!   noise-filtered signals) form an acyclic parent graph inside a container.
//!   Re-deriving an existing dataset goes through an injected yes/no
//!   confirmation callback instead of an interactive dialog.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blscat::catalog::CatalogStore;
//! use blscat::ingest::Ingestor;
//! use blscat::schema::SchemaDefinition;
//!
//! let schema = Arc::new(SchemaDefinition::standard());
//! let catalog = CatalogStore::create("measurements.db", schema)?;
//!
//! let ingestor = Ingestor::new(&catalog);
//! let row = ingestor.ingest("sample1.DAT".as_ref())?;
//! println!("catalogued {}", row.name().unwrap_or("?"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`schema`]: configuration-driven catalog schema and raw-format registry
//! - [`catalog`]: SQLite catalog store and additive schema synchronizer
//! - [`container`]: per-measurement hierarchical store with provenance links
//! - [`provenance`]: derive operations over container datasets
//! - [`ingest`]: raw-file parsers and the ingestion pipeline
//! - [`sync`]: propagation of container attribute edits back to the catalog
//!
//! ## Error Model
//!
//! Every module exposes a `thiserror` enum whose variants carry enough
//! context (measurement name, file path, column or dataset name) to be shown
//! verbatim by a presentation layer. Validation failures are detected before
//! any mutating effect; the only tolerated inconsistency is an orphan
//! container without a catalog row, which is reported, never auto-repaired.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod container;
pub mod ingest;
pub mod provenance;
pub mod schema;
pub mod sync;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::catalog::{CatalogError, CatalogRow, CatalogStore, CatalogValue, SchemaSync};
    pub use crate::container::{
        Attributes, Category, Container, ContainerError, Dataset, DatasetKind, Payload,
        ProvenanceEdge, CONTAINER_EXTENSION, RAW_DATASET,
    };
    pub use crate::ingest::{IngestError, Ingestor};
    pub use crate::provenance::{derive, Axis, DeriveError, Operation};
    pub use crate::schema::{ColumnKind, ColumnSpec, RawFormat, SchemaDefinition, SchemaError};
    pub use crate::sync::{sync_row, SyncError};
}
