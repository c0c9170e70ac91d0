//! # Measurement Container
//!
//! One container per measurement, addressed by filepath. A container is a
//! single JSON document (`.bls`) holding:
//!
//! - root-level **attributes**, namespaced string pairs such as
//!   `"MEASURE.Sample"` grouped by a closed category set
//!   ([`Category::FileProperties`], [`Category::Measurement`],
//!   [`Category::Spectrometer`]); values are strings, parsed lazily, and an
//!   absent property means "unknown", not zero;
//! - a **`Data` compartment** of named numeric datasets. Exactly one dataset
//!   is the raw acquisition ([`RAW_DATASET`], no parent); every other
//!   dataset is derived and carries its creation timestamp (`Date`), parent
//!   dataset name (`Parent`), and the operation plus parameters that
//!   produced it.
//!
//! Parent links form a DAG by construction - a dataset is only ever created
//! after its parent exists - and [`Container::validate`] re-checks the
//! invariants when a file of unknown origin is loaded.
//!
//! Saving is atomic: the document is written to a temp file in the target
//! directory, then renamed over the destination.

mod attributes;
mod dataset;
mod error;
mod store;


pub use attributes::{Attributes, Category};
pub use dataset::{Dataset, DatasetKind, OperationRecord, Payload};
pub use error::ContainerError;
pub use store::{
    current_timestamp, Container, ProvenanceEdge, BLS_FORMAT_VERSION, CONTAINER_EXTENSION,
    RAW_DATASET,
};
