use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ContainerError;

/// Whether a dataset is the raw acquisition or computed from a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    /// The unmodified acquired signal. Exactly one per container.
    Raw,
    /// Computed from a parent dataset by a recorded operation.
    Derived,
}

/// An N-dimensional numeric payload: a 1-D spectrum or a 2-D map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// 1-D spectrum.
    OneD(Vec<f64>),
    /// 2-D map, row-major.
    TwoD {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
        /// Row-major cell values, `rows * cols` of them.
        values: Vec<f64>,
    },
}

impl Payload {
    /// Extent along each axis.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Payload::OneD(values) => vec![values.len()],
            Payload::TwoD { rows, cols, .. } => vec![*rows, *cols],
        }
    }

    /// Sample count along the last axis (the spectral axis for both a 1-D
    /// spectrum and each line of a 2-D map).
    pub fn sample_count(&self) -> usize {
        match self {
            Payload::OneD(values) => values.len(),
            Payload::TwoD { cols, .. } => *cols,
        }
    }

    /// Shape rendered the way the acquisition software prints it, e.g.
    /// `"(512,)"` or `"(64, 512)"`.
    pub fn shape_string(&self) -> String {
        match self {
            Payload::OneD(values) => format!("({},)", values.len()),
            Payload::TwoD { rows, cols, .. } => format!("({rows}, {cols})"),
        }
    }

    /// Check the declared shape against the stored value count.
    pub fn validate(&self, dataset: &str) -> Result<(), ContainerError> {
        if let Payload::TwoD { rows, cols, values } = self {
            let expected = rows * cols;
            if values.len() != expected {
                return Err(ContainerError::ShapeMismatch {
                    dataset: dataset.to_string(),
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }
}

/// The operation that produced a derived dataset, as recorded provenance.
///
/// `parameters` surfaces operation-specific values under their on-disk
/// attribute names (`Bin_axis`, `Bin_Start`, `Bin_Stop`, `Noise_Window`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Operation kind, e.g. `"MakeFrequencyAxis"`.
    pub kind: String,

    /// Operation parameters, stored textually.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// One named dataset inside a container's `Data` compartment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Raw or derived.
    pub kind: DatasetKind,

    /// Creation timestamp, `%Y-%m-%d %H:%M:%S`. Refreshed on overwrite.
    #[serde(rename = "Date")]
    pub created_at: String,

    /// Parent dataset name; always present for derived datasets, never for
    /// the raw one.
    #[serde(rename = "Parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Recorded operation, for derived datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationRecord>,

    /// The numeric payload.
    pub payload: Payload,
}

impl Dataset {
    /// A raw dataset with the given payload and timestamp.
    pub fn raw(payload: Payload, created_at: String) -> Self {
        Self {
            kind: DatasetKind::Raw,
            created_at,
            parent: None,
            operation: None,
            payload,
        }
    }

    /// A derived dataset with full lineage.
    pub fn derived(
        payload: Payload,
        created_at: String,
        parent: String,
        operation: OperationRecord,
    ) -> Self {
        Self {
            kind: DatasetKind::Derived,
            created_at,
            parent: Some(parent),
            operation: Some(operation),
            payload,
        }
    }
}
