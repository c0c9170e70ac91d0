//! # Provenance Operations
//!
//! Derive operations read the raw or an existing derived dataset of a
//! [`Container`] and write a new derived dataset with recorded lineage:
//! operation kind, parameters, timestamp and parent name.
//!
//! Dataset names are stable identifiers. Each operation targets a fixed
//! name (`Frequency`, `Binned`, `Noise_subtracted`), so re-deriving collides
//! with the previous result; the collision is resolved through the injected
//! `confirm` callback - refusal leaves the existing dataset, payload and
//! timestamp untouched, acceptance overwrites payload and refreshes
//! `created_at`, `parent` and the operation record. A derive call never
//! renames an existing dataset, and the raw dataset is never mutated.
//!
//! All mutation happens in memory; the caller persists with
//! [`Container::save`].

use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::container::{
    current_timestamp, Category, Container, Dataset, OperationRecord, Payload,
};

/// Errors that can occur while deriving a dataset
#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    /// The named parent dataset does not exist in the container
    #[error("container '{container}' has no dataset '{dataset}' to derive from")]
    ParentNotFound {
        /// The missing parent name
        dataset: String,
        /// Container filepath
        container: String,
    },

    /// A container attribute the operation needs is absent
    #[error("container '{container}' is missing attribute '{key}'")]
    MissingAttribute {
        /// Namespaced attribute key
        key: String,
        /// Container filepath
        container: String,
    },

    /// A container attribute the operation needs is not numeric
    #[error("attribute '{key}' value '{value}' is not numeric")]
    InvalidNumber {
        /// Namespaced attribute key
        key: String,
        /// The unparseable value
        value: String,
    },

    /// The binning index range is empty or exceeds the parent's extent
    #[error(
        "bin range [{start}, {stop}) is invalid for axis {axis} of extent {extent}"
    )]
    InvalidRange {
        /// Binned axis
        axis: Axis,
        /// Inclusive range start
        start: usize,
        /// Exclusive range stop
        stop: usize,
        /// Parent extent along the binned axis
        extent: usize,
    },

    /// The requested parent chain passes through the operation's target,
    /// so relinking would make the target its own ancestor
    #[error("cannot derive '{dataset}' from '{parent}': '{dataset}' would become its own ancestor")]
    CyclicLineage {
        /// Target dataset name
        dataset: String,
        /// Requested parent name
        parent: String,
    },

    /// The operation does not apply to the parent's dimensionality
    #[error("operation {operation} does not apply to dataset '{dataset}' of shape {shape}")]
    NotApplicable {
        /// Operation kind
        operation: String,
        /// Parent dataset name
        dataset: String,
        /// Parent shape, rendered
        shape: String,
    },
}

/// Axis of a 2-D payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// The first axis (scan lines).
    Rows,
    /// The second axis (spectral channels).
    Cols,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Rows => write!(f, "rows"),
            Axis::Cols => write!(f, "cols"),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rows" | "row" => Ok(Axis::Rows),
            "cols" | "col" | "columns" => Ok(Axis::Cols),
            other => Err(format!("unknown axis '{other}', expected rows or cols")),
        }
    }
}

/// A provenance-recorded derive operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Generate the frequency axis of a swept-frequency (TFP) acquisition:
    /// evenly spaced values over `[-amplitude/2, +amplitude/2]`, where the
    /// amplitude comes from `SPECTROMETER.Scan_Amplitude` and the count from
    /// the parent's sample count.
    MakeFrequencyAxis,

    /// Sum a 2-D parent along `axis` over the half-open index range
    /// `[start, stop)`, then rescale so the maximum equals the parent's
    /// extent along the other axis. The rescale preserves a
    /// display-comparable amplitude, not a physical unit, and is skipped
    /// when the maximum is not positive.
    Bin {
        /// Axis to sum along.
        axis: Axis,
        /// Inclusive range start.
        start: usize,
        /// Exclusive range stop.
        stop: usize,
    },

    /// Subtract the noise floor averaged over a trailing window.
    ///
    /// The numeric transform is not implemented yet; only the provenance
    /// bookkeeping (name, parent, timestamp, parameters) is contractual and
    /// the payload passes through unchanged.
    SubtractNoise {
        /// Averaging window length, in samples.
        window: usize,
    },
}

impl Operation {
    /// Operation kind recorded in provenance.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::MakeFrequencyAxis => "MakeFrequencyAxis",
            Operation::Bin { .. } => "Bin",
            Operation::SubtractNoise { .. } => "SubtractNoise",
        }
    }

    /// Name of the dataset this operation writes.
    pub fn target_name(&self) -> &'static str {
        match self {
            Operation::MakeFrequencyAxis => "Frequency",
            Operation::Bin { .. } => "Binned",
            Operation::SubtractNoise { .. } => "Noise_subtracted",
        }
    }

    fn parameters(&self) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();
        match self {
            Operation::MakeFrequencyAxis => {}
            Operation::Bin { axis, start, stop } => {
                parameters.insert("Bin_axis".to_string(), axis.to_string());
                parameters.insert("Bin_Start".to_string(), start.to_string());
                parameters.insert("Bin_Stop".to_string(), stop.to_string());
            }
            Operation::SubtractNoise { window } => {
                parameters.insert("Noise_Window".to_string(), window.to_string());
            }
        }
        parameters
    }

    fn record(&self) -> OperationRecord {
        OperationRecord {
            kind: self.kind().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Derive a new dataset from `parent_name` and record its lineage.
///
/// Returns the target dataset name. When a dataset with that name already
/// exists, `confirm` decides: refusal returns `Ok` without touching
/// anything, acceptance overwrites and refreshes the lineage fields.
///
/// Deriving from the operation's own target, or from any dataset that
/// descends from it, fails with [`DeriveError::CyclicLineage`] before the
/// container is modified.
pub fn derive<C>(
    container: &mut Container,
    parent_name: &str,
    operation: Operation,
    mut confirm: C,
) -> Result<String, DeriveError>
where
    C: FnMut(&str) -> bool,
{
    let container_path = container.path().display().to_string();
    let parent = container
        .dataset(parent_name)
        .ok_or_else(|| DeriveError::ParentNotFound {
            dataset: parent_name.to_string(),
            container: container_path.clone(),
        })?;

    // The derive rewrites the target's parent link. Refuse while the
    // container is still untouched if the requested parent is the target
    // itself or descends from it; lineage stays acyclic by construction.
    let target = operation.target_name();
    let mut ancestor = Some(parent_name);
    let mut hops = container.datasets().count();
    while let Some(current) = ancestor {
        if current == target {
            return Err(DeriveError::CyclicLineage {
                dataset: target.to_string(),
                parent: parent_name.to_string(),
            });
        }
        if hops == 0 {
            break;
        }
        hops -= 1;
        ancestor = container
            .dataset(current)
            .and_then(|dataset| dataset.parent.as_deref());
    }

    // Compute before any mutation so a failed operation has no effect.
    let payload = match &operation {
        Operation::MakeFrequencyAxis => frequency_axis(container, parent_name, &parent.payload)?,
        Operation::Bin { axis, start, stop } => {
            bin(parent_name, &parent.payload, *axis, *start, *stop)?
        }
        Operation::SubtractNoise { .. } => parent.payload.clone(),
    };

    let name = target;
    if container.has_dataset(name) {
        let question = format!("Replace the existing '{name}' dataset?");
        if !confirm(&question) {
            info!("kept existing dataset '{name}' in {container_path}");
            return Ok(name.to_string());
        }
        debug!("overwriting dataset '{name}' in {container_path}");
    }

    container.put_dataset(
        name,
        Dataset::derived(
            payload,
            current_timestamp(),
            parent_name.to_string(),
            operation.record(),
        ),
    );
    info!("derived dataset '{name}' from '{parent_name}' in {container_path}");
    Ok(name.to_string())
}

/// Evenly spaced frequency values over `[-amplitude/2, +amplitude/2]`.
fn frequency_axis(
    container: &Container,
    parent_name: &str,
    parent: &Payload,
) -> Result<Payload, DeriveError> {
    let Payload::OneD(values) = parent else {
        return Err(DeriveError::NotApplicable {
            operation: "MakeFrequencyAxis".to_string(),
            dataset: parent_name.to_string(),
            shape: parent.shape_string(),
        });
    };

    let key = crate::container::Attributes::key(Category::Spectrometer, "Scan_Amplitude");
    let raw_value = container
        .attributes
        .get(Category::Spectrometer, "Scan_Amplitude")
        .ok_or_else(|| DeriveError::MissingAttribute {
            key: key.clone(),
            container: container.path().display().to_string(),
        })?;
    let amplitude = raw_value
        .trim()
        .parse::<f64>()
        .map_err(|_| DeriveError::InvalidNumber {
            key,
            value: raw_value.to_string(),
        })?;

    Ok(Payload::OneD(linspace(
        -amplitude / 2.0,
        amplitude / 2.0,
        values.len(),
    )))
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Sum a 2-D payload along `axis` over `[start, stop)` and rescale the
/// result so its maximum equals the extent of the other axis.
fn bin(
    parent_name: &str,
    parent: &Payload,
    axis: Axis,
    start: usize,
    stop: usize,
) -> Result<Payload, DeriveError> {
    let Payload::TwoD { rows, cols, values } = parent else {
        return Err(DeriveError::NotApplicable {
            operation: "Bin".to_string(),
            dataset: parent_name.to_string(),
            shape: parent.shape_string(),
        });
    };
    let (rows, cols) = (*rows, *cols);

    let extent = match axis {
        Axis::Rows => rows,
        Axis::Cols => cols,
    };
    if start >= stop || stop > extent {
        return Err(DeriveError::InvalidRange {
            axis,
            start,
            stop,
            extent,
        });
    }

    let (out_len, scale_to) = match axis {
        Axis::Rows => (cols, rows),
        Axis::Cols => (rows, cols),
    };
    let mut out = vec![0.0_f64; out_len];
    match axis {
        Axis::Rows => {
            for r in start..stop {
                for (c, slot) in out.iter_mut().enumerate() {
                    *slot += values[r * cols + c];
                }
            }
        }
        Axis::Cols => {
            for (r, slot) in out.iter_mut().enumerate() {
                for c in start..stop {
                    *slot += values[r * cols + c];
                }
            }
        }
    }

    // Display-oriented normalization inherited from the acquisition
    // software: maximum pinned to the other axis extent. A slab whose
    // maximum is not positive (all zero, or all negative as a background-
    // overcorrected acquisition can produce) keeps its raw sums; scaling by
    // a non-positive maximum would divide by zero or flip signs.
    let max = out.iter().cloned().fold(f64::MIN, f64::max);
    if max > 0.0 {
        let scale = scale_to as f64 / max;
        for value in &mut out {
            *value *= scale;
        }
    }

    Ok(Payload::OneD(out))
}
