use chrono::Local;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::attributes::Attributes;
use super::dataset::{Dataset, DatasetKind, Payload};
use super::ContainerError;

/// Container format version marker written to every new container.
pub const BLS_FORMAT_VERSION: &str = "0.1";

/// File extension of container files.
pub const CONTAINER_EXTENSION: &str = "bls";

/// Name of the raw dataset every container holds exactly once.
pub const RAW_DATASET: &str = "Raw_data";

/// Current local time in the container timestamp format.
pub fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One provenance edge, derived by walking dataset parent links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEdge {
    /// The derived dataset.
    pub child: String,
    /// Its recorded parent.
    pub parent: String,
    /// Kind of the operation that produced the child, when recorded.
    pub operation: Option<String>,
}

/// The per-measurement hierarchical store: attributes plus a `Data`
/// compartment of named datasets connected by parent references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    #[serde(skip)]
    path: PathBuf,

    /// Format version marker.
    pub format_version: String,

    /// Root attribute map, keys namespaced as `CATEGORY.Property`.
    pub attributes: Attributes,

    /// Named datasets.
    #[serde(rename = "Data")]
    datasets: BTreeMap<String, Dataset>,
}

impl Container {
    /// Create a new container around a raw payload.
    ///
    /// Nothing touches the filesystem until [`Container::save`].
    pub fn create(path: PathBuf, raw: Payload, created_at: String) -> Self {
        let mut datasets = BTreeMap::new();
        datasets.insert(RAW_DATASET.to_string(), Dataset::raw(raw, created_at));
        Self {
            path,
            format_version: BLS_FORMAT_VERSION.to_string(),
            attributes: Attributes::new(),
            datasets,
        }
    }

    /// Load a container file and validate its invariants.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|source| ContainerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut container: Container =
            serde_json::from_str(&content).map_err(|source| ContainerError::Json {
                path: path.display().to_string(),
                source,
            })?;
        container.path = path;
        container.validate()?;
        Ok(container)
    }

    /// Validate invariants, then atomically write the container to its path:
    /// the document goes to a temp file in the target directory and is
    /// renamed over the destination.
    pub fn save(&self) -> Result<(), ContainerError> {
        self.validate()?;

        let io_err = |source| ContainerError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let json = serde_json::to_vec_pretty(self).map_err(|source| ContainerError::Json {
            path: self.path.display().to_string(),
            source,
        })?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        std::io::Write::write_all(&mut tmp, &json).map_err(io_err)?;
        tmp.persist(&self.path)
            .map_err(|e| io_err(e.error))
            .map(drop)?;

        debug!("wrote container {}", self.path.display());
        Ok(())
    }

    /// Filesystem path of this container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    /// Whether a dataset with the given name exists.
    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// The raw dataset.
    pub fn raw(&self) -> Result<&Dataset, ContainerError> {
        self.datasets
            .values()
            .find(|d| d.kind == DatasetKind::Raw)
            .ok_or_else(|| ContainerError::MissingRaw {
                path: self.path.display().to_string(),
            })
    }

    /// All datasets, by name.
    pub fn datasets(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.datasets.iter().map(|(name, ds)| (name.as_str(), ds))
    }

    /// Insert or replace a dataset under `name`.
    ///
    /// This is the low-level primitive used by the derive operations; it
    /// does not ask for overwrite confirmation. Invariants are re-checked on
    /// the next [`Container::save`].
    pub fn put_dataset(&mut self, name: &str, dataset: Dataset) {
        self.datasets.insert(name.to_string(), dataset);
    }

    /// Provenance edges, derived by walking `parent` links.
    pub fn provenance_edges(&self) -> Vec<ProvenanceEdge> {
        self.datasets
            .iter()
            .filter_map(|(name, ds)| {
                ds.parent.as_ref().map(|parent| ProvenanceEdge {
                    child: name.clone(),
                    parent: parent.clone(),
                    operation: ds.operation.as_ref().map(|op| op.kind.clone()),
                })
            })
            .collect()
    }

    /// Check the container invariants.
    ///
    /// Exactly one raw dataset with no parent; every derived dataset names
    /// an existing parent; parent links terminate (no cycles); 2-D payload
    /// shapes agree with their value counts.
    pub fn validate(&self) -> Result<(), ContainerError> {
        let raws: Vec<&str> = self
            .datasets
            .iter()
            .filter(|(_, ds)| ds.kind == DatasetKind::Raw)
            .map(|(name, _)| name.as_str())
            .collect();
        match raws.as_slice() {
            [] => {
                return Err(ContainerError::MissingRaw {
                    path: self.path.display().to_string(),
                })
            }
            [name] => {
                if self.datasets[*name].parent.is_some() {
                    return Err(ContainerError::RawWithParent {
                        name: name.to_string(),
                    });
                }
            }
            many => {
                return Err(ContainerError::MultipleRaw {
                    names: many.join(", "),
                })
            }
        }

        for (name, dataset) in &self.datasets {
            dataset.payload.validate(name)?;
            if dataset.kind == DatasetKind::Derived {
                let parent = dataset.parent.as_ref().ok_or_else(|| {
                    ContainerError::MissingParent { name: name.clone() }
                })?;
                if !self.datasets.contains_key(parent) {
                    return Err(ContainerError::UnknownParent {
                        dataset: name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        // Parent links must terminate at the raw dataset within |datasets|
        // steps; anything longer is a loop in a hand-edited file.
        let limit = self.datasets.len();
        for name in self.datasets.keys() {
            let mut current = name;
            let mut steps = 0;
            while let Some(parent) = self
                .datasets
                .get(current)
                .and_then(|ds| ds.parent.as_ref())
            {
                steps += 1;
                if steps > limit {
                    return Err(ContainerError::CycleDetected {
                        dataset: name.clone(),
                    });
                }
                current = parent;
            }
        }

        Ok(())
    }
}
