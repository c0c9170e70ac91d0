use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ContainerError;

/// Closed set of attribute categories.
///
/// On disk a category appears as the prefix of a namespaced key, e.g.
/// `"MEASURE.Sample"`. The set is fixed; free-form keys live in the property
/// part, not in new categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// File-level properties (`FILEPROP`): format version, name, data shape.
    FileProperties,
    /// Measurement metadata (`MEASURE`): sample, date, geometry.
    Measurement,
    /// Instrument metadata (`SPECTROMETER`): type, laser, scan settings.
    Spectrometer,
}

impl Category {
    /// The on-disk namespace prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::FileProperties => "FILEPROP",
            Category::Measurement => "MEASURE",
            Category::Spectrometer => "SPECTROMETER",
        }
    }

    /// Resolve a namespace prefix back to its category.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "FILEPROP" => Some(Category::FileProperties),
            "MEASURE" => Some(Category::Measurement),
            "SPECTROMETER" => Some(Category::Spectrometer),
            _ => None,
        }
    }

    /// All categories, in display order.
    pub fn all() -> [Category; 3] {
        [
            Category::Measurement,
            Category::Spectrometer,
            Category::FileProperties,
        ]
    }
}

/// The root attribute map of a container.
///
/// Values are always strings; numeric attributes are stored textually and
/// parsed on demand by consumers. A missing property means "unknown".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// Empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespaced key for a category/property pair.
    pub fn key(category: Category, property: &str) -> String {
        format!("{}.{property}", category.prefix())
    }

    /// Look up a property.
    pub fn get(&self, category: Category, property: &str) -> Option<&str> {
        self.0.get(&Self::key(category, property)).map(String::as_str)
    }

    /// Set a property.
    pub fn set(&mut self, category: Category, property: &str, value: impl Into<String>) {
        self.0.insert(Self::key(category, property), value.into());
    }

    /// Look up a property, failing with context if it is absent.
    pub fn require(
        &self,
        category: Category,
        property: &str,
        container_path: &str,
    ) -> Result<&str, ContainerError> {
        self.get(category, property)
            .ok_or_else(|| ContainerError::MissingAttribute {
                key: Self::key(category, property),
                path: container_path.to_string(),
            })
    }

    /// Parse a property as `f64`, failing if absent or non-numeric.
    pub fn require_f64(
        &self,
        category: Category,
        property: &str,
        container_path: &str,
    ) -> Result<f64, ContainerError> {
        let value = self.require(category, property, container_path)?;
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| ContainerError::InvalidNumber {
                key: Self::key(category, property),
                value: value.to_string(),
            })
    }

    /// Iterate over all `(namespaced key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of stored attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attribute is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
