//! # Catalog Schema Definition
//!
//! The catalog schema is configuration-driven: an ordered list of column
//! specifications, the set of raw instrument formats the ingestion pipeline
//! recognizes, and the subset of columns a summary view shows by default.
//!
//! A [`SchemaDefinition`] is built once at startup, validated, and treated as
//! immutable for the process lifetime; every other component takes it by
//! shared reference (`Arc`). It can come from the built-in
//! [`SchemaDefinition::standard`] roster or from a TOML file:
//!
//! ```toml
//! # schema.toml
//! [[columns]]
//! name = "id"
//! kind = "auto_key"
//!
//! [[columns]]
//! name = "name"
//! kind = "text"
//!
//! [[formats]]
//! label = "ghost"
//! pattern = "*.dat"
//!
//! [display]
//! columns = ["name"]
//! ```
//!
//! ## Invariants
//!
//! - Column names are unique; declaration order defines catalog column order
//!   and display order.
//! - Exactly one `auto_key` column exists and it comes first. It becomes the
//!   `INTEGER PRIMARY KEY AUTOINCREMENT` row identifier.
//! - Every default-visible column names a declared column.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Errors raised while loading or validating a schema definition.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// I/O error reading a schema configuration file
    #[error("failed to read schema configuration: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("failed to parse schema configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// No `auto_key` column was declared
    #[error("schema declares no auto_key column")]
    MissingAutoKey,

    /// More than one `auto_key` column, or one that is not first
    #[error("auto_key column '{name}' must be unique and declared first")]
    MisplacedAutoKey {
        /// Name of the offending column
        name: String,
    },

    /// A column name appears more than once
    #[error("duplicate column name '{name}'")]
    DuplicateColumn {
        /// The repeated column name
        name: String,
    },

    /// A default-visible column does not exist in the column list
    #[error("default-visible column '{name}' is not a declared column")]
    UnknownVisibleColumn {
        /// The unknown column name
        name: String,
    },
}

/// Storage kind of a catalog column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Auto-incrementing integer primary key; exactly one per schema.
    AutoKey,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    Text,
}

impl ColumnKind {
    /// SQLite column type used in `CREATE TABLE` / `ALTER TABLE` statements.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::AutoKey => "INTEGER PRIMARY KEY AUTOINCREMENT",
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Text => "TEXT",
        }
    }
}

/// One catalog column: name, storage kind, and an optional insert default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within the schema.
    pub name: String,

    /// Storage kind.
    pub kind: ColumnKind,

    /// Default value (textual form) applied when ingestion supplies none.
    /// When absent, the kind-level default applies: `"Not specified"` for
    /// text, `0` for numeric columns.
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
        }
    }

    fn with_default(name: &str, kind: ColumnKind, default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: Some(default.to_string()),
        }
    }
}

/// A raw instrument file format recognized by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFormat {
    /// Short label used for dispatch (e.g. `"ghost"`).
    pub label: String,

    /// File-extension pattern (e.g. `"*.dat"`), matched case-insensitively.
    pub pattern: String,
}

impl RawFormat {
    /// Whether `extension` (without leading dot) matches this pattern.
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.pattern
            .strip_prefix("*.")
            .map(|want| want.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
    }
}

#[derive(Debug, Default, Deserialize)]
struct DisplayConfig {
    #[serde(default)]
    columns: Vec<String>,
}

/// Mirror of the on-disk TOML layout, folded into a [`SchemaDefinition`].
#[derive(Debug, Deserialize)]
struct SchemaConfig {
    #[serde(default)]
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    display: DisplayConfig,
}

/// The complete, validated catalog schema.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    columns: Vec<ColumnSpec>,
    raw_formats: Vec<RawFormat>,
    default_visible_columns: Vec<String>,
}

impl SchemaDefinition {
    /// Build a schema from parts and validate its invariants.
    pub fn new(
        columns: Vec<ColumnSpec>,
        raw_formats: Vec<RawFormat>,
        default_visible_columns: Vec<String>,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            columns,
            raw_formats,
            default_visible_columns,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// The built-in standard schema for BLS measurement catalogs.
    ///
    /// Mirrors the reference configuration shipped with the acquisition
    /// software: one auto-key, identity and provenance columns, laser and
    /// optics metadata, and acquisition geometry.
    pub fn standard() -> Self {
        let columns = vec![
            ColumnSpec::new("id", ColumnKind::AutoKey),
            ColumnSpec::new("name", ColumnKind::Text),
            ColumnSpec::new("filepath", ColumnKind::Text),
            ColumnSpec::new("date", ColumnKind::Text),
            ColumnSpec::new("sample", ColumnKind::Text),
            ColumnSpec::new("signal_type", ColumnKind::Text),
            ColumnSpec::new("scanning_strategy", ColumnKind::Text),
            ColumnSpec::new("spectrometer_type", ColumnKind::Text),
            ColumnSpec::new("acquisition_time", ColumnKind::Real),
            ColumnSpec::new("laser_wavelength", ColumnKind::Integer),
            ColumnSpec::new("laser_model", ColumnKind::Text),
            ColumnSpec::new("laser_power", ColumnKind::Real),
            ColumnSpec::new("lens_na", ColumnKind::Real),
            ColumnSpec::with_default("scattering_angle", ColumnKind::Real, "180"),
            ColumnSpec::new("immersion_medium", ColumnKind::Text),
            ColumnSpec::new("objective_model", ColumnKind::Text),
            ColumnSpec::new("temperature", ColumnKind::Real),
            ColumnSpec::new("temperature_uncertainty", ColumnKind::Real),
            ColumnSpec::new("data_shape", ColumnKind::Text),
            ColumnSpec::new("spatial_resolution", ColumnKind::Text),
            ColumnSpec::new("abscissa_type", ColumnKind::Text),
            ColumnSpec::with_default("info", ColumnKind::Text, ""),
            ColumnSpec::new("spectro_characterization", ColumnKind::Text),
            ColumnSpec::new("tfp_range", ColumnKind::Real),
        ];
        let raw_formats = vec![
            RawFormat {
                label: "ghost".to_string(),
                pattern: "*.dat".to_string(),
            },
            RawFormat {
                label: "map".to_string(),
                pattern: "*.csv".to_string(),
            },
        ];
        let default_visible_columns = vec![
            "name".to_string(),
            "date".to_string(),
            "sample".to_string(),
        ];
        Self {
            columns,
            raw_formats,
            default_visible_columns,
        }
    }

    /// Load a schema definition from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a schema definition from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        let config: SchemaConfig = toml::from_str(content)?;
        Self::new(config.columns, config.formats, config.display.columns)
    }

    /// Validate the schema invariants.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }

        let mut auto_keys = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ColumnKind::AutoKey);
        match auto_keys.next() {
            None => return Err(SchemaError::MissingAutoKey),
            Some((0, _)) => {}
            Some((_, column)) => {
                return Err(SchemaError::MisplacedAutoKey {
                    name: column.name.clone(),
                })
            }
        }
        if let Some((_, column)) = auto_keys.next() {
            return Err(SchemaError::MisplacedAutoKey {
                name: column.name.clone(),
            });
        }

        for name in &self.default_visible_columns {
            if !seen.contains(name.as_str()) {
                return Err(SchemaError::UnknownVisibleColumn { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The auto-key column (first by invariant).
    pub fn auto_key(&self) -> &ColumnSpec {
        &self.columns[0]
    }

    /// Registered raw instrument formats.
    pub fn raw_formats(&self) -> &[RawFormat] {
        &self.raw_formats
    }

    /// Find the raw format matching a file extension (case-insensitive).
    pub fn format_for_extension(&self, extension: &str) -> Option<&RawFormat> {
        self.raw_formats
            .iter()
            .find(|f| f.matches_extension(extension))
    }

    /// Ordered subset of columns shown in a summary view by default.
    pub fn default_visible_columns(&self) -> &[String] {
        &self.default_visible_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_is_valid() {
        let schema = SchemaDefinition::standard();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.auto_key().name, "id");
        assert_eq!(schema.columns().len(), 24);
    }

    #[test]
    fn test_standard_schema_defaults() {
        let schema = SchemaDefinition::standard();
        let angle = schema.column("scattering_angle").unwrap();
        assert_eq!(angle.default.as_deref(), Some("180"));
        assert_eq!(angle.kind, ColumnKind::Real);
        assert!(schema.column("tfp_range").is_some());
    }

    #[test]
    fn test_format_dispatch_is_case_insensitive() {
        let schema = SchemaDefinition::standard();
        assert_eq!(schema.format_for_extension("DAT").unwrap().label, "ghost");
        assert_eq!(schema.format_for_extension("dat").unwrap().label, "ghost");
        assert_eq!(schema.format_for_extension("csv").unwrap().label, "map");
        assert!(schema.format_for_extension("npy").is_none());
    }

    #[test]
    fn test_parse_toml_schema() {
        let toml = r#"
            [[columns]]
            name = "id"
            kind = "auto_key"

            [[columns]]
            name = "name"
            kind = "text"

            [[columns]]
            name = "tfp_range"
            kind = "real"
            default = "0"

            [[formats]]
            label = "ghost"
            pattern = "*.dat"

            [display]
            columns = ["name"]
        "#;

        let schema = SchemaDefinition::from_toml_str(toml).unwrap();
        assert_eq!(schema.columns().len(), 3);
        assert_eq!(schema.default_visible_columns(), ["name"]);
        assert_eq!(schema.column("tfp_range").unwrap().default.as_deref(), Some("0"));
    }

    #[test]
    fn test_auto_key_must_be_first() {
        let toml = r#"
            [[columns]]
            name = "name"
            kind = "text"

            [[columns]]
            name = "id"
            kind = "auto_key"
        "#;
        assert!(matches!(
            SchemaDefinition::from_toml_str(toml),
            Err(SchemaError::MisplacedAutoKey { .. })
        ));
    }

    #[test]
    fn test_auto_key_required_and_unique() {
        let missing = r#"
            [[columns]]
            name = "name"
            kind = "text"
        "#;
        assert!(matches!(
            SchemaDefinition::from_toml_str(missing),
            Err(SchemaError::MissingAutoKey)
        ));

        let doubled = r#"
            [[columns]]
            name = "id"
            kind = "auto_key"

            [[columns]]
            name = "id2"
            kind = "auto_key"
        "#;
        assert!(matches!(
            SchemaDefinition::from_toml_str(doubled),
            Err(SchemaError::MisplacedAutoKey { .. })
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let toml = r#"
            [[columns]]
            name = "id"
            kind = "auto_key"

            [[columns]]
            name = "name"
            kind = "text"

            [[columns]]
            name = "name"
            kind = "text"
        "#;
        assert!(matches!(
            SchemaDefinition::from_toml_str(toml),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_unknown_visible_column_rejected() {
        let toml = r#"
            [[columns]]
            name = "id"
            kind = "auto_key"

            [display]
            columns = ["nope"]
        "#;
        assert!(matches!(
            SchemaDefinition::from_toml_str(toml),
            Err(SchemaError::UnknownVisibleColumn { .. })
        ));
    }
}
