/// Errors that can occur during catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Error from the underlying SQLite engine
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Live catalog columns drifted from the schema in a non-additive way
    #[error("catalog schema drift is not purely additive; affected columns: [{columns}]")]
    SchemaInconsistency {
        /// Comma-separated offending column names
        columns: String,
    },

    /// No catalog row matches the given container filepath
    #[error("no catalog row with filepath '{filepath}'")]
    RowNotFound {
        /// The filepath that matched nothing
        filepath: String,
    },

    /// A supplied value names a column the schema does not declare
    #[error("unknown catalog column '{name}'")]
    UnknownColumn {
        /// The unknown column name
        name: String,
    },

    /// A textual value could not be converted to the column's storage kind
    #[error("value '{value}' is not valid for column '{column}'")]
    InvalidValue {
        /// Target column name
        column: String,
        /// The rejected textual value
        value: String,
    },
}
