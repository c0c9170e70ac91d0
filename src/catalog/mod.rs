//! # Catalog Store
//!
//! The catalog is a single SQLite file holding one `spectra` table, the
//! relational index of all measurements. Its columns are generated from a
//! [`SchemaDefinition`](crate::schema::SchemaDefinition) in declaration
//! order, with the first column an auto-incrementing integer key.
//!
//! Catalog access is a fixed set of operations - insert, delete, full scan,
//! update-by-key - not a general query surface. The catalog is the single
//! source of row truth; dataset truth lives in the per-measurement
//! containers, joined by the `filepath` column.
//!
//! ## Schema Synchronization
//!
//! Opening an existing catalog runs the schema synchronizer: columns the
//! schema has gained since the catalog was created are added in one
//! transaction (`ALTER TABLE ... ADD COLUMN`, one statement per column).
//! Columns are never dropped or renamed; a live table carrying columns the
//! schema does not know is surfaced as
//! [`CatalogError::SchemaInconsistency`] rather than reconciled
//! destructively.

mod error;
mod migrate;
mod store;

#[cfg(test)]
mod tests;

pub use error::CatalogError;
pub use migrate::SchemaSync;
pub use store::{CatalogRow, CatalogStore, CatalogValue, SPECTRA_TABLE};
