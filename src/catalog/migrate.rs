//! Additive schema synchronization for existing catalogs.
//!
//! Compares the live `spectra` column set against the schema definition:
//! equal sets are a no-op, schema-only columns are added transactionally,
//! and live-only columns are surfaced as an inconsistency. Row data is never
//! altered and columns are never dropped or renamed.

use log::warn;
use rusqlite::Connection;
use std::collections::HashSet;

use crate::schema::{ColumnKind, SchemaDefinition};

use super::store::{create_table_sql, SPECTRA_TABLE};
use super::CatalogError;

/// What the synchronizer did to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSync {
    /// Live columns already match the schema.
    UpToDate,
    /// The catalog had no `spectra` table; it was created from scratch.
    Created,
    /// The named columns were added, in schema order.
    ColumnsAdded(Vec<String>),
}

/// Synchronize the live table with the schema definition.
///
/// All column additions happen inside one transaction: either every missing
/// column is added or none is, so a failure never leaves the catalog between
/// the old and new schema unreported.
pub fn synchronize(
    conn: &mut Connection,
    schema: &SchemaDefinition,
) -> Result<SchemaSync, CatalogError> {
    let live = live_columns(conn)?;
    if live.is_empty() {
        conn.execute(&create_table_sql(schema), [])?;
        return Ok(SchemaSync::Created);
    }

    let declared: HashSet<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
    let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();

    let mut extra: Vec<&str> = live_set.difference(&declared).copied().collect();
    if !extra.is_empty() {
        extra.sort_unstable();
        warn!(
            "catalog has columns the schema does not declare: [{}]",
            extra.join(", ")
        );
        return Err(CatalogError::SchemaInconsistency {
            columns: extra.join(", "),
        });
    }

    let missing: Vec<_> = schema
        .columns()
        .iter()
        .filter(|c| !live_set.contains(c.name.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(SchemaSync::UpToDate);
    }

    // A primary key cannot be retrofitted with ALTER TABLE.
    if let Some(key) = missing.iter().find(|c| c.kind == ColumnKind::AutoKey) {
        return Err(CatalogError::SchemaInconsistency {
            columns: key.name.clone(),
        });
    }

    let tx = conn.transaction()?;
    let mut added = Vec::with_capacity(missing.len());
    for column in missing {
        tx.execute(
            &format!(
                "ALTER TABLE {SPECTRA_TABLE} ADD COLUMN {} {}",
                column.name,
                column.kind.sql_type()
            ),
            [],
        )?;
        added.push(column.name.clone());
    }
    tx.commit()?;

    Ok(SchemaSync::ColumnsAdded(added))
}

/// Column names of the live `spectra` table, empty if the table is missing.
fn live_columns(conn: &Connection) -> Result<Vec<String>, CatalogError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({SPECTRA_TABLE})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = Vec::new();
    for name in names {
        columns.push(name?);
    }
    Ok(columns)
}
