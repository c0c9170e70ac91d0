use log::{debug, info};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::schema::{ColumnKind, ColumnSpec, SchemaDefinition};

use super::migrate::{self, SchemaSync};
use super::CatalogError;

/// Name of the one table every catalog holds.
pub const SPECTRA_TABLE: &str = "spectra";

/// A value stored in one catalog cell.
///
/// SQLite is dynamically typed; this enum pins each cell to the storage kind
/// its column declares. `Null` appears only in rows that predate an additive
/// migration which introduced their column.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogValue {
    /// Absent value (column added after the row was inserted).
    Null,
    /// Integer cell.
    Integer(i64),
    /// Real cell.
    Real(f64),
    /// Text cell.
    Text(String),
}

impl CatalogValue {
    /// Convert a textual value to the given storage kind.
    pub fn parse(kind: ColumnKind, column: &str, text: &str) -> Result<Self, CatalogError> {
        match kind {
            ColumnKind::Text => Ok(CatalogValue::Text(text.to_string())),
            ColumnKind::Integer | ColumnKind::AutoKey => text
                .trim()
                .parse::<i64>()
                .map(CatalogValue::Integer)
                .map_err(|_| CatalogError::InvalidValue {
                    column: column.to_string(),
                    value: text.to_string(),
                }),
            ColumnKind::Real => text
                .trim()
                .parse::<f64>()
                .map(CatalogValue::Real)
                .map_err(|_| CatalogError::InvalidValue {
                    column: column.to_string(),
                    value: text.to_string(),
                }),
        }
    }

    /// The documented insert default for a column: its declared default if
    /// any, otherwise `"Not specified"` for text and `0` for numeric kinds.
    pub fn default_for(spec: &ColumnSpec) -> Result<Self, CatalogError> {
        match &spec.default {
            Some(text) => Self::parse(spec.kind, &spec.name, text),
            None => Ok(match spec.kind {
                ColumnKind::Text => CatalogValue::Text("Not specified".to_string()),
                ColumnKind::Integer | ColumnKind::AutoKey => CatalogValue::Integer(0),
                ColumnKind::Real => CatalogValue::Real(0.0),
            }),
        }
    }

    fn from_sql(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CatalogValue::Null,
            ValueRef::Integer(i) => CatalogValue::Integer(i),
            ValueRef::Real(f) => CatalogValue::Real(f),
            ValueRef::Text(t) => CatalogValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(_) => CatalogValue::Null,
        }
    }
}

impl fmt::Display for CatalogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogValue::Null => Ok(()),
            CatalogValue::Integer(i) => write!(f, "{i}"),
            CatalogValue::Real(r) => write!(f, "{r}"),
            CatalogValue::Text(t) => write!(f, "{t}"),
        }
    }
}

impl ToSql for CatalogValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CatalogValue::Null => ToSqlOutput::Owned(Value::Null),
            CatalogValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CatalogValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            CatalogValue::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
        })
    }
}

/// One catalog row, with cells in catalog column order.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    cells: Vec<(String, CatalogValue)>,
}

impl CatalogRow {
    /// Value of a column, if the row has it.
    pub fn get(&self, column: &str) -> Option<&CatalogValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// All cells in column order.
    pub fn cells(&self) -> &[(String, CatalogValue)] {
        &self.cells
    }

    /// The auto-key row identifier.
    pub fn id(&self) -> Option<i64> {
        match self.cells.first() {
            Some((_, CatalogValue::Integer(id))) => Some(*id),
            _ => None,
        }
    }

    /// The measurement name.
    pub fn name(&self) -> Option<&str> {
        match self.get("name") {
            Some(CatalogValue::Text(name)) => Some(name),
            _ => None,
        }
    }

    /// The owning container's filepath.
    pub fn filepath(&self) -> Option<&str> {
        match self.get("filepath") {
            Some(CatalogValue::Text(path)) => Some(path),
            _ => None,
        }
    }
}

/// The SQLite-backed relational index of measurements.
pub struct CatalogStore {
    conn: Connection,
    schema: Arc<SchemaDefinition>,
    path: PathBuf,
}

impl CatalogStore {
    /// Create a new catalog file (or adopt an empty one) with the `spectra`
    /// table generated from the schema.
    pub fn create<P: AsRef<Path>>(
        path: P,
        schema: Arc<SchemaDefinition>,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(&create_table_sql(&schema), [])?;
        info!("created catalog at {}", path.display());
        Ok(Self { conn, schema, path })
    }

    /// Open an existing catalog and synchronize its schema.
    ///
    /// Returns the store and what the synchronizer did: nothing, created the
    /// table, or added the named columns. Non-additive drift fails with
    /// [`CatalogError::SchemaInconsistency`].
    pub fn open<P: AsRef<Path>>(
        path: P,
        schema: Arc<SchemaDefinition>,
    ) -> Result<(Self, SchemaSync), CatalogError> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)?;
        let sync = migrate::synchronize(&mut conn, &schema)?;
        match &sync {
            SchemaSync::UpToDate => debug!("catalog schema up to date: {}", path.display()),
            SchemaSync::Created => info!("initialized empty catalog: {}", path.display()),
            SchemaSync::ColumnsAdded(added) => {
                info!(
                    "migrated catalog {}: added columns [{}]",
                    path.display(),
                    added.join(", ")
                );
            }
        }
        Ok((Self { conn, schema, path }, sync))
    }

    /// An in-memory catalog, for tests and scratch work.
    pub fn in_memory(schema: Arc<SchemaDefinition>) -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(&create_table_sql(&schema), [])?;
        Ok(Self {
            conn,
            schema,
            path: PathBuf::from(":memory:"),
        })
    }

    /// The schema this catalog was opened with.
    pub fn schema(&self) -> &Arc<SchemaDefinition> {
        &self.schema
    }

    /// Filesystem path of the catalog file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a row with the given measurement name exists.
    ///
    /// Name uniqueness is enforced by this pre-insert check in the ingestion
    /// pipeline, not by a database constraint.
    pub fn name_exists(&self, name: &str) -> Result<bool, CatalogError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {SPECTRA_TABLE} WHERE name = ?1"),
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a row. Unsupplied columns receive their documented defaults;
    /// the auto-key is generated by the engine. Returns the stored row.
    pub fn insert_row(
        &self,
        supplied: &BTreeMap<String, CatalogValue>,
    ) -> Result<CatalogRow, CatalogError> {
        for name in supplied.keys() {
            match self.schema.column(name) {
                None => return Err(CatalogError::UnknownColumn { name: name.clone() }),
                Some(spec) if spec.kind == ColumnKind::AutoKey => {
                    return Err(CatalogError::UnknownColumn { name: name.clone() })
                }
                Some(_) => {}
            }
        }

        let mut names = Vec::new();
        let mut values = Vec::new();
        for spec in self.schema.columns().iter().skip(1) {
            let value = match supplied.get(&spec.name) {
                Some(value) => value.clone(),
                None => CatalogValue::default_for(spec)?,
            };
            names.push(spec.name.as_str());
            values.push(value);
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {SPECTRA_TABLE} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(values.iter()))?;

        let id = self.conn.last_insert_rowid();
        debug!("inserted catalog row {id}");
        self.fetch_by_id(id)
    }

    /// Fetch a row by its auto-key identifier.
    pub fn fetch_by_id(&self, id: i64) -> Result<CatalogRow, CatalogError> {
        let key = &self.schema.auto_key().name;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {SPECTRA_TABLE} WHERE {key} = ?1"))?;
        let row = stmt.query_row([id], row_to_cells)?;
        Ok(row)
    }

    /// Fetch the row owning the given container filepath.
    pub fn find_by_filepath(&self, filepath: &str) -> Result<Option<CatalogRow>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {SPECTRA_TABLE} WHERE filepath = ?1"))?;
        let mut rows = stmt.query([filepath])?;
        match rows.next()? {
            Some(row) => Ok(Some(cells_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Full scan, in insertion order.
    pub fn fetch_all(&self) -> Result<Vec<CatalogRow>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {SPECTRA_TABLE}"))?;
        let rows = stmt.query_map([], row_to_cells)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Update the row matching `filepath`, setting the supplied columns.
    pub fn update_by_filepath(
        &self,
        filepath: &str,
        values: &BTreeMap<String, CatalogValue>,
    ) -> Result<(), CatalogError> {
        if values.is_empty() {
            return Ok(());
        }
        for name in values.keys() {
            if self.schema.column(name).is_none() {
                return Err(CatalogError::UnknownColumn { name: name.clone() });
            }
        }

        let mut assignments = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        for (i, (name, value)) in values.iter().enumerate() {
            assignments.push(format!("{name} = ?{}", i + 1));
            params.push(value);
        }
        params.push(&filepath);
        let sql = format!(
            "UPDATE {SPECTRA_TABLE} SET {} WHERE filepath = ?{}",
            assignments.join(", "),
            params.len()
        );

        let changed = self.conn.execute(&sql, params.as_slice())?;
        if changed == 0 {
            return Err(CatalogError::RowNotFound {
                filepath: filepath.to_string(),
            });
        }
        debug!("updated catalog row for {filepath}");
        Ok(())
    }

    /// Delete the row matching `filepath`.
    ///
    /// Deleting the row and deleting the container file are two separate,
    /// separately confirmed actions; this touches only the catalog.
    pub fn delete_by_filepath(&self, filepath: &str) -> Result<(), CatalogError> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {SPECTRA_TABLE} WHERE filepath = ?1"),
            [filepath],
        )?;
        if changed == 0 {
            return Err(CatalogError::RowNotFound {
                filepath: filepath.to_string(),
            });
        }
        info!("removed catalog row for {filepath}");
        Ok(())
    }
}

/// `CREATE TABLE` statement generated from the schema, columns in
/// declaration order.
pub(crate) fn create_table_sql(schema: &SchemaDefinition) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", c.name, c.kind.sql_type()))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {SPECTRA_TABLE} ({})",
        columns.join(", ")
    )
}

fn row_to_cells(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogRow> {
    cells_from_row(row)
}

fn cells_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogRow> {
    let count = row.as_ref().column_count();
    let mut cells = Vec::with_capacity(count);
    for i in 0..count {
        let name = row.as_ref().column_name(i)?.to_string();
        cells.push((name, CatalogValue::from_sql(row.get_ref(i)?)));
    }
    Ok(CatalogRow { cells })
}
