//! Tabular store for customer records.
//!
//! The raw table is only ever read. Derived data goes to a separate output
//! table and projection view, both replaced inside one transaction per run.

use crate::config::{ColumnMapping, DatabaseConfig};
use crate::error::ChurnError;
use crate::export::{EXPORT_COLUMNS, ExportRow};
use crate::pipeline::DataPolicy;
use crate::record::{CustomerRecord, FeatureRecord, ServiceFlags};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

/// Read raw customers and persist derived features.
pub trait CustomerStore {
    /// Every row of the raw table, in table order.
    fn read_all(&self) -> Result<Vec<CustomerRecord>, ChurnError>;

    /// Replace the derived output with `features`. All or nothing.
    fn write_features(&mut self, features: &[FeatureRecord]) -> Result<(), ChurnError>;
}

/// Output table columns after the raw ones, with their SQL types.
const DERIVED_COLUMNS: [(&str, &str); 11] = [
    ("gender_code", "INTEGER NOT NULL"),
    ("internet_dsl", "INTEGER NOT NULL"),
    ("internet_fiber", "INTEGER NOT NULL"),
    ("internet_no", "INTEGER NOT NULL"),
    ("contract_numeric", "INTEGER"),
    ("num_services", "INTEGER NOT NULL"),
    ("tenure_bin", "TEXT NOT NULL"),
    ("tenure_bin_short", "INTEGER NOT NULL"),
    ("tenure_bin_med", "INTEGER NOT NULL"),
    ("tenure_bin_long", "INTEGER NOT NULL"),
    ("monthly_charges_norm", "REAL"),
];

/// Raw columns as stored in the output table (normalized names).
const RAW_COLUMNS: [(&str, &str); 13] = [
    ("customer_id", "TEXT PRIMARY KEY"),
    ("gender", "TEXT"),
    ("senior_citizen", "INTEGER"),
    ("tenure", "INTEGER"),
    ("internet_service", "TEXT"),
    ("contract", "TEXT"),
    ("online_security", "TEXT"),
    ("online_backup", "TEXT"),
    ("device_protection", "TEXT"),
    ("tech_support", "TEXT"),
    ("streaming_tv", "TEXT"),
    ("streaming_movies", "TEXT"),
    ("monthly_charges", "REAL"),
];

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite-backed customer store.
pub struct SqliteStore {
    conn: Connection,
    database: DatabaseConfig,
    columns: ColumnMapping,
    policy: DataPolicy,
}

impl SqliteStore {
    /// Open (or create) the database file named in `database.path`.
    pub fn open(
        database: &DatabaseConfig,
        columns: &ColumnMapping,
        policy: DataPolicy,
    ) -> Result<Self, ChurnError> {
        let conn = Connection::open(&database.path)?;
        tracing::debug!(path = %database.path.display(), "Opened SQLite database");
        Self::from_connection(conn, database, columns, policy)
    }

    /// Wrap an existing connection (e.g. an in-memory database).
    pub fn from_connection(
        conn: Connection,
        database: &DatabaseConfig,
        columns: &ColumnMapping,
        policy: DataPolicy,
    ) -> Result<Self, ChurnError> {
        let names = [
            &database.source_table,
            &database.output_table,
            &database.view_name,
        ];
        for (i, a) in names.iter().enumerate() {
            if names[i + 1..].iter().any(|b| a.eq_ignore_ascii_case(b)) {
                return Err(ChurnError::schema(format!(
                    "'{a}' would be used for more than one of source table, output table and view"
                )));
            }
        }
        Ok(Self {
            conn,
            database: database.clone(),
            columns: columns.clone(),
            policy,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Column names of a table or view, empty if it does not exist.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>, ChurnError> {
        object_columns(&self.conn, table)
    }

    fn check_source_schema(&self) -> Result<(), ChurnError> {
        let table = &self.database.source_table;
        let present = self.table_columns(table)?;
        if present.is_empty() {
            return Err(ChurnError::schema(format!(
                "source table '{table}' does not exist"
            )));
        }
        let missing: Vec<&str> = self
            .columns
            .source_columns()
            .into_iter()
            .filter(|want| !present.iter().any(|have| have.eq_ignore_ascii_case(want)))
            .collect();
        if !missing.is_empty() {
            return Err(ChurnError::schema(format!(
                "source table '{table}' is missing columns: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn record_from_row(&self, row: &Row<'_>) -> Result<CustomerRecord, ChurnError> {
        let customer_id = text_cell(row, 0)?.ok_or_else(|| {
            ChurnError::data("<null>", "customer_id", "customer identifier is missing")
        })?;
        let id = customer_id.as_str();
        Ok(CustomerRecord {
            gender: text_cell(row, 1)?,
            senior_citizen: self.integer_cell(row, 2, id, "senior_citizen")?,
            tenure: self.integer_cell(row, 3, id, "tenure")?,
            internet_service: text_cell(row, 4)?,
            contract: text_cell(row, 5)?,
            services: ServiceFlags {
                online_security: text_cell(row, 6)?,
                online_backup: text_cell(row, 7)?,
                device_protection: text_cell(row, 8)?,
                tech_support: text_cell(row, 9)?,
                streaming_tv: text_cell(row, 10)?,
                streaming_movies: text_cell(row, 11)?,
            },
            monthly_charges: self.real_cell(row, 12, id, "monthly_charges")?,
            customer_id,
        })
    }

    fn integer_cell(
        &self,
        row: &Row<'_>,
        idx: usize,
        id: &str,
        field: &'static str,
    ) -> Result<Option<i64>, ChurnError> {
        let parsed = match row.get_ref(idx)? {
            ValueRef::Null => return Ok(None),
            ValueRef::Integer(n) => Some(n),
            ValueRef::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
            ValueRef::Real(_) => None,
            ValueRef::Text(t) => {
                let s = String::from_utf8_lossy(t);
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<i64>().ok()
            }
            ValueRef::Blob(_) => None,
        };
        match parsed {
            Some(n) => Ok(Some(n)),
            None => self.unparseable(row, idx, id, field, "an integer"),
        }
    }

    fn real_cell(
        &self,
        row: &Row<'_>,
        idx: usize,
        id: &str,
        field: &'static str,
    ) -> Result<Option<f64>, ChurnError> {
        let parsed = match row.get_ref(idx)? {
            ValueRef::Null => return Ok(None),
            ValueRef::Integer(n) => Some(n as f64),
            ValueRef::Real(f) => Some(f),
            ValueRef::Text(t) => {
                let s = String::from_utf8_lossy(t);
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>().ok().filter(|f| f.is_finite())
            }
            ValueRef::Blob(_) => None,
        };
        match parsed {
            Some(f) => Ok(Some(f)),
            None => self.unparseable(row, idx, id, field, "a number"),
        }
    }

    fn unparseable<T>(
        &self,
        row: &Row<'_>,
        idx: usize,
        id: &str,
        field: &'static str,
        expected: &str,
    ) -> Result<Option<T>, ChurnError> {
        let shown = describe_cell(row.get_ref(idx)?);
        if self.policy.is_strict() {
            return Err(ChurnError::data(
                id,
                field,
                format!("expected {expected}, found {shown}"),
            ));
        }
        tracing::warn!(customer = id, field, value = %shown, "Unparseable value read as null");
        Ok(None)
    }

    /// Rows of the projection view, in output table order.
    pub fn read_view(&self) -> Result<Vec<ExportRow>, ChurnError> {
        let sql = format!(
            "SELECT {} FROM {}",
            EXPORT_COLUMNS.join(", "),
            quote_ident(&self.database.view_name)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ExportRow {
                    customer_id: row.get(0)?,
                    senior_citizen: row.get(1)?,
                    internet_dsl: row.get(2)?,
                    internet_fiber: row.get(3)?,
                    internet_no: row.get(4)?,
                    contract_numeric: row.get(5)?,
                    num_services: row.get(6)?,
                    tenure_bin_short: row.get(7)?,
                    tenure_bin_med: row.get(8)?,
                    tenure_bin_long: row.get(9)?,
                    monthly_charges_norm: row.get(10)?,
                    gender_code: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Load a raw churn CSV into the source table, replacing it.
    ///
    /// Every CSV column is kept. Mapped numeric columns get numeric affinity so
    /// clean values are stored as numbers and odd ones (e.g. blanks) stay text.
    pub fn import_csv(&mut self, path: &Path) -> Result<usize, ChurnError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let missing: Vec<&str> = self
            .columns
            .source_columns()
            .into_iter()
            .filter(|want| !headers.iter().any(|h| h == want))
            .collect();
        if !missing.is_empty() {
            return Err(ChurnError::schema(format!(
                "{} is missing columns: {}",
                path.display(),
                missing.join(", ")
            )));
        }

        let column_defs: Vec<String> = headers
            .iter()
            .map(|h| format!("{} {}", quote_ident(h), self.import_affinity(h)))
            .collect();
        let table = quote_ident(&self.database.source_table);
        let placeholders = vec!["?"; headers.len()].join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({});",
            column_defs.join(", ")
        ))?;
        let mut count = 0;
        {
            let mut insert = tx.prepare(&format!("INSERT INTO {table} VALUES ({placeholders})"))?;
            for record in reader.records() {
                let record = record?;
                insert.execute(rusqlite::params_from_iter(record.iter()))?;
                count += 1;
            }
        }
        tx.commit()?;

        tracing::info!(
            rows = count,
            table = %self.database.source_table,
            path = %path.display(),
            "Imported CSV into source table"
        );
        Ok(count)
    }

    fn import_affinity(&self, header: &str) -> &'static str {
        let c = &self.columns;
        if header == c.tenure || header == c.senior_citizen {
            "INTEGER"
        } else if header == c.monthly_charges {
            "REAL"
        } else {
            "TEXT"
        }
    }
}

impl CustomerStore for SqliteStore {
    fn read_all(&self) -> Result<Vec<CustomerRecord>, ChurnError> {
        self.check_source_schema()?;

        let select: Vec<String> = self
            .columns
            .source_columns()
            .iter()
            .map(|c| quote_ident(c))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select.join(", "),
            quote_ident(&self.database.source_table)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.record_from_row(row)?);
        }

        tracing::info!(
            rows = records.len(),
            table = %self.database.source_table,
            "Read customer records"
        );
        Ok(records)
    }

    fn write_features(&mut self, features: &[FeatureRecord]) -> Result<(), ChurnError> {
        let table = quote_ident(&self.database.output_table);
        let view = quote_ident(&self.database.view_name);

        let all_columns: Vec<(&str, &str)> = RAW_COLUMNS
            .iter()
            .chain(DERIVED_COLUMNS.iter())
            .copied()
            .collect();
        let column_defs: Vec<String> = all_columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect();
        let column_names: Vec<&str> = all_columns.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; all_columns.len()].join(", ");

        // Dropped and recreated inside the transaction, so a rerun replaces the
        // previous output and a failure leaves it untouched.
        let tx = self.conn.transaction()?;
        guard_output(&tx, &self.database.output_table, "table", &column_names)?;
        guard_output(&tx, &self.database.view_name, "view", &EXPORT_COLUMNS)?;
        tx.execute_batch(&format!(
            "DROP VIEW IF EXISTS {view};\n\
             DROP TABLE IF EXISTS {table};\n\
             CREATE TABLE {table} ({});",
            column_defs.join(", ")
        ))?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                column_names.join(", ")
            ))?;
            for f in features {
                let r = &f.raw;
                let s = &r.services;
                insert.execute(params![
                    r.customer_id,
                    r.gender,
                    r.senior_citizen,
                    r.tenure,
                    r.internet_service,
                    r.contract,
                    s.online_security,
                    s.online_backup,
                    s.device_protection,
                    s.tech_support,
                    s.streaming_tv,
                    s.streaming_movies,
                    r.monthly_charges,
                    f.gender_code,
                    f.internet_dsl,
                    f.internet_fiber,
                    f.internet_no,
                    f.contract_numeric,
                    f.num_services,
                    f.tenure_bin.as_str(),
                    f.tenure_bin_short,
                    f.tenure_bin_med,
                    f.tenure_bin_long,
                    f.monthly_charges_norm,
                ])?;
            }
        }
        tx.execute_batch(&format!(
            "CREATE VIEW {view} AS SELECT {} FROM {table} ORDER BY rowid;",
            EXPORT_COLUMNS.join(", ")
        ))?;
        tx.commit()?;

        tracing::info!(
            rows = features.len(),
            table = %self.database.output_table,
            view = %self.database.view_name,
            "Wrote derived features"
        );
        Ok(())
    }
}

fn object_columns(conn: &Connection, name: &str) -> Result<Vec<String>, ChurnError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Refuse to replace an object this store did not create.
///
/// A missing object is fine. An existing one must have the expected kind and
/// exactly the expected columns, which only a previous run produces.
fn guard_output(
    conn: &Connection,
    name: &str,
    kind: &str,
    expected: &[&str],
) -> Result<(), ChurnError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT type FROM sqlite_master WHERE name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    let Some(found) = found else {
        return Ok(());
    };
    if found != kind {
        return Err(ChurnError::schema(format!(
            "'{name}' already exists as a {found}, refusing to replace it with the output {kind}"
        )));
    }
    let present = object_columns(conn, name)?;
    if present != expected {
        return Err(ChurnError::schema(format!(
            "{kind} '{name}' exists with columns [{}] that were not written by churnfeat; \
             choose another name or drop it first",
            present.join(", ")
        )));
    }
    Ok(())
}

fn text_cell(row: &Row<'_>, idx: usize) -> Result<Option<String>, ChurnError> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    })
}

fn describe_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "null".to_string(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}
