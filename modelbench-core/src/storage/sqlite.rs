//! SQLite-backed [`Storage`] implementation.

use super::{DatasetMetadata, Storage, TestResult};
use crate::config::StorageConfig;
use crate::data::schema::infer_schema;
use crate::data::table::DataBatch;
use crate::error::MlError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

/// Benchmark store on a single SQLite connection held for the process lifetime.
pub struct SqliteStore {
    conn: Connection,
    /// Result of the probe run at connect time.
    ready: bool,
    metadata_table: String,
    results_table: String,
}

impl SqliteStore {
    /// Open the database named by `config`.
    pub fn connect(config: &StorageConfig) -> Result<Self, MlError> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(|e| {
            MlError::connection(format!(
                "Failed to open database {}: {e}",
                config.path.display()
            ))
        })?;

        let ready = probe(&conn);
        if ready {
            tracing::info!(path = %config.path.display(), "Connected to benchmark store");
        } else {
            tracing::error!(
                path = %config.path.display(),
                "Benchmark store failed its readiness probe"
            );
        }

        Ok(Self {
            conn,
            ready,
            metadata_table: config.metadata_table.clone(),
            results_table: config.results_table.clone(),
        })
    }

    /// Throwaway in-memory store with the default table names.
    pub fn in_memory() -> Result<Self, MlError> {
        Self::connect(&StorageConfig::in_memory())
    }

    pub fn metadata_table(&self) -> &str {
        &self.metadata_table
    }

    pub fn results_table(&self) -> &str {
        &self.results_table
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, MlError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn ensure_metadata_table(&self) -> Result<(), MlError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                dataset_name TEXT PRIMARY KEY,
                beschreibung TEXT,
                df_tabelle TEXT,
                x_test_tabelle TEXT,
                x_train_tabelle TEXT,
                y_test_tabelle TEXT,
                y_train_tabelle TEXT
            )",
            quote_ident(&self.metadata_table)
        ))?;
        Ok(())
    }

    fn ensure_results_table(&self) -> Result<(), MlError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                modellname TEXT NOT NULL,
                datenname TEXT NOT NULL,
                durchgang INTEGER NOT NULL,
                score REAL,
                f1 REAL,
                dauer REAL,
                laufzeit TEXT,
                cm TEXT
            )",
            quote_ident(&self.results_table)
        ))?;
        Ok(())
    }
}

fn probe(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map(|v| v == 1)
        .unwrap_or(false)
}

/// Quote an identifier for SQLite, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(cell: &Value) -> SqlValue {
    match cell {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Number(n.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::String("<blob>".to_string()),
    }
}

impl Storage for SqliteStore {
    fn test_connection(&self) -> bool {
        if !self.ready {
            return false;
        }
        probe(&self.conn)
    }

    fn write_table(&self, batch: &DataBatch, table: &str) -> Result<(), MlError> {
        if batch.columns.is_empty() {
            return Err(MlError::invalid_input(format!(
                "cannot write table '{table}' without columns"
            )));
        }
        let schema = infer_schema(&batch.columns, &batch.rows);
        let column_defs: Vec<String> = schema
            .columns
            .iter()
            .map(|c| {
                format!("{} {}", quote_ident(&c.name), c.dtype.sql_affinity())
                    .trim_end()
                    .to_string()
            })
            .collect();
        let placeholders: Vec<String> = (1..=batch.columns.len())
            .map(|i| format!("?{i}"))
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table_q}; CREATE TABLE {table_q} ({cols});",
            table_q = quote_ident(table),
            cols = column_defs.join(", ")
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote_ident(table),
                placeholders.join(", ")
            ))?;
            for row in &batch.rows {
                let values = (0..batch.columns.len())
                    .map(|i| row.get(i).map(to_sql).unwrap_or(SqlValue::Null));
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;

        tracing::debug!(table, rows = batch.row_count(), "Wrote table");
        Ok(())
    }

    fn read_table(&self, table: &str) -> Result<DataBatch, MlError> {
        if !self.table_exists(table)? {
            return Err(MlError::not_found(format!("table '{table}'")));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(table)))?;
        let column_count = stmt.column_count();
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = Vec::new();
        let mut result_rows = stmt.query([])?;
        while let Some(row) = result_rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(from_sql(row.get_ref(i)?));
            }
            rows.push(values);
        }

        Ok(DataBatch::new(columns, rows))
    }

    fn append_metadata(&self, record: &DatasetMetadata) -> Result<(), MlError> {
        self.ensure_metadata_table()?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (dataset_name, beschreibung, df_tabelle, x_test_tabelle,
                    x_train_tabelle, y_test_tabelle, y_train_tabelle)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(dataset_name) DO UPDATE SET
                    beschreibung = excluded.beschreibung,
                    df_tabelle = excluded.df_tabelle,
                    x_test_tabelle = excluded.x_test_tabelle,
                    x_train_tabelle = excluded.x_train_tabelle,
                    y_test_tabelle = excluded.y_test_tabelle,
                    y_train_tabelle = excluded.y_train_tabelle",
                quote_ident(&self.metadata_table)
            ),
            rusqlite::params![
                record.dataset_name,
                record.description,
                record.combined_table,
                record.x_test_table,
                record.x_train_table,
                record.y_test_table,
                record.y_train_table,
            ],
        )?;
        Ok(())
    }

    fn read_metadata(&self) -> Result<Vec<DatasetMetadata>, MlError> {
        if !self.table_exists(&self.metadata_table)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT dataset_name, beschreibung, df_tabelle, x_test_tabelle, x_train_tabelle,
                    y_test_tabelle, y_train_tabelle
             FROM {} ORDER BY rowid",
            quote_ident(&self.metadata_table)
        ))?;
        let records = stmt
            .query_map([], |row| {
                Ok(DatasetMetadata {
                    dataset_name: row.get(0)?,
                    description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    combined_table: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    x_test_table: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    x_train_table: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    y_test_table: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    y_train_table: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn append_result(&self, record: &TestResult) -> Result<(), MlError> {
        self.ensure_results_table()?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (modellname, datenname, durchgang, score, f1, dauer, laufzeit, cm)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                quote_ident(&self.results_table)
            ),
            rusqlite::params![
                record.model_name,
                record.dataset_name,
                record.trial,
                record.score,
                record.f1,
                record.duration_secs,
                record.timestamp.to_rfc3339(),
                record.confusion_matrix,
            ],
        )?;
        Ok(())
    }

    fn read_all_results(&self) -> Result<Vec<TestResult>, MlError> {
        if !self.table_exists(&self.results_table)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT modellname, datenname, durchgang, score, f1, dauer, laufzeit, cm
             FROM {} ORDER BY id",
            quote_ident(&self.results_table)
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(model, dataset, trial, score, f1, dauer, laufzeit, cm)| {
                let laufzeit = laufzeit.unwrap_or_default();
                let timestamp = DateTime::parse_from_rfc3339(&laufzeit)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        MlError::invalid_input(format!("bad laufzeit '{laufzeit}': {e}"))
                    })?;
                let trial = u32::try_from(trial)
                    .map_err(|_| MlError::invalid_input(format!("bad durchgang {trial}")))?;
                Ok(TestResult {
                    model_name: model,
                    dataset_name: dataset,
                    trial,
                    score: score.unwrap_or(f64::NAN),
                    f1: f1.unwrap_or(f64::NAN),
                    duration_secs: dauer.unwrap_or(f64::NAN),
                    timestamp,
                    confusion_matrix: cm.unwrap_or_default(),
                })
            })
            .collect()
    }
}
