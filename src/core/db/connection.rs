//! Connection Management Module
//!
//! This module provides the database handle: connection lifecycle, statement
//! execution, cursor passthroughs and transaction control.
//!
//! Connections run with autocommit disabled. A transaction is opened before
//! the first write or DDL statement and stays open until [`DatabaseHandle::commit`]
//! or [`DatabaseHandle::rollback`]. Reads outside a transaction take no lasting
//! lock, so other connections to the same file can still commit.

use crate::config;
use crate::core::db::cursor::Cursor;
use crate::core::db::sql::{self, Statement, StatementType};
use crate::core::value::{Row, RowFormat, Value};
use crate::core::{DbError, Result};
use rusqlite::{params_from_iter, Connection};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Character set requested for the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Charset {
    Utf8,
    #[default]
    Utf8mb4,
    Utf16,
}

impl Charset {
    /// Text encoding name understood by the SQLite driver.
    fn encoding(self) -> &'static str {
        match self {
            Charset::Utf8 | Charset::Utf8mb4 => "UTF-8",
            Charset::Utf16 => "UTF-16",
        }
    }
}

impl FromStr for Charset {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "utf8mb3" => Ok(Charset::Utf8),
            "utf8mb4" => Ok(Charset::Utf8mb4),
            "utf16" | "utf-16" | "utf16le" | "utf-16le" | "utf16be" | "utf-16be" => Ok(Charset::Utf16),
            other => Err(DbError::Config(format!("unsupported character set: {}", other))),
        }
    }
}

impl TryFrom<String> for Charset {
    type Error = DbError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Parameters for [`DatabaseHandle::connect`].
///
/// The SQLite driver opens `database` as a file path (or `:memory:`). Host,
/// port and credentials are accepted so option files stay interchangeable
/// with networked clients; they are logged, never stored on the handle.
#[derive(Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: Charset,
    pub row_format: RowFormat,
}

impl ConnectOptions {
    pub fn new(database: impl Into<String>) -> Self {
        ConnectOptions {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_row_format(mut self, row_format: RowFormat) -> Self {
        self.row_format = row_format;
        self
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            charset: Charset::default(),
            row_format: RowFormat::default(),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("row_format", &self.row_format)
            .finish()
    }
}

/// A single database connection with its cursor state.
///
/// Every fallible call returns a [`Result`]; the display text of the most
/// recent failure is also kept and available through [`last_error`](Self::last_error).
#[derive(Debug, Default)]
pub struct DatabaseHandle {
    pub(super) connection: Option<Connection>,
    pub(super) cursor: Cursor,
    row_format: RowFormat,
    last_error: Option<String>,
}

impl DatabaseHandle {
    /// Creates a disconnected handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection, replacing (and closing) any open one.
    pub fn connect(&mut self, options: &ConnectOptions) -> Result<()> {
        let result = self.open(options);
        self.track(result)
    }

    /// Opens a connection from a `.cnf` defaults file.
    ///
    /// The path must exist and carry the `.cnf` extension; see
    /// [`config::load_defaults`] for the file layout.
    pub fn connect_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let result = config::load_defaults(path.as_ref()).and_then(|options| self.open(&options));
        self.track(result)
    }

    fn open(&mut self, options: &ConnectOptions) -> Result<()> {
        if options.database.trim().is_empty() {
            return Err(DbError::Connect("no database given".to_string()));
        }

        if self.connection.is_some() {
            info!("Replacing open connection");
            self.close()?;
        }

        debug!(
            host = %options.host,
            port = options.port,
            user = %options.user,
            "Network parameters are not used by the SQLite driver"
        );

        let conn = if options.database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&options.database)
        }
        .map_err(|e| DbError::Connect(format!("{} ({})", e, options.database)))?;

        conn.execute_batch(&format!("PRAGMA encoding = '{}';", options.charset.encoding()))
            .map_err(|e| DbError::Connect(e.to_string()))?;

        self.connection = Some(conn);
        self.cursor.reset();
        self.row_format = options.row_format;
        info!(database = %options.database, "Connected");
        Ok(())
    }

    /// Returns `true` while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Display text of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn row_format(&self) -> RowFormat {
        self.row_format
    }

    /// Stores the failure text of `result` before handing it back.
    pub(super) fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let message = e.to_string();
            warn!(error = %message, "Database operation failed");
            self.last_error = Some(message);
        }
        result
    }

    /// Runs one statement and loads its outcome into the cursor.
    pub(super) fn run(&mut self, statement: &Statement) -> Result<()> {
        let conn = self.connection.as_ref().ok_or(DbError::NotConnected)?;
        let kind = StatementType::from_sql(&statement.sql);
        let fail = |e: rusqlite::Error| DbError::Statement {
            message: e.to_string(),
            sql: statement.rendered.clone(),
        };

        if kind.opens_transaction() && conn.is_autocommit() {
            conn.execute_batch("BEGIN").map_err(fail)?;
        }

        debug!(sql = %statement.rendered, "Executing statement");
        let mut stmt = conn.prepare(&statement.sql).map_err(fail)?;

        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = columns.len();
            let mut rows = stmt
                .query(params_from_iter(statement.params.iter()))
                .map_err(fail)?;

            let mut collected = Vec::new();
            while let Some(row) = rows.next().map_err(fail)? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(Value::from(row.get_ref(i).map_err(fail)?));
                }
                collected.push(values);
            }
            debug!(rows = collected.len(), "Query returned rows");
            self.cursor.load_rows(columns, collected);
        } else {
            let changed = stmt
                .execute(params_from_iter(statement.params.iter()))
                .map_err(fail)?;
            let last_id = kind.inserts_rows().then(|| conn.last_insert_rowid());
            debug!(changed, "Statement changed rows");
            self.cursor.record_changes(changed as u64, last_id);
        }

        Ok(())
    }

    /// Runs arbitrary SQL text. Empty text is a successful no-op that leaves
    /// the cursor untouched.
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        if sql.trim().is_empty() {
            return Ok(());
        }
        let result = self.run(&Statement::raw(sql));
        self.track(result)
    }

    /// Runs SQL text with `?` placeholders bound to `params`.
    pub fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        if sql.trim().is_empty() {
            return Ok(());
        }
        let result = sql::bind(sql, params).and_then(|statement| self.run(&statement));
        self.track(result)
    }

    /// Takes the next row of the last query.
    pub fn fetch_row(&mut self) -> Option<Row> {
        self.cursor.next_row()
    }

    /// Takes every remaining row of the last query.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        if self.connection.is_none() {
            return self.track(Err(DbError::NotConnected));
        }
        Ok(self.cursor.drain())
    }

    /// Like [`fetch_all`](Self::fetch_all), rendered with the connection's row format.
    pub fn fetch_all_json(&mut self) -> Result<serde_json::Value> {
        let format = self.row_format;
        let result = self.fetch_all().and_then(|rows| {
            rows.iter()
                .map(|row| row.to_json(format).map_err(DbError::from))
                .collect::<Result<Vec<_>>>()
                .map(serde_json::Value::Array)
        });
        self.track(result)
    }

    /// `true` when the last statement returned or changed no rows.
    pub fn is_empty(&self) -> bool {
        self.cursor.row_count() == 0
    }

    pub fn row_count(&self) -> u64 {
        self.cursor.row_count()
    }

    /// Row id of the last `INSERT`/`REPLACE`, if the last statement was one.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.cursor.last_insert_id()
    }

    /// Column names of the last query.
    pub fn columns(&self) -> &[String] {
        self.cursor.columns()
    }

    /// Commits the open transaction. Succeeds when none is open.
    pub fn commit(&mut self) -> Result<()> {
        let result = match &self.connection {
            None => Err(DbError::NotConnected),
            Some(conn) if conn.is_autocommit() => Ok(()),
            Some(conn) => conn
                .execute_batch("COMMIT")
                .map_err(|e| DbError::Commit(e.to_string())),
        };
        if result.is_ok() {
            debug!("Committed");
        }
        self.track(result)
    }

    /// Rolls back the open transaction. Succeeds when none is open.
    pub fn rollback(&mut self) -> Result<()> {
        let result = match &self.connection {
            None => Err(DbError::NotConnected),
            Some(conn) if conn.is_autocommit() => Ok(()),
            Some(conn) => conn
                .execute_batch("ROLLBACK")
                .map_err(|e| DbError::Rollback(e.to_string())),
        };
        if result.is_ok() {
            debug!("Rolled back");
        }
        self.track(result)
    }

    /// Closes the connection. Uncommitted work is discarded by the driver.
    ///
    /// Closing a closed handle succeeds.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.connection.take() else {
            return Ok(());
        };
        self.cursor.reset();
        let result = match conn.close() {
            Ok(()) => {
                info!("Connection closed");
                Ok(())
            }
            Err((conn, e)) => {
                self.connection = Some(conn);
                Err(DbError::Close(e.to_string()))
            }
        };
        self.track(result)
    }
}
