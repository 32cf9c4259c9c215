//! CRUD helpers on [`DatabaseHandle`].
//!
//! Each helper builds a parameterized statement from structured arguments,
//! runs it through the handle and, for writes, commits according to the
//! requested [`CommitMode`]. A failed statement is never committed.

use crate::core::db::connection::DatabaseHandle;
use crate::core::db::sql::{self, Condition, Fields, Record, Statement, WriteVerb};
use crate::core::value::{Row, Value};
use crate::core::{DbError, Result};
use rusqlite::params_from_iter;
use tracing::debug;

/// Whether a write helper commits after a successful statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Commit right after the statement
    #[default]
    Auto,
    /// Leave the transaction open for the caller
    Manual,
}

impl DatabaseHandle {
    /// `SELECT <fields> FROM <table> [WHERE <condition>]`, returning every row.
    ///
    /// ```no_run
    /// use dbhandle::{Condition, ConnectOptions, DatabaseHandle};
    ///
    /// let mut db = DatabaseHandle::new();
    /// db.connect(&ConnectOptions::new("app.db"))?;
    /// let rows = db.query("users", "id, name", Condition::eq("name", "Alice"))?;
    /// # Ok::<(), dbhandle::DbError>(())
    /// ```
    pub fn query(
        &mut self,
        table: &str,
        fields: impl Into<Fields>,
        condition: impl Into<Condition>,
    ) -> Result<Vec<Row>> {
        let result = sql::select(table, &fields.into(), &condition.into()).and_then(|stmt| {
            self.run(&stmt)?;
            Ok(self.cursor.drain())
        });
        self.track(result)
    }

    /// `INSERT INTO <table> (<cols>) VALUES (<vals>)`
    pub fn insert(&mut self, table: &str, data: &Record, commit: CommitMode) -> Result<()> {
        self.write(sql::write(WriteVerb::Insert, table, data), commit)
    }

    /// `REPLACE INTO <table> (<cols>) VALUES (<vals>)`: inserts, or replaces
    /// the row holding the same key.
    pub fn replace(&mut self, table: &str, data: &Record, commit: CommitMode) -> Result<()> {
        self.write(sql::write(WriteVerb::Replace, table, data), commit)
    }

    /// `UPDATE <table> SET ... [WHERE <condition>]`
    pub fn update(
        &mut self,
        table: &str,
        data: &Record,
        condition: impl Into<Condition>,
        commit: CommitMode,
    ) -> Result<()> {
        self.write(sql::update(table, data, &condition.into()), commit)
    }

    /// `DELETE FROM <table> WHERE <condition>`. An empty condition is refused.
    pub fn delete(
        &mut self,
        table: &str,
        condition: impl Into<Condition>,
        commit: CommitMode,
    ) -> Result<()> {
        self.write(sql::delete(table, &condition.into()), commit)
    }

    fn write(&mut self, statement: Result<Statement>, commit: CommitMode) -> Result<()> {
        let result = statement.and_then(|stmt| self.run(&stmt));
        self.track(result)?;
        match commit {
            CommitMode::Auto => self.commit(),
            CommitMode::Manual => Ok(()),
        }
    }

    /// Inserts many rows through one prepared statement, then commits.
    ///
    /// Every row must have as many values as the first one. Rows written
    /// before a failing row stay in the open transaction; rolling back is up
    /// to the caller.
    pub fn execute_many<R: AsRef<[Value]>>(
        &mut self,
        table: &str,
        fields: impl Into<Fields>,
        rows: &[R],
    ) -> Result<()> {
        let result = self.run_batch(table, &fields.into(), rows);
        self.track(result)?;
        self.commit()
    }

    fn run_batch<R: AsRef<[Value]>>(&mut self, table: &str, fields: &Fields, rows: &[R]) -> Result<()> {
        let width = match rows.first() {
            Some(first) if !first.as_ref().is_empty() => first.as_ref().len(),
            _ => return Err(DbError::NoData),
        };
        let sql = sql::insert_many(table, fields, width)?;
        let conn = self.connection.as_ref().ok_or(DbError::NotConnected)?;
        let fail = |e: rusqlite::Error| DbError::Statement {
            message: e.to_string(),
            sql: sql.clone(),
        };

        if conn.is_autocommit() {
            conn.execute_batch("BEGIN").map_err(fail)?;
        }

        debug!(sql = %sql, rows = rows.len(), "Executing batch");
        let mut stmt = conn.prepare(&sql).map_err(fail)?;
        let mut changed = 0u64;
        for (i, row) in rows.iter().enumerate() {
            let values = row.as_ref();
            if values.len() != width {
                return Err(DbError::Statement {
                    message: format!("row {} has {} values, expected {}", i, values.len(), width),
                    sql: sql.clone(),
                });
            }
            let written = stmt
                .execute(params_from_iter(values.iter()))
                .map_err(|e| DbError::Statement {
                    message: format!("row {} {}: {}", i, render_row(values), e),
                    sql: sql.clone(),
                })?;
            changed += written as u64;
        }

        self.cursor.record_changes(changed, Some(conn.last_insert_rowid()));
        Ok(())
    }
}

fn render_row(values: &[Value]) -> String {
    let literals: Vec<String> = values.iter().map(Value::to_literal).collect();
    format!("({})", literals.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{memory_handle, sample_handle};

    fn count_users(handle: &mut DatabaseHandle) -> i64 {
        handle.execute("SELECT COUNT(*) AS n FROM users").unwrap();
        handle
            .fetch_row()
            .and_then(|row| row.get("n").and_then(Value::as_i64))
            .unwrap()
    }

    #[test]
    fn test_query_with_mapping_condition() {
        let mut handle = sample_handle();
        let rows = handle
            .query("users", vec!["id", "name"], Condition::eq("name", "Bob").and("age", 41))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(2)));
        assert_eq!(rows[0].columns(), &["id", "name"]);
    }

    #[test]
    fn test_query_with_raw_condition() {
        let mut handle = sample_handle();
        let rows = handle.query("users", "name", "age >= 35 ORDER BY id").unwrap();
        let names: Vec<_> = rows.iter().filter_map(|r| r.get("name").and_then(Value::as_str)).collect();
        assert_eq!(names, vec!["Bob", "Carol"]);
    }

    #[test]
    fn test_mapping_values_are_not_injected() {
        let mut handle = sample_handle();
        let rows = handle
            .query("users", "*", Condition::eq("name", "x\" or \"1\"=\"1"))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_insert_commits_by_default() {
        let mut handle = sample_handle();
        let record = Record::new().set("name", "Dave").set("age", 52);
        handle.insert("users", &record, CommitMode::Auto).unwrap();
        assert_eq!(handle.last_insert_id(), Some(4));

        handle.rollback().unwrap();
        assert_eq!(count_users(&mut handle), 4);
    }

    #[test]
    fn test_manual_commit_leaves_transaction_open() {
        let mut handle = sample_handle();
        let record = Record::new().set("name", "Eve");
        handle.insert("users", &record, CommitMode::Manual).unwrap();
        handle.rollback().unwrap();
        assert_eq!(count_users(&mut handle), 3);
    }

    #[test]
    fn test_replace_overwrites_existing_key() {
        let mut handle = sample_handle();
        let record = Record::new().set("id", 1).set("name", "Alicia").set("age", 31);
        handle.replace("users", &record, CommitMode::Auto).unwrap();

        let rows = handle.query("users", "name", Condition::eq("id", 1)).unwrap();
        assert_eq!(rows[0].get("name"), Some(&Value::from("Alicia")));
        assert_eq!(count_users(&mut handle), 3);
    }

    #[test]
    fn test_update_and_delete() {
        let mut handle = sample_handle();
        handle
            .update("users", &Record::new().set("age", 99), Condition::eq("name", "Carol"), CommitMode::Auto)
            .unwrap();
        assert_eq!(handle.row_count(), 1);

        let rows = handle.query("users", "age", Condition::eq("name", "Carol")).unwrap();
        assert_eq!(rows[0].get("age"), Some(&Value::Integer(99)));

        handle.delete("users", Condition::eq("age", 99), CommitMode::Auto).unwrap();
        assert_eq!(handle.row_count(), 1);
        assert_eq!(count_users(&mut handle), 2);

        let err = handle.delete("users", "", CommitMode::Auto).unwrap_err();
        assert!(matches!(err, DbError::MissingCondition(_)));
    }

    #[test]
    fn test_failed_write_is_not_committed() {
        let mut handle = sample_handle();
        handle
            .insert("users", &Record::new().set("name", "Frank"), CommitMode::Manual)
            .unwrap();

        // duplicate primary key fails; the pending insert must stay uncommitted
        let duplicate = Record::new().set("id", 1).set("name", "Clash");
        assert!(handle.insert("users", &duplicate, CommitMode::Auto).is_err());
        assert!(handle.last_error().unwrap().contains("UNIQUE"));

        handle.rollback().unwrap();
        assert_eq!(count_users(&mut handle), 3);
    }

    #[test]
    fn test_execute_many_inserts_all_rows() {
        let mut handle = memory_handle();
        handle.execute("CREATE TABLE points (x INTEGER, y INTEGER, label TEXT)").unwrap();

        let rows = vec![
            vec![Value::from(1), Value::from(2), Value::from("a")],
            vec![Value::from(3), Value::from(4), Value::from("b")],
            vec![Value::from(5), Value::from(6), Value::Null],
        ];
        handle.execute_many("points", "x, y, label", &rows).unwrap();
        assert_eq!(handle.row_count(), 3);

        handle.rollback().unwrap();
        let stored = handle.query("points", "*", "").unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored[2].get("label").unwrap().is_null());
    }

    #[test]
    fn test_execute_many_reports_failing_row() {
        let mut handle = memory_handle();
        handle
            .execute("CREATE TABLE tags (name TEXT NOT NULL UNIQUE, weight INTEGER)")
            .unwrap();

        let rows = vec![
            vec![Value::from("red"), Value::from(1)],
            vec![Value::from("blue"), Value::from(2)],
            vec![Value::from("red"), Value::from(3)],
        ];
        let err = handle.execute_many("tags", "name,weight", &rows).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("row 2 (\"red\",3)"), "{}", message);
        assert!(message.contains("UNIQUE"));
        assert_eq!(handle.last_error(), Some(message.as_str()));
    }

    #[test]
    fn test_expression_condition_with_quoted_question_mark() {
        let mut handle = sample_handle();
        let rows = handle
            .query(
                "users",
                "name",
                Condition::expr("name <> 'who?' and age > ? ORDER BY id", vec![Value::from(35)]),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_execute_many_rejects_empty_and_ragged_input() {
        let mut handle = memory_handle();
        handle.execute("CREATE TABLE points (x INTEGER, y INTEGER)").unwrap();

        let empty: Vec<Vec<Value>> = Vec::new();
        assert!(matches!(handle.execute_many("points", "x,y", &empty), Err(DbError::NoData)));
        assert!(handle.last_error().unwrap().contains("No data"));

        let ragged = vec![vec![Value::from(1), Value::from(2)], vec![Value::from(3)]];
        let err = handle.execute_many("points", "x,y", &ragged).unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 values, expected 2"));
    }
}
