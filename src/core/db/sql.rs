//! Statement Building Module
//!
//! Translates table names, field lists, records and conditions into
//! parameterized SQL. Values never enter the SQL text: they are bound as
//! parameters, and a second rendering with literals inlined is kept for logs
//! and error messages.
//!
//! Identifiers cannot be bound, so every table and column name is checked
//! against a strict pattern before it is written into a statement.

use crate::core::value::Value;
use crate::core::{DbError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$")
        .expect("identifier pattern is valid")
});

/// Checks that `name` can be written into SQL as a table or column name.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Column selection for `SELECT` and batch inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields {
    /// `*`
    All,
    List(Vec<String>),
}

impl Fields {
    fn render(&self) -> Result<String> {
        match self {
            Fields::All => Ok("*".to_string()),
            Fields::List(names) if names.is_empty() => Ok("*".to_string()),
            Fields::List(names) => {
                let checked = names
                    .iter()
                    .map(|n| if n == "*" { Ok(n.as_str()) } else { validate_identifier(n) })
                    .collect::<Result<Vec<_>>>()?;
                Ok(checked.join(","))
            }
        }
    }
}

impl From<&str> for Fields {
    /// Accepts `*` or a comma-joined column list such as `"id, name"`.
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Fields::All;
        }
        Fields::List(trimmed.split(',').map(|s| s.trim().to_string()).collect())
    }
}

impl From<String> for Fields {
    fn from(value: String) -> Self {
        Fields::from(value.as_str())
    }
}

impl From<Vec<String>> for Fields {
    fn from(value: Vec<String>) -> Self {
        Fields::List(value)
    }
}

impl From<Vec<&str>> for Fields {
    fn from(value: Vec<&str>) -> Self {
        Fields::List(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Fields {
    fn from(value: &[&str]) -> Self {
        Fields::List(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(value: [&str; N]) -> Self {
        Fields::List(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Filter for the WHERE clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Condition {
    #[default]
    None,
    /// Raw SQL fragment, inserted verbatim.
    ///
    /// The fragment is not escaped. Never build it from untrusted input; use
    /// [`Condition::Eq`] or [`Condition::Expr`] instead.
    Raw(String),
    /// SQL fragment with `?` placeholders and the values bound to them
    Expr { sql: String, params: Vec<Value> },
    /// Column equality tests joined with `and`, in insertion order
    Eq(Vec<(String, Value)>),
}

impl Condition {
    pub fn raw(sql: impl Into<String>) -> Self {
        Condition::Raw(sql.into())
    }

    pub fn expr(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Condition::Expr { sql: sql.into(), params }
    }

    /// Starts an equality condition on one column.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq(vec![(column.into(), value.into())])
    }

    /// Adds another equality test. A non-equality condition is replaced.
    pub fn and(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut pairs = match self {
            Condition::Eq(pairs) => pairs,
            _ => Vec::new(),
        };
        pairs.push((column.into(), value.into()));
        Condition::Eq(pairs)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Condition::None => true,
            Condition::Raw(sql) => sql.trim().is_empty(),
            Condition::Expr { sql, .. } => sql.trim().is_empty(),
            Condition::Eq(pairs) => pairs.is_empty(),
        }
    }

    fn write_to(&self, builder: &mut StatementBuilder) -> Result<()> {
        match self {
            Condition::None => {}
            Condition::Raw(sql) => builder.push_sql(sql.trim()),
            Condition::Expr { sql, params } => write_bound(builder, sql.trim(), params)?,
            Condition::Eq(pairs) => {
                for (i, (column, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        builder.push_sql(" and ");
                    }
                    builder.push_sql(validate_identifier(column)?);
                    builder.push_sql(" = ");
                    builder.push_param(value.clone());
                }
            }
        }
        Ok(())
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            Condition::None
        } else {
            Condition::Raw(value.to_string())
        }
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::from(value.as_str())
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Condition {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Condition::Eq(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Condition {
    fn from(map: BTreeMap<String, V>) -> Self {
        Condition::Eq(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Copies a fragment with placeholders into `builder`, binding `params`.
///
/// Both `?` and numbered `?NNN` placeholders are understood; a `?` inside a
/// quoted literal is plain text. Numbered placeholders are rewritten to `?`
/// so the fragment can sit anywhere in a larger statement.
fn write_bound(builder: &mut StatementBuilder, sql: &str, params: &[Value]) -> Result<()> {
    let error = |message: &str| DbError::Statement {
        message: message.to_string(),
        sql: sql.to_string(),
    };

    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;
    let mut copied_to = 0;
    let mut next = 0;
    let mut used = 0;

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => {
                builder.push_sql(&sql[copied_to..i]);
                let mut end = i + 1;
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = j + 1;
                    chars.next();
                }

                let index = if end > i + 1 {
                    sql[i + 1..end]
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .map(|n| n - 1)
                        .ok_or_else(|| error("invalid placeholder number"))?
                } else {
                    next
                };
                let value = params
                    .get(index)
                    .ok_or_else(|| error("more placeholders than parameters"))?;
                builder.push_param(value.clone());

                next = index + 1;
                used = used.max(next);
                copied_to = end;
            }
            None => {}
        }
    }
    builder.push_sql(&sql[copied_to..]);

    if used < params.len() {
        return Err(error("more parameters than placeholders"));
    }
    Ok(())
}

/// Binds `params` to the placeholders of a complete SQL statement.
pub fn bind(sql: &str, params: &[Value]) -> Result<Statement> {
    let mut builder = StatementBuilder::default();
    write_bound(&mut builder, sql, params)?;
    Ok(builder.finish())
}

/// Ordered column/value pairs written by `INSERT`, `REPLACE` and `UPDATE`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pairs: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, replacing an earlier value for the same column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.pairs.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.pairs.iter().map(|(_, v)| v)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// A statement ready to run: parameterized SQL, its parameters and a rendered
/// form with the literals inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub rendered: String,
}

impl Statement {
    /// Wraps SQL text that carries no parameters.
    pub fn raw(sql: &str) -> Self {
        Statement {
            sql: sql.to_string(),
            params: Vec::new(),
            rendered: sql.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct StatementBuilder {
    sql: String,
    rendered: String,
    params: Vec<Value>,
}

impl StatementBuilder {
    fn push_sql(&mut self, text: &str) {
        self.sql.push_str(text);
        self.rendered.push_str(text);
    }

    fn push_param(&mut self, value: Value) {
        self.sql.push('?');
        self.rendered.push_str(&value.to_literal());
        self.params.push(value);
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
            rendered: self.rendered,
        }
    }
}

/// Verb of a row-writing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerb {
    Insert,
    Replace,
}

impl WriteVerb {
    fn keyword(self) -> &'static str {
        match self {
            WriteVerb::Insert => "INSERT INTO ",
            WriteVerb::Replace => "REPLACE INTO ",
        }
    }
}

/// `SELECT <fields> FROM <table> [WHERE <condition>]`
pub fn select(table: &str, fields: &Fields, condition: &Condition) -> Result<Statement> {
    let mut builder = StatementBuilder::default();
    builder.push_sql("SELECT ");
    builder.push_sql(&fields.render()?);
    builder.push_sql(" FROM ");
    builder.push_sql(validate_identifier(table)?);
    if !condition.is_empty() {
        builder.push_sql(" WHERE ");
        condition.write_to(&mut builder)?;
    }
    Ok(builder.finish())
}

/// `INSERT INTO <table> (<cols>) VALUES (<vals>)`, or `REPLACE INTO`.
pub fn write(verb: WriteVerb, table: &str, record: &Record) -> Result<Statement> {
    if record.is_empty() {
        return Err(DbError::NoData);
    }
    let columns = record
        .columns()
        .map(validate_identifier)
        .collect::<Result<Vec<_>>>()?;

    let mut builder = StatementBuilder::default();
    builder.push_sql(verb.keyword());
    builder.push_sql(validate_identifier(table)?);
    builder.push_sql(" (");
    builder.push_sql(&columns.join(","));
    builder.push_sql(") VALUES (");
    for (i, value) in record.values().enumerate() {
        if i > 0 {
            builder.push_sql(",");
        }
        builder.push_param(value.clone());
    }
    builder.push_sql(")");
    Ok(builder.finish())
}

/// `UPDATE <table> SET col = ?, ... [WHERE <condition>]`
pub fn update(table: &str, record: &Record, condition: &Condition) -> Result<Statement> {
    if record.is_empty() {
        return Err(DbError::NoData);
    }
    let mut builder = StatementBuilder::default();
    builder.push_sql("UPDATE ");
    builder.push_sql(validate_identifier(table)?);
    builder.push_sql(" SET ");
    for (i, (column, value)) in record.pairs.iter().enumerate() {
        if i > 0 {
            builder.push_sql(", ");
        }
        builder.push_sql(validate_identifier(column)?);
        builder.push_sql(" = ");
        builder.push_param(value.clone());
    }
    if !condition.is_empty() {
        builder.push_sql(" WHERE ");
        condition.write_to(&mut builder)?;
    }
    Ok(builder.finish())
}

/// `DELETE FROM <table> WHERE <condition>`; an empty condition is refused.
pub fn delete(table: &str, condition: &Condition) -> Result<Statement> {
    if condition.is_empty() {
        return Err(DbError::MissingCondition("DELETE"));
    }
    let mut builder = StatementBuilder::default();
    builder.push_sql("DELETE FROM ");
    builder.push_sql(validate_identifier(table)?);
    builder.push_sql(" WHERE ");
    condition.write_to(&mut builder)?;
    Ok(builder.finish())
}

/// Placeholder insert used by batch execution: one `?` per column.
///
/// With [`Fields::All`] the column list is omitted and `width` placeholders
/// are emitted.
pub fn insert_many(table: &str, fields: &Fields, width: usize) -> Result<String> {
    let table = validate_identifier(table)?;
    let placeholders = vec!["?"; width].join(",");
    match fields {
        Fields::All => Ok(format!("INSERT INTO {} VALUES ({})", table, placeholders)),
        Fields::List(_) => Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            fields.render()?,
            placeholders
        )),
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Replace,
    Update,
    Delete,
    /// CREATE / DROP / ALTER
    Ddl,
    /// BEGIN / COMMIT / ROLLBACK and friends
    Transaction,
    Other,
}

impl StatementType {
    /// Determines the statement type from its leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == ';' || c == '(')
            .next()
            .unwrap_or("")
            .to_uppercase();

        match keyword.as_str() {
            "SELECT" | "WITH" | "VALUES" => StatementType::Select,
            "INSERT" => StatementType::Insert,
            "REPLACE" => StatementType::Replace,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" | "DROP" | "ALTER" => StatementType::Ddl,
            "BEGIN" | "COMMIT" | "ROLLBACK" | "END" | "SAVEPOINT" | "RELEASE" | "START" => {
                StatementType::Transaction
            }
            _ => StatementType::Other,
        }
    }

    /// Whether running this statement outside a transaction starts one.
    ///
    /// Reads never do: a read transaction would hold its lock until the next
    /// commit and block writers on other connections.
    pub fn opens_transaction(self) -> bool {
        matches!(
            self,
            StatementType::Insert
                | StatementType::Replace
                | StatementType::Update
                | StatementType::Delete
                | StatementType::Ddl
        )
    }

    /// Whether a successful run produces a meaningful insert id.
    pub fn inserts_rows(self) -> bool {
        matches!(self, StatementType::Insert | StatementType::Replace)
    }
}
