/// Database Module
///
/// The database layer is split into four concerns:
/// - **Statement building** (`sql.rs`): turns tables, fields, records and conditions into parameterized SQL
/// - **Cursor state** (`cursor.rs`): buffered rows and write outcomes of the last statement
/// - **Connection management** (`connection.rs`): connect, execute, commit, rollback and close
/// - **CRUD helpers** (`crud.rs`): query/insert/replace/update/delete and batch inserts
///
/// ## Error Handling
///
/// All operations return `DbError` and record its text on the handle.
pub mod connection;
pub mod crud;
pub mod cursor;
pub mod sql;

pub use connection::*;
pub use crud::*;
pub use cursor::*;
pub use sql::{Condition, Fields, Record, Statement, StatementType, WriteVerb};
