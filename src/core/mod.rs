/// Core Module for dbhandle
///
/// This module holds the pieces every operation shares: the error type, the
/// value and row types exchanged with the driver, and the database layer.
pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{DbError, ErrorKind, Result};
pub use value::{Row, RowFormat, Value};
