// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::core::db::{
    Charset, CommitMode, Condition, ConnectOptions, DatabaseHandle, Fields, Record, Statement,
};
pub use crate::core::{DbError, ErrorKind, Result, Row, RowFormat, Value};
pub use crate::registry::{HandleRegistry, SharedHandle};
