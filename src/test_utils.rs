//! # Test Utilities Module
//!
//! Fixtures shared by the unit tests: tracing setup and handles connected
//! to in-memory databases.

use crate::core::db::{ConnectOptions, DatabaseHandle};
use std::sync::Once;

/// Installs a fmt subscriber that writes through the test harness.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A handle connected to an empty in-memory database.
pub fn memory_handle() -> DatabaseHandle {
    init_tracing();
    let mut handle = DatabaseHandle::new();
    handle
        .connect(&ConnectOptions::new(":memory:"))
        .expect("in-memory database opens");
    handle
}

/// A handle with a committed `users` table:
///
/// | id | name  | age |
/// |----|-------|-----|
/// | 1  | Alice | 30  |
/// | 2  | Bob   | 41  |
/// | 3  | Carol | 35  |
pub fn sample_handle() -> DatabaseHandle {
    let mut handle = memory_handle();
    handle
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
        .expect("create users table");
    for (name, age) in [("Alice", 30), ("Bob", 41), ("Carol", 35)] {
        handle
            .execute_with("INSERT INTO users (name, age) VALUES (?, ?)", &[name.into(), age.into()])
            .expect("insert sample user");
    }
    handle.commit().expect("commit sample data");
    handle
}
