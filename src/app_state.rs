//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

#[cfg(test)]
mod app_state_tests {
    use rusqlite::Connection;

    use super::AppState;

    #[test]
    fn new_initializes_the_database() {
        let connection = Connection::open_in_memory().unwrap();

        let state = AppState::new(connection).expect("Could not create app state");

        let connection = state.db_connection.lock().unwrap();
        let table_count: i64 = connection
            .prepare(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('person', 'category', 'transaction')",
            )
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();

        assert_eq!(table_count, 3);
    }
}
