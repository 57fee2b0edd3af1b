//! Functions for initializing the application's SQLite database.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, category::create_category_table, person::create_person_table,
    transaction::create_transaction_table,
};

/// Create the tables for the domain models in the database.
///
/// Referential policy lives here: deleting a person cascades to their
/// transactions, deleting a category that still has transactions is rejected.
///
/// # Errors
/// Returns an [Error::SqlError] if the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // SQLite disables foreign key enforcement per connection by default.
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_person_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
