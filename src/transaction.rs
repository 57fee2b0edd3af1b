//! Transaction management for the household ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the validated types used to create one
//! - The admission logic that applies the eligibility rules before persisting
//! - Database functions for storing and querying transactions
//! - The transaction API route handlers

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    category::{CategoryDescription, get_category},
    database_id::DatabaseID,
    eligibility::{category_allows, person_allows},
    person::{PersonName, get_person},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction records money spent or money earned.
///
/// Stored in the database as an integer (1 = expense, 2 = income).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum TransactionKind {
    /// Money spent.
    Expense,
    /// Money earned.
    Income,
}

impl TransactionKind {
    /// The integer the kind is stored as in the database.
    pub fn as_i64(self) -> i64 {
        match self {
            TransactionKind::Expense => 1,
            TransactionKind::Income => 2,
        }
    }

    /// Convert the stored integer back into a kind.
    ///
    /// Returns `None` if `value` is not a valid kind.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(TransactionKind::Expense),
            2 => Some(TransactionKind::Income),
            _ => None,
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Expense => write!(f, "Expense"),
            TransactionKind::Income => write!(f, "Income"),
        }
    }
}

/// The description of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct TransactionDescription(String);

impl TransactionDescription {
    /// Create a transaction description.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyTransactionDescription] if
    /// `description` is an empty string, or an
    /// [Error::TransactionDescriptionTooLong] if it is longer than 500
    /// characters.
    pub fn new(description: &str) -> Result<Self, Error> {
        let description = description.trim();

        if description.is_empty() {
            Err(Error::EmptyTransactionDescription)
        } else if description.chars().count() > 500 {
            Err(Error::TransactionDescriptionTooLong)
        } else {
            Ok(Self(description.to_string()))
        }
    }

    /// Create a transaction description without validation.
    ///
    /// The caller should ensure that the string is not empty and at most 500
    /// characters.
    pub fn new_unchecked(description: &str) -> Self {
        Self(description.to_string())
    }
}

impl AsRef<str> for TransactionDescription {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for TransactionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A positive amount of money with two decimal places.
///
/// Amounts use decimal arithmetic so that sums over many transactions do not
/// accumulate binary floating point rounding error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount, rounding to two decimal places.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::NonPositiveAmount] if `amount` is
    /// zero or negative after rounding.
    pub fn new(amount: Decimal) -> Result<Self, Error> {
        // Round first so sub-cent amounts cannot slip through as 0.00.
        let amount = amount.round_dp(2);

        if amount <= Decimal::ZERO {
            Err(Error::NonPositiveAmount)
        } else {
            Ok(Self(amount))
        }
    }

    /// Create an amount without validation.
    ///
    /// The caller should ensure the amount is positive with at most two
    /// decimal places.
    pub fn new_unchecked(amount: Decimal) -> Self {
        Self(amount)
    }

    /// The amount as a decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An expense or income recorded against one person and one category.
///
/// Transactions store foreign keys only; joined views are produced at query
/// time (see [TransactionView]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// A text description of what the transaction was for.
    pub description: TransactionDescription,
    /// The amount of money spent or earned in this transaction.
    pub amount: Amount,
    /// Whether the transaction is an expense or income.
    pub kind: TransactionKind,
    /// The ID of the category the transaction belongs to.
    pub category_id: DatabaseID,
    /// The ID of the person the transaction belongs to.
    pub person_id: DatabaseID,
}

/// A transaction joined with the display fields of its person and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct TransactionView {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// A text description of what the transaction was for.
    pub description: TransactionDescription,
    /// The amount of money spent or earned in this transaction.
    pub amount: Amount,
    /// Whether the transaction is an expense or income.
    pub kind: TransactionKind,
    /// The ID of the category the transaction belongs to.
    pub category_id: DatabaseID,
    /// The description of the category the transaction belongs to.
    pub category_description: CategoryDescription,
    /// The ID of the person the transaction belongs to.
    pub person_id: DatabaseID,
    /// The name of the person the transaction belongs to.
    pub person_name: PersonName,
}

/// The validated data for creating a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// A text description of what the transaction is for.
    pub description: TransactionDescription,
    /// The amount of money spent or earned.
    pub amount: Amount,
    /// Whether the transaction is an expense or income.
    pub kind: TransactionKind,
    /// The ID of the category to record the transaction against.
    pub category_id: DatabaseID,
    /// The ID of the person to record the transaction against.
    pub person_id: DatabaseID,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the transaction routes.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection shared with the rest of the app.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for creating a transaction.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionForm {
    /// A text description of what the transaction is for.
    pub description: String,
    /// The amount of money spent or earned.
    pub amount: Decimal,
    /// Whether the transaction is an expense or income.
    pub kind: TransactionKind,
    /// The ID of the category to record the transaction against.
    pub category_id: DatabaseID,
    /// The ID of the person to record the transaction against.
    pub person_id: DatabaseID,
}

/// A route handler for creating a new transaction.
///
/// The referenced person and category must exist and the eligibility rules
/// must pass, otherwise nothing is persisted.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Json(data): Json<TransactionForm>,
) -> Result<Response, Error> {
    let new_transaction = NewTransaction {
        description: TransactionDescription::new(&data.description)?,
        amount: Amount::new(data.amount)?,
        kind: data.kind,
        category_id: data.category_id,
        person_id: data.person_id,
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let view = create_transaction(new_transaction, &connection)?;

    Ok((StatusCode::CREATED, Json(view)).into_response())
}

/// A route handler for getting a transaction by its database ID.
///
/// This function will return the status code 404 if the requested resource
/// does not exist (e.g., not created yet).
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let view = get_transaction_view(transaction_id, &connection)?;

    Ok(Json(view).into_response())
}

/// A route handler for listing all transactions joined with their person and
/// category display fields.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let views = get_all_transaction_views(&connection)?;

    Ok(Json(views).into_response())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a transaction in the database after applying the eligibility rules.
///
/// The checks run in a fixed order: person existence, person eligibility,
/// category existence, category eligibility. The first failing check decides
/// the error when several would fail. On success the persisted row is re-read
/// joined with its person and category, so the database remains the source of
/// truth for the generated ID and the display fields.
///
/// # Errors
/// This function will return a:
/// - [Error::PersonNotFound] if `person_id` does not refer to a valid person,
/// - [Error::MinorIncomeNotAllowed] if the person is a minor and `kind` is
///   not [TransactionKind::Expense],
/// - [Error::CategoryNotFound] if `category_id` does not refer to a valid
///   category,
/// - [Error::CategoryKindMismatch] if the category's purpose does not cover
///   `kind`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<TransactionView, Error> {
    let person = get_person(new_transaction.person_id, connection)?;

    if !person_allows(person.is_minor(), new_transaction.kind) {
        return Err(Error::MinorIncomeNotAllowed {
            person_id: person.id,
        });
    }

    let category = get_category(new_transaction.category_id, connection)?;

    if !category_allows(category.purpose, new_transaction.kind) {
        return Err(Error::CategoryKindMismatch {
            description: category.description.to_string(),
            kind: new_transaction.kind,
        });
    }

    connection.execute(
        "INSERT INTO \"transaction\" (description, amount, kind, category_id, person_id)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        (
            new_transaction.description.as_ref(),
            new_transaction.amount.to_string(),
            new_transaction.kind.as_i64(),
            new_transaction.category_id,
            new_transaction.person_id,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_transaction_view(id, connection)
}

/// Retrieve the transaction with `transaction_id` joined with its person and
/// category display fields.
///
/// # Errors
/// This function will return an [Error::NotFound] if `transaction_id` does
/// not refer to a valid transaction, or an [Error::SqlError] if there is some
/// other SQL error.
pub fn get_transaction_view(
    transaction_id: DatabaseID,
    connection: &Connection,
) -> Result<TransactionView, Error> {
    connection
        .prepare(
            "SELECT t.id, t.description, t.amount, t.kind,
                    t.category_id, c.description, t.person_id, p.name
             FROM \"transaction\" t
             INNER JOIN category c ON c.id = t.category_id
             INNER JOIN person p ON p.id = t.person_id
             WHERE t.id = :id;",
        )?
        .query_row(&[(":id", &transaction_id)], map_transaction_view_row)
        .map_err(|error| error.into())
}

/// Retrieve all transactions joined with their person and category display
/// fields.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_transaction_views(connection: &Connection) -> Result<Vec<TransactionView>, Error> {
    connection
        .prepare(
            "SELECT t.id, t.description, t.amount, t.kind,
                    t.category_id, c.description, t.person_id, p.name
             FROM \"transaction\" t
             INNER JOIN category c ON c.id = t.category_id
             INNER JOIN person p ON p.id = t.person_id;",
        )?
        .query_map([], map_transaction_view_row)?
        .map(|maybe_view| maybe_view.map_err(|error| error.into()))
        .collect()
}

/// Retrieve all transactions in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, description, amount, kind, category_id, person_id FROM \"transaction\";",
        )?
        .query_map([], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Create the transaction table in the database.
///
/// Deleting a person deletes their transactions; deleting a category that
/// still has transactions is rejected.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            kind INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            person_id INTEGER NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE RESTRICT,
            FOREIGN KEY(person_id) REFERENCES person(id) ON DELETE CASCADE
        );",
        (),
    )?;

    Ok(())
}

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_description: String = row.get(1)?;
    let raw_amount: String = row.get(2)?;
    let raw_kind: i64 = row.get(3)?;

    Ok(Transaction {
        id,
        description: TransactionDescription::new_unchecked(&raw_description),
        amount: parse_amount(&raw_amount, 2)?,
        kind: parse_kind(raw_kind, 3)?,
        category_id: row.get(4)?,
        person_id: row.get(5)?,
    })
}

fn map_transaction_view_row(row: &Row) -> Result<TransactionView, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_description: String = row.get(1)?;
    let raw_amount: String = row.get(2)?;
    let raw_kind: i64 = row.get(3)?;
    let raw_category_description: String = row.get(5)?;
    let raw_person_name: String = row.get(7)?;

    Ok(TransactionView {
        id,
        description: TransactionDescription::new_unchecked(&raw_description),
        amount: parse_amount(&raw_amount, 2)?,
        kind: parse_kind(raw_kind, 3)?,
        category_id: row.get(4)?,
        category_description: CategoryDescription::new_unchecked(&raw_category_description),
        person_id: row.get(6)?,
        person_name: PersonName::new_unchecked(&raw_person_name),
    })
}

fn parse_amount(raw_amount: &str, column: usize) -> Result<Amount, rusqlite::Error> {
    Decimal::from_str(raw_amount)
        .map(Amount::new_unchecked)
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        })
}

fn parse_kind(raw_kind: i64, column: usize) -> Result<TransactionKind, rusqlite::Error> {
    TransactionKind::from_i64(raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Integer,
            format!("{raw_kind} is not a valid transaction kind").into(),
        )
    })
}



#[cfg(test)]
mod transaction_kind_tests {
    use crate::transaction::TransactionKind;

    #[test]
    fn integer_mapping_round_trips() {
        for kind in [TransactionKind::Expense, TransactionKind::Income] {
            assert_eq!(TransactionKind::from_i64(kind.as_i64()), Some(kind));
        }
    }

    #[test]
    fn from_i64_rejects_unknown_values() {
        assert_eq!(TransactionKind::from_i64(0), None);
        assert_eq!(TransactionKind::from_i64(3), None);
    }
}
