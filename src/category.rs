//! This file defines the `Category` type, the types needed to create a
//! category and the API routes for the category type.
//!
//! A category groups transactions, e.g. 'Groceries', 'Rent', 'Wages', and
//! declares which kinds of transaction it may be used for.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, database_id::DatabaseID};

/// The kinds of transaction a category may be used for.
///
/// Stored in the database as an integer (1 = expense only, 2 = income only,
/// 3 = both).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum CategoryPurpose {
    /// The category can only be used for expenses.
    ExpenseOnly,
    /// The category can only be used for income.
    IncomeOnly,
    /// The category can be used for both expenses and income.
    Both,
}

impl CategoryPurpose {
    /// The integer the purpose is stored as in the database.
    pub fn as_i64(self) -> i64 {
        match self {
            CategoryPurpose::ExpenseOnly => 1,
            CategoryPurpose::IncomeOnly => 2,
            CategoryPurpose::Both => 3,
        }
    }

    /// Convert the stored integer back into a purpose.
    ///
    /// Returns `None` if `value` is not a valid purpose.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(CategoryPurpose::ExpenseOnly),
            2 => Some(CategoryPurpose::IncomeOnly),
            3 => Some(CategoryPurpose::Both),
            _ => None,
        }
    }
}

/// The description of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryDescription(String);

impl CategoryDescription {
    /// Create a category description.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryDescription] if
    /// `description` is an empty string, or an
    /// [Error::CategoryDescriptionTooLong] if it is longer than 200
    /// characters.
    pub fn new(description: &str) -> Result<Self, Error> {
        let description = description.trim();

        if description.is_empty() {
            Err(Error::EmptyCategoryDescription)
        } else if description.chars().count() > 200 {
            Err(Error::CategoryDescriptionTooLong)
        } else {
            Ok(Self(description.to_string()))
        }
    }

    /// Create a category description without validation.
    ///
    /// The caller should ensure that the string is not empty and at most 200
    /// characters.
    pub fn new_unchecked(description: &str) -> Self {
        Self(description.to_string())
    }
}

impl AsRef<str> for CategoryDescription {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for grouping expenses and income, e.g., 'Groceries', 'Wages'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseID,

    /// The description of the category.
    pub description: CategoryDescription,

    /// Which kinds of transaction the category may be used for.
    pub purpose: CategoryPurpose,
}

/// The state needed for the category routes.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection shared with the rest of the app.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for creating a category.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryForm {
    /// The description of the category.
    pub description: String,
    /// Which kinds of transaction the category may be used for.
    pub purpose: CategoryPurpose,
}

/// A route handler for creating a new category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Json(data): Json<CategoryForm>,
) -> Result<Response, Error> {
    let description = CategoryDescription::new(&data.description)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(description, data.purpose, &connection)?;

    Ok((StatusCode::CREATED, Json(category)).into_response())
}

/// A route handler for getting a category by its database ID.
///
/// This function will return the status code 404 if the requested resource
/// does not exist (e.g., not created yet).
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category = get_category(category_id, &connection)?;

    Ok(Json(category).into_response())
}

/// A route handler for listing all categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_all_categories(&connection)?;

    Ok(Json(categories).into_response())
}

/// Create a category in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_category(
    description: CategoryDescription,
    purpose: CategoryPurpose,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (description, purpose) VALUES (?1, ?2);",
        (description.as_ref(), purpose.as_i64()),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        description,
        purpose,
    })
}

/// Retrieve the category with `category_id` from the database.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if `category_id`
/// does not refer to a valid category, or an [Error::SqlError] if there is
/// some other SQL error.
pub fn get_category(category_id: DatabaseID, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, description, purpose FROM category WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(category_id),
            error => error.into(),
        })
}

/// Retrieve all categories in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, description, purpose FROM category;")?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Create the category table in the database.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            purpose INTEGER NOT NULL
        );",
        (),
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_description: String = row.get(1)?;
    let description = CategoryDescription::new_unchecked(&raw_description);
    let raw_purpose: i64 = row.get(2)?;
    let purpose = CategoryPurpose::from_i64(raw_purpose).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Integer,
            format!("{raw_purpose} is not a valid category purpose").into(),
        )
    })?;

    Ok(Category {
        id,
        description,
        purpose,
    })
}



#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        category::{
            CategoryDescription, CategoryPurpose, create_category, get_all_categories,
            get_category,
        },
        db::initialize,
        person::{Age, PersonName, create_person},
        transaction::{
            Amount, NewTransaction, TransactionDescription, TransactionKind, create_transaction,
        },
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    #[test]
    fn create_category_succeeds() {
        let connection = get_test_db_connection();
        let description = CategoryDescription::new("Groceries").unwrap();

        let category = create_category(description.clone(), CategoryPurpose::Both, &connection);

        let got_category = category.expect("Could not create category");
        assert!(got_category.id > 0);
        assert_eq!(got_category.description, description);
        assert_eq!(got_category.purpose, CategoryPurpose::Both);
    }

    #[test]
    fn get_category_succeeds() {
        let connection = get_test_db_connection();
        let inserted_category = create_category(
            CategoryDescription::new_unchecked("Wages"),
            CategoryPurpose::IncomeOnly,
            &connection,
        )
        .expect("Could not create test category");

        let selected_category = get_category(inserted_category.id, &connection);

        assert_eq!(Ok(inserted_category), selected_category);
    }

    #[test]
    fn get_category_with_invalid_id_returns_not_found() {
        let connection = get_test_db_connection();

        let selected_category = get_category(1337, &connection);

        assert_eq!(selected_category, Err(Error::CategoryNotFound(1337)));
    }

    #[test]
    fn get_all_categories_returns_every_category() {
        let connection = get_test_db_connection();
        let inserted_categories = vec![
            create_category(
                CategoryDescription::new_unchecked("Groceries"),
                CategoryPurpose::ExpenseOnly,
                &connection,
            )
            .expect("Could not create test category"),
            create_category(
                CategoryDescription::new_unchecked("Wages"),
                CategoryPurpose::IncomeOnly,
                &connection,
            )
            .expect("Could not create test category"),
        ];

        let selected_categories =
            get_all_categories(&connection).expect("Could not get all categories");

        assert_eq!(inserted_categories, selected_categories);
    }

    #[test]
    fn deleting_a_category_with_transactions_is_rejected() {
        let connection = get_test_db_connection();
        let person = create_person(
            PersonName::new_unchecked("Ana"),
            Age::new_unchecked(42),
            &connection,
        )
        .expect("Could not create test person");
        let category = create_category(
            CategoryDescription::new_unchecked("Groceries"),
            CategoryPurpose::Both,
            &connection,
        )
        .expect("Could not create test category");
        create_transaction(
            NewTransaction {
                description: TransactionDescription::new_unchecked("Weekly shop"),
                amount: Amount::new_unchecked("50.00".parse().unwrap()),
                kind: TransactionKind::Expense,
                category_id: category.id,
                person_id: person.id,
            },
            &connection,
        )
        .expect("Could not create test transaction");

        // The category table has no delete endpoint, but the restrict policy
        // must still hold at the store.
        let result = connection.execute("DELETE FROM category WHERE id = ?1", [category.id]);

        assert!(result.is_err());
        assert!(get_category(category.id, &connection).is_ok());
    }
}
