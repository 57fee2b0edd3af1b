//! This file defines the `Person` type, the types needed to create a person
//! and the API routes for the person type.
//!
//! A person is a member of the household that transactions are recorded
//! against. Deleting a person also deletes their transactions.

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
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, database_id::DatabaseID};

/// The age below which a person is considered a minor.
pub const AGE_OF_MAJORITY: u8 = 18;

/// The name of a person.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PersonName(String);

impl PersonName {
    /// Create a person name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyPersonName] if `name` is an
    /// empty string, or an [Error::PersonNameTooLong] if `name` is longer than
    /// 200 characters.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyPersonName)
        } else if name.chars().count() > 200 {
            Err(Error::PersonNameTooLong)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a person name without validation.
    ///
    /// The caller should ensure that the string is not empty and at most 200
    /// characters.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because
    /// if the invariant is violated it will cause incorrect behaviour but not
    /// affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PersonName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PersonName::new(s)
    }
}

impl Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The age of a person in whole years.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct Age(u8);

impl Age {
    /// Create an age.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::AgeOutOfRange] if `age` is not
    /// between 1 and 150 (inclusive).
    pub fn new(age: u8) -> Result<Self, Error> {
        if (1..=150).contains(&age) {
            Ok(Self(age))
        } else {
            Err(Error::AgeOutOfRange)
        }
    }

    /// Create an age without validation.
    ///
    /// The caller should ensure that the age is between 1 and 150 (inclusive).
    pub fn new_unchecked(age: u8) -> Self {
        Self(age)
    }

    /// Whether a person of this age is a minor, i.e. younger than
    /// [AGE_OF_MAJORITY].
    pub fn is_minor(&self) -> bool {
        self.0 < AGE_OF_MAJORITY
    }

    /// The age as a plain integer.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// A member of the household, e.g. a parent or a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Person {
    /// The ID of the person.
    pub id: DatabaseID,

    /// The name of the person.
    pub name: PersonName,

    /// The age of the person in whole years.
    pub age: Age,
}

impl Person {
    /// Whether this person is a minor, i.e. younger than [AGE_OF_MAJORITY].
    ///
    /// Minors are only allowed to record expenses.
    pub fn is_minor(&self) -> bool {
        self.age.is_minor()
    }
}

/// The state needed for the person routes.
#[derive(Debug, Clone)]
pub struct PersonState {
    /// The database connection shared with the rest of the app.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for PersonState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for creating a person.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersonForm {
    /// The name of the person.
    pub name: String,
    /// The age of the person in whole years.
    pub age: u8,
}

/// A route handler for creating a new person.
pub async fn create_person_endpoint(
    State(state): State<PersonState>,
    Json(data): Json<PersonForm>,
) -> Result<Response, Error> {
    let name = PersonName::new(&data.name)?;
    let age = Age::new(data.age)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let person = create_person(name, age, &connection)?;

    Ok((StatusCode::CREATED, Json(person)).into_response())
}

/// A route handler for getting a person by their database ID.
///
/// This function will return the status code 404 if the requested resource
/// does not exist (e.g., not created yet).
pub async fn get_person_endpoint(
    State(state): State<PersonState>,
    Path(person_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let person = get_person(person_id, &connection)?;

    Ok(Json(person).into_response())
}

/// A route handler for listing all people.
pub async fn get_people_endpoint(State(state): State<PersonState>) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let people = get_all_people(&connection)?;

    Ok(Json(people).into_response())
}

/// A route handler for deleting a person.
///
/// Deleting a person also deletes all of their transactions.
pub async fn delete_person_endpoint(
    State(state): State<PersonState>,
    Path(person_id): Path<DatabaseID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_person(person_id, &connection)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Create a person in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_person(name: PersonName, age: Age, connection: &Connection) -> Result<Person, Error> {
    connection.execute(
        "INSERT INTO person (name, age) VALUES (?1, ?2);",
        (name.as_ref(), age.as_u8()),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Person { id, name, age })
}

/// Retrieve the person with `person_id` from the database.
///
/// # Errors
/// This function will return an [Error::PersonNotFound] if `person_id` does
/// not refer to a valid person, or an [Error::SqlError] if there is some other
/// SQL error.
pub fn get_person(person_id: DatabaseID, connection: &Connection) -> Result<Person, Error> {
    connection
        .prepare("SELECT id, name, age FROM person WHERE id = :id;")?
        .query_row(&[(":id", &person_id)], map_person_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::PersonNotFound(person_id),
            error => error.into(),
        })
}

/// Retrieve all people in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_people(connection: &Connection) -> Result<Vec<Person>, Error> {
    connection
        .prepare("SELECT id, name, age FROM person;")?
        .query_map([], map_person_row)?
        .map(|maybe_person| maybe_person.map_err(|error| error.into()))
        .collect()
}

/// Delete the person with `person_id` from the database.
///
/// The person's transactions are deleted along with them (`ON DELETE CASCADE`
/// on the transaction table).
///
/// # Errors
/// This function will return an [Error::PersonNotFound] if `person_id` does
/// not refer to a valid person, or an [Error::SqlError] if there is some other
/// SQL error.
pub fn delete_person(person_id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM person WHERE id = ?1", [person_id])?;

    if rows_affected == 0 {
        return Err(Error::PersonNotFound(person_id));
    }

    Ok(())
}

/// Create the person table in the database.
pub fn create_person_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS person (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL
        );",
        (),
    )?;

    Ok(())
}

fn map_person_row(row: &Row) -> Result<Person, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = PersonName::new_unchecked(&raw_name);
    let age = Age::new_unchecked(row.get(2)?);

    Ok(Person { id, name, age })
}




#[cfg(test)]
mod person_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
    };
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        person::{
            Age, Person, PersonName, create_person, create_person_endpoint,
            delete_person_endpoint, get_person, get_person_endpoint,
        },
    };

    use super::{PersonForm, PersonState};

    fn get_person_state() -> PersonState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        PersonState {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    #[tokio::test]
    async fn can_create_person() {
        let state = get_person_state();
        let form = PersonForm {
            name: "Ana".to_string(),
            age: 42,
        };
        let want = Person {
            id: 1,
            name: PersonName::new_unchecked("Ana"),
            age: Age::new_unchecked(42),
        };

        let response = create_person_endpoint(State(state.clone()), Json(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            Ok(want),
            get_person(1, &state.db_connection.lock().unwrap())
        );
    }

    #[tokio::test]
    async fn create_person_fails_on_empty_name() {
        let state = get_person_state();
        let form = PersonForm {
            name: "".to_string(),
            age: 42,
        };

        let result = create_person_endpoint(State(state), Json(form)).await;

        assert_eq!(result.unwrap_err(), Error::EmptyPersonName);
    }

    #[tokio::test]
    async fn create_person_fails_on_invalid_age() {
        let state = get_person_state();
        let form = PersonForm {
            name: "Ana".to_string(),
            age: 0,
        };

        let result = create_person_endpoint(State(state), Json(form)).await;

        assert_eq!(result.unwrap_err(), Error::AgeOutOfRange);
    }

    #[tokio::test]
    async fn get_person_endpoint_with_invalid_id_returns_not_found() {
        let state = get_person_state();

        let result = get_person_endpoint(State(state), Path(999)).await;

        assert_eq!(result.unwrap_err(), Error::PersonNotFound(999));
    }

    #[tokio::test]
    async fn delete_person_endpoint_succeeds() {
        let state = get_person_state();
        let person = create_person(
            PersonName::new_unchecked("Ana"),
            Age::new_unchecked(42),
            &state.db_connection.lock().unwrap(),
        )
        .expect("Could not create test person");

        let response = delete_person_endpoint(State(state), Path(person.id))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
