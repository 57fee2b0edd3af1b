//! Household Ledger is a web app for tracking a household's expenses and
//! income per person and per category.
//!
//! This library provides a JSON REST API backed by SQLite.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod app_state;
mod category;
mod database_id;
mod db;
mod eligibility;
mod endpoints;
mod logging;
mod person;
mod report;
mod routing;
mod transaction;

pub use app_state::AppState;
pub use database_id::DatabaseID;
pub use db::initialize as initialize_db;
pub use endpoints::format_endpoint;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use transaction::TransactionKind;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create a person's name.
    #[error("Name cannot be empty")]
    EmptyPersonName,

    /// A string longer than 200 characters was used to create a person's name.
    #[error("Name must be at most 200 characters")]
    PersonNameTooLong,

    /// An age outside the range 1-150 was used to create a person.
    #[error("Age must be between 1 and 150")]
    AgeOutOfRange,

    /// An empty string was used to create a category description.
    #[error("Category description cannot be empty")]
    EmptyCategoryDescription,

    /// A string longer than 200 characters was used to create a category
    /// description.
    #[error("Category description must be at most 200 characters")]
    CategoryDescriptionTooLong,

    /// An empty string was used to create a transaction description.
    #[error("Transaction description cannot be empty")]
    EmptyTransactionDescription,

    /// A string longer than 500 characters was used to create a transaction
    /// description.
    #[error("Transaction description must be at most 500 characters")]
    TransactionDescriptionTooLong,

    /// A zero or negative amount was used to create a transaction.
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    /// The person ID used in a request did not match a person in the database.
    #[error("Person {0} not found")]
    PersonNotFound(DatabaseID),

    /// The category ID used in a request did not match a category in the
    /// database.
    #[error("Category {0} not found")]
    CategoryNotFound(DatabaseID),

    /// A minor (younger than 18) tried to record a transaction that is not an
    /// expense.
    ///
    /// The person ID is kept so the client can point at the offending person.
    #[error("Person {person_id} is a minor and can only record expenses")]
    MinorIncomeNotAllowed {
        /// The ID of the minor the transaction was recorded against.
        person_id: DatabaseID,
    },

    /// A transaction's kind is not covered by its category's purpose, e.g. an
    /// income recorded against an expense-only category.
    #[error("The category '{description}' cannot be used for {kind} transactions")]
    CategoryKindMismatch {
        /// The description of the category the transaction was recorded
        /// against.
        description: String,
        /// The kind of transaction that was attempted.
        kind: TransactionKind,
    },

    /// The requested resource was not found.
    ///
    /// The client should check that the parameters (e.g., ID) are correct and
    /// that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// The JSON body sent with error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// A human readable description of what went wrong.
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = match self {
            Error::PersonNotFound(_) | Error::CategoryNotFound(_) | Error::NotFound => {
                StatusCode::NOT_FOUND
            }
            Error::SqlError(_) | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(ErrorBody { message })).into_response()
    }
}
