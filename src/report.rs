//! Income and expense totals grouped by person or by category.
//!
//! The aggregation functions are pure: the route handlers take a snapshot of
//! the database and hand it to them, which keeps the summing logic trivially
//! testable without a database.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    category::{Category, CategoryDescription, get_all_categories},
    database_id::DatabaseID,
    person::{Person, PersonName, get_all_people},
    transaction::{Transaction, TransactionKind, get_all_transactions},
};

// ============================================================================
// MODELS
// ============================================================================

/// The income and expense totals for a single person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonTotals {
    /// The ID of the person.
    pub person_id: DatabaseID,
    /// The name of the person.
    pub person_name: PersonName,
    /// The age of the person in years.
    pub person_age: u8,
    /// The sum of the person's income transactions.
    pub total_income: Decimal,
    /// The sum of the person's expense transactions.
    pub total_expense: Decimal,
    /// Total income minus total expenses.
    pub balance: Decimal,
}

/// The income and expense totals for a single category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals {
    /// The ID of the category.
    pub category_id: DatabaseID,
    /// The description of the category.
    pub category_description: CategoryDescription,
    /// The sum of the category's income transactions.
    pub total_income: Decimal,
    /// The sum of the category's expense transactions.
    pub total_expense: Decimal,
    /// Total income minus total expenses.
    pub balance: Decimal,
}

/// The overall totals across every transaction in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrandTotal {
    /// The sum of all income transactions.
    pub total_income: Decimal,
    /// The sum of all expense transactions.
    pub total_expense: Decimal,
    /// Total income minus total expenses.
    pub net_balance: Decimal,
}

/// The totals report grouped by person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonTotalsReport {
    /// One entry per person, in the order people were created.
    pub totals: Vec<PersonTotals>,
    /// The overall totals across every transaction.
    pub grand_total: GrandTotal,
}

/// The totals report grouped by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotalsReport {
    /// One entry per category, in the order categories were created.
    pub totals: Vec<CategoryTotals>,
    /// The overall totals across every transaction.
    pub grand_total: GrandTotal,
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Sum income and expenses per person.
///
/// Every person gets an entry, including people with no transactions. The
/// grand total is computed over all transactions.
pub fn totals_by_person(people: &[Person], transactions: &[Transaction]) -> PersonTotalsReport {
    let sums = sum_by_key(transactions, |transaction| transaction.person_id);

    let totals = people
        .iter()
        .map(|person| {
            let (total_income, total_expense) =
                sums.get(&person.id).copied().unwrap_or_default();

            PersonTotals {
                person_id: person.id,
                person_name: person.name.clone(),
                person_age: person.age.as_u8(),
                total_income,
                total_expense,
                balance: total_income - total_expense,
            }
        })
        .collect();

    PersonTotalsReport {
        totals,
        grand_total: grand_total(transactions),
    }
}

/// Sum income and expenses per category.
///
/// Every category gets an entry, including categories with no transactions.
/// The grand total is computed over all transactions.
pub fn totals_by_category(
    categories: &[Category],
    transactions: &[Transaction],
) -> CategoryTotalsReport {
    let sums = sum_by_key(transactions, |transaction| transaction.category_id);

    let totals = categories
        .iter()
        .map(|category| {
            let (total_income, total_expense) =
                sums.get(&category.id).copied().unwrap_or_default();

            CategoryTotals {
                category_id: category.id,
                category_description: category.description.clone(),
                total_income,
                total_expense,
                balance: total_income - total_expense,
            }
        })
        .collect();

    CategoryTotalsReport {
        totals,
        grand_total: grand_total(transactions),
    }
}

/// Sum (income, expense) pairs grouped by the key `get_key` extracts.
fn sum_by_key(
    transactions: &[Transaction],
    get_key: impl Fn(&Transaction) -> DatabaseID,
) -> HashMap<DatabaseID, (Decimal, Decimal)> {
    let mut sums: HashMap<DatabaseID, (Decimal, Decimal)> = HashMap::new();

    for transaction in transactions {
        let (income, expense) = sums.entry(get_key(transaction)).or_default();

        match transaction.kind {
            TransactionKind::Income => *income += transaction.amount.as_decimal(),
            TransactionKind::Expense => *expense += transaction.amount.as_decimal(),
        }
    }

    sums
}

fn grand_total(transactions: &[Transaction]) -> GrandTotal {
    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;

    for transaction in transactions {
        match transaction.kind {
            TransactionKind::Income => total_income += transaction.amount.as_decimal(),
            TransactionKind::Expense => total_expense += transaction.amount.as_decimal(),
        }
    }

    GrandTotal {
        total_income,
        total_expense,
        net_balance: total_income - total_expense,
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed for the report routes.
#[derive(Debug, Clone)]
pub struct ReportState {
    /// The database connection shared with the rest of the app.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for the totals report grouped by person.
pub async fn totals_by_person_endpoint(
    State(state): State<ReportState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let people = get_all_people(&connection)?;
    let transactions = get_all_transactions(&connection)?;

    Ok(Json(totals_by_person(&people, &transactions)).into_response())
}

/// A route handler for the totals report grouped by category.
pub async fn totals_by_category_endpoint(
    State(state): State<ReportState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_all_categories(&connection)?;
    let transactions = get_all_transactions(&connection)?;

    Ok(Json(totals_by_category(&categories, &transactions)).into_response())
}

#[cfg(test)]
mod report_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        category::{Category, CategoryDescription, CategoryPurpose},
        person::{Age, Person, PersonName},
        transaction::{Amount, Transaction, TransactionDescription, TransactionKind},
    };

    use super::{totals_by_category, totals_by_person};

    fn test_person(id: i64, name: &str, age: u8) -> Person {
        Person {
            id,
            name: PersonName::new_unchecked(name),
            age: Age::new_unchecked(age),
        }
    }

    fn test_category(id: i64, description: &str) -> Category {
        Category {
            id,
            description: CategoryDescription::new_unchecked(description),
            purpose: CategoryPurpose::Both,
        }
    }

    fn test_transaction(
        id: i64,
        amount: Decimal,
        kind: TransactionKind,
        category_id: i64,
        person_id: i64,
    ) -> Transaction {
        Transaction {
            id,
            description: TransactionDescription::new_unchecked("Test transaction"),
            amount: Amount::new_unchecked(amount),
            kind,
            category_id,
            person_id,
        }
    }

    #[test]
    fn balances_income_against_expenses_per_person() {
        let people = vec![test_person(1, "Ana", 42)];
        let transactions = vec![
            test_transaction(1, dec!(100.00), TransactionKind::Income, 1, 1),
            test_transaction(2, dec!(30.00), TransactionKind::Expense, 1, 1),
        ];

        let report = totals_by_person(&people, &transactions);

        assert_eq!(report.totals.len(), 1);
        assert_eq!(report.totals[0].total_income, dec!(100.00));
        assert_eq!(report.totals[0].total_expense, dec!(30.00));
        assert_eq!(report.totals[0].balance, dec!(70.00));
        assert_eq!(report.totals[0].person_age, 42);
    }

    #[test]
    fn person_without_transactions_appears_with_zero_totals() {
        let people = vec![test_person(1, "Ana", 42), test_person(2, "Ben", 12)];
        let transactions = vec![test_transaction(
            1,
            dec!(50.00),
            TransactionKind::Expense,
            1,
            1,
        )];

        let report = totals_by_person(&people, &transactions);

        assert_eq!(report.totals.len(), 2);
        assert_eq!(report.totals[1].person_id, 2);
        assert_eq!(report.totals[1].total_income, Decimal::ZERO);
        assert_eq!(report.totals[1].total_expense, Decimal::ZERO);
        assert_eq!(report.totals[1].balance, Decimal::ZERO);
    }

    #[test]
    fn grand_total_sums_every_transaction() {
        let people = vec![test_person(1, "Ana", 42), test_person(2, "Ben", 12)];
        let transactions = vec![
            test_transaction(1, dec!(100.00), TransactionKind::Income, 1, 1),
            test_transaction(2, dec!(30.00), TransactionKind::Expense, 1, 2),
            test_transaction(3, dec!(12.50), TransactionKind::Expense, 2, 1),
        ];

        let report = totals_by_person(&people, &transactions);

        assert_eq!(report.grand_total.total_income, dec!(100.00));
        assert_eq!(report.grand_total.total_expense, dec!(42.50));
        assert_eq!(report.grand_total.net_balance, dec!(57.50));
    }

    #[test]
    fn totals_by_category_groups_on_category_id() {
        let categories = vec![test_category(1, "Groceries"), test_category(2, "Wages")];
        let transactions = vec![
            test_transaction(1, dec!(30.00), TransactionKind::Expense, 1, 1),
            test_transaction(2, dec!(20.00), TransactionKind::Expense, 1, 2),
            test_transaction(3, dec!(2500.00), TransactionKind::Income, 2, 1),
        ];

        let report = totals_by_category(&categories, &transactions);

        assert_eq!(report.totals.len(), 2);
        assert_eq!(report.totals[0].total_expense, dec!(50.00));
        assert_eq!(report.totals[0].balance, dec!(-50.00));
        assert_eq!(report.totals[1].total_income, dec!(2500.00));
        assert_eq!(report.grand_total.net_balance, dec!(2450.00));
    }

    #[test]
    fn repeated_aggregation_gives_the_same_report() {
        let people = vec![test_person(1, "Ana", 42)];
        let transactions = vec![
            test_transaction(1, dec!(100.00), TransactionKind::Income, 1, 1),
            test_transaction(2, dec!(30.00), TransactionKind::Expense, 1, 1),
        ];

        let first = totals_by_person(&people, &transactions);
        let second = totals_by_person(&people, &transactions);

        assert_eq!(first, second);
    }

    #[test]
    fn cent_amounts_sum_exactly() {
        let people = vec![test_person(1, "Ana", 42)];
        let transactions = vec![
            test_transaction(1, dec!(0.10), TransactionKind::Expense, 1, 1),
            test_transaction(2, dec!(0.10), TransactionKind::Expense, 1, 1),
            test_transaction(3, dec!(0.10), TransactionKind::Expense, 1, 1),
        ];

        let report = totals_by_person(&people, &transactions);

        assert_eq!(report.totals[0].total_expense, dec!(0.30));
    }
}
