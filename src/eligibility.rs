//! The rules deciding whether a transaction may be recorded against a given
//! person and category.
//!
//! Both checks are pure and must pass independently before a transaction is
//! persisted.

use crate::{category::CategoryPurpose, transaction::TransactionKind};

/// Whether a category with `purpose` may be used for a transaction of `kind`.
pub fn category_allows(purpose: CategoryPurpose, kind: TransactionKind) -> bool {
    match (purpose, kind) {
        (CategoryPurpose::Both, _) => true,
        (CategoryPurpose::ExpenseOnly, TransactionKind::Expense) => true,
        (CategoryPurpose::IncomeOnly, TransactionKind::Income) => true,
        (CategoryPurpose::ExpenseOnly, TransactionKind::Income) => false,
        (CategoryPurpose::IncomeOnly, TransactionKind::Expense) => false,
    }
}

/// Whether a person may record a transaction of `kind`.
///
/// Minors may only record expenses.
pub fn person_allows(is_minor: bool, kind: TransactionKind) -> bool {
    if is_minor {
        kind == TransactionKind::Expense
    } else {
        true
    }
}

#[cfg(test)]
mod category_allows_tests {
    use crate::{category::CategoryPurpose, transaction::TransactionKind};

    use super::category_allows;

    #[test]
    fn both_allows_every_kind() {
        assert!(category_allows(
            CategoryPurpose::Both,
            TransactionKind::Expense
        ));
        assert!(category_allows(
            CategoryPurpose::Both,
            TransactionKind::Income
        ));
    }

    #[test]
    fn expense_only_allows_only_expenses() {
        assert!(category_allows(
            CategoryPurpose::ExpenseOnly,
            TransactionKind::Expense
        ));
        assert!(!category_allows(
            CategoryPurpose::ExpenseOnly,
            TransactionKind::Income
        ));
    }

    #[test]
    fn income_only_allows_only_income() {
        assert!(category_allows(
            CategoryPurpose::IncomeOnly,
            TransactionKind::Income
        ));
        assert!(!category_allows(
            CategoryPurpose::IncomeOnly,
            TransactionKind::Expense
        ));
    }
}
