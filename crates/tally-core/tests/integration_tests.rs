//! Integration tests for tally-core
//!
//! These tests exercise the record → summary → analysis workflow through the
//! public API only.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tally_core::{
    format_amount, CurrencyCode, Database, Error, ExpenseKind, ExpensePatch, FinancialStatus,
    IncomePatch, NewExpense, NewIncome, Owner, Period,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn owner(id: &str) -> Owner {
    Owner::from_session(Some(id)).expect("valid owner")
}

fn income(amount: &str, period: &str) -> NewIncome {
    NewIncome {
        date: format!("{}-01", period),
        income_source: "Salary".into(),
        category: "Salary".into(),
        amount: dec(amount),
        period: period.into(),
    }
}

fn expense(source: &str, amount: &str, period: &str) -> NewExpense {
    NewExpense {
        date: format!("{}-15", period),
        expense_source: source.into(),
        amount: dec(amount),
        period: period.into(),
    }
}

// =============================================================================
// Workflow
// =============================================================================

#[test]
fn test_month_workflow_to_analysis() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let me = owner("me@example.com");
    let sep = Period::parse("2024-09").unwrap();

    db.create_income(&me, &income("2500.00", "2024-09")).unwrap();
    db.create_expense(&me, ExpenseKind::Fixed, &expense("Rent", "900", "2024-09"))
        .unwrap();
    let last = db
        .create_expense(
            &me,
            ExpenseKind::Variable,
            &expense("Groceries", "320.75", "2024-09"),
        )
        .unwrap();

    assert_eq!(last.summary.balance.to_string(), "1279.25");

    let analysis = db.get_analysis(&me, &sep).unwrap();
    assert_eq!(analysis.status, FinancialStatus::Excellent);
    assert_eq!(analysis.total_expenses.to_string(), "1220.75");

    db.set_preference(&me, "USD").unwrap();
    let currency = db.get_preference(&me).unwrap();
    assert_eq!(format_amount(last.summary.balance, currency), "$1,279.25");
}

#[test]
fn test_unauthenticated_session_is_rejected() {
    assert!(matches!(
        Owner::from_session(None),
        Err(Error::Unauthenticated)
    ));
    assert!(matches!(
        Owner::from_session(Some("   ")),
        Err(Error::Unauthenticated)
    ));
}

#[test]
fn test_balance_identity_under_many_mutations() {
    let db = Database::in_memory().unwrap();
    let me = owner("me@example.com");
    let sep = Period::parse("2024-09").unwrap();

    let mut ids = Vec::new();
    for i in 1..=20 {
        let amount = format!("{}.{:02}", i, i * 3 % 100);
        let change = db
            .create_expense(
                &me,
                ExpenseKind::Variable,
                &expense("Misc", &amount, "2024-09"),
            )
            .unwrap();
        ids.push(change.record.id);
    }
    db.create_income(&me, &income("1000.01", "2024-09")).unwrap();
    for id in ids.iter().step_by(3) {
        db.delete_expense(&me, ExpenseKind::Variable, *id).unwrap();
    }

    for _ in 0..3 {
        let s = db.recalculate_summary(&me, &sep).unwrap();
        let expected: Decimal = db
            .list_expenses(&me, ExpenseKind::Variable, &sep)
            .unwrap()
            .iter()
            .map(|e| e.amount)
            .sum();
        assert_eq!(s.total_variable_expense, expected);
        assert_eq!(
            s.balance,
            s.total_income - s.total_fixed_expense - s.total_variable_expense
        );
    }
}

// =============================================================================
// Concurrency
// =============================================================================

/// The stored summary must equal a fresh recomputation from the records
fn assert_summary_current(db: &Database, me: &Owner, period: &str) {
    let period = Period::parse(period).unwrap();
    let stored = db.get_summary(me, &period).unwrap();
    let fresh = db.recalculate_summary(me, &period).unwrap();
    let totals = |s: &tally_core::Summary| {
        (
            s.total_income,
            s.total_fixed_expense,
            s.total_variable_expense,
            s.balance,
        )
    };
    match stored {
        Some(stored) => assert_eq!(totals(&stored), totals(&fresh), "stale summary for {}", period),
        None => assert!(fresh.balance.is_zero(), "missing summary for {}", period),
    }
}

#[test]
fn test_concurrent_creates_converge() {
    let db = Arc::new(Database::in_memory().unwrap());
    let me = owner("me@example.com");
    let sep = Period::parse("2024-09").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            let me = me.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    db.create_expense(
                        &me,
                        ExpenseKind::Variable,
                        &expense("Snack", "1.25", "2024-09"),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let summary = db.get_summary(&me, &sep).unwrap().unwrap();
    assert_eq!(summary.total_variable_expense.to_string(), "50.00");
    assert_eq!(summary.balance.to_string(), "-50.00");
}

#[test]
fn test_concurrent_patches_on_one_record_both_apply() {
    let db = Database::in_memory().unwrap();
    let me = owner("me@example.com");

    let move_patch = IncomePatch {
        period: Some("2024-10".into()),
        ..Default::default()
    };
    let amount_patch = IncomePatch {
        amount: Some(dec("5")),
        ..Default::default()
    };

    for round in 0..40 {
        let id = db.create_income(&me, &income("100", "2024-09")).unwrap().record.id;

        std::thread::scope(|s| {
            s.spawn(|| db.update_income(&me, id, &move_patch).unwrap());
            s.spawn(|| db.update_income(&me, id, &amount_patch).unwrap());
        });

        let record = db.get_income(&me, id).unwrap();
        assert_eq!(record.period.as_str(), "2024-10", "round {}", round);
        assert_eq!(record.amount.to_string(), "5.00", "round {}", round);
    }

    assert_summary_current(&db, &me, "2024-09");
    assert_summary_current(&db, &me, "2024-10");
    let oct = db.get_summary(&me, &Period::parse("2024-10").unwrap()).unwrap().unwrap();
    assert_eq!(oct.total_income.to_string(), "200.00");
}

#[test]
fn test_delete_racing_a_move_refreshes_the_final_period() {
    let db = Database::in_memory().unwrap();
    let me = owner("me@example.com");
    let kind = ExpenseKind::Variable;

    let move_patch = ExpensePatch {
        period: Some("2024-10".into()),
        ..Default::default()
    };

    for round in 0..40 {
        let id = db
            .create_expense(&me, kind, &expense("Taxi", "100", "2024-09"))
            .unwrap()
            .record
            .id;

        std::thread::scope(|s| {
            s.spawn(|| match db.update_expense(&me, kind, id, &move_patch) {
                Ok(change) => assert_eq!(change.record.period.as_str(), "2024-10"),
                Err(e) => assert!(matches!(e, Error::NotFound(_)), "round {}: {}", round, e),
            });
            s.spawn(|| {
                db.delete_expense(&me, kind, id).unwrap();
            });
        });

        assert!(matches!(
            db.get_expense(&me, kind, id),
            Err(Error::NotFound(_))
        ));
        assert_summary_current(&db, &me, "2024-09");
        assert_summary_current(&db, &me, "2024-10");
    }

    for period in ["2024-09", "2024-10"] {
        if let Some(s) = db.get_summary(&me, &Period::parse(period).unwrap()).unwrap() {
            assert!(s.total_variable_expense.is_zero(), "{} still counts deleted expenses", period);
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

#[test]
fn test_encrypted_database_reopens_with_same_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");
    let path = path.to_str().unwrap();
    let me = owner("me@example.com");

    {
        let db = Database::new_with_key(path, Some("correct horse")).unwrap();
        db.create_income(&me, &income("10", "2024-01")).unwrap();
        db.set_preference(&me, "JPY").unwrap();
    }

    let db = Database::new_with_key(path, Some("correct horse")).unwrap();
    let periods = db.list_available_periods(&me).unwrap();
    assert_eq!(periods, vec![Period::parse("2024-01").unwrap()]);
    assert_eq!(db.get_preference(&me).unwrap(), CurrencyCode::Jpy);
}
