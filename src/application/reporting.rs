use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Budget, Cents, ReportPeriod, TransactionKind};

/// Income, expenses and savings for one user over one period.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub period: ReportPeriod,
    pub from_date: NaiveDate,
    /// Exclusive end of the window
    pub to_date: NaiveDate,
    pub total_income: Cents,
    pub total_expense: Cents,
    pub savings: Cents,
}

impl FinancialReport {
    pub fn new(period: ReportPeriod, total_income: Cents, total_expense: Cents) -> Self {
        Self {
            period,
            from_date: period.start(),
            to_date: period.end(),
            total_income,
            total_expense,
            savings: total_income - total_expense,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub kind: TransactionKind,
    pub category: String,
    pub count: i64,
    pub total: Cents,
    /// Share of all amounts of the same kind in the period
    pub percentage: f64,
}

/// Spending against a budget limit.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub spent: Cents,
    pub remaining: Cents,
    pub exceeded: bool,
}

impl BudgetStatus {
    pub fn new(budget: Budget, spent: Cents) -> Self {
        Self {
            remaining: budget.remaining(spent),
            exceeded: budget.is_exceeded(spent),
            budget,
            spent,
        }
    }

    pub fn limit(&self) -> Cents {
        self.budget.limit_cents
    }
}
