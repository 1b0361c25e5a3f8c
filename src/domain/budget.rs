use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

pub type BudgetId = i64;

/// Spending limit for one category. A user has at most one budget per
/// category; setting it again replaces the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub user_id: UserId,
    pub category: String,
    pub limit_cents: Cents,
}

impl Budget {
    /// Amount left before the limit is reached. Negative once overspent.
    pub fn remaining(&self, spent: Cents) -> Cents {
        self.limit_cents - spent
    }

    /// Spending exactly the limit does not count as exceeding it.
    pub fn is_exceeded(&self, spent: Cents) -> bool {
        spent > self.limit_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food_budget() -> Budget {
        Budget {
            id: 1,
            user_id: 1,
            category: "Food".into(),
            limit_cents: 100000,
        }
    }

    #[test]
    fn test_remaining_under_limit() {
        let budget = food_budget();
        assert_eq!(budget.remaining(20000), 80000);
        assert!(!budget.is_exceeded(20000));
    }

    #[test]
    fn test_limit_reached_is_not_exceeded() {
        let budget = food_budget();
        assert_eq!(budget.remaining(100000), 0);
        assert!(!budget.is_exceeded(100000));
    }

    #[test]
    fn test_overspent() {
        let budget = food_budget();
        assert_eq!(budget.remaining(100001), -1);
        assert!(budget.is_exceeded(100001));
    }
}
