use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Transaction;

// ---------------------------------------------------------------------------
// Sign convention
// ---------------------------------------------------------------------------

/// Which source amounts count as spending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Every transaction spends its absolute amount.
    #[default]
    Absolute,
    /// Negative amounts are expenses, positive amounts are credits.
    NegativeIsExpense,
    /// Positive amounts are expenses, negative amounts are credits.
    PositiveIsExpense,
}

/// What credits (refunds, deposits) do to spending under a signed convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPolicy {
    #[default]
    Exclude,
    /// Credits reduce spending; a category can net out below zero.
    Offset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingPolicy {
    #[serde(default)]
    pub sign: SignConvention,
    #[serde(default)]
    pub credits: CreditPolicy,
}

impl SpendingPolicy {
    /// Spending contributed by one signed source amount.
    pub fn expense(&self, amount: f64) -> f64 {
        let expense_sign = match self.sign {
            SignConvention::Absolute => return amount.abs(),
            SignConvention::NegativeIsExpense => -1.0,
            SignConvention::PositiveIsExpense => 1.0,
        };
        let spent = amount * expense_sign;
        if spent >= 0.0 {
            spent
        } else {
            match self.credits {
                CreditPolicy::Exclude => 0.0,
                CreditPolicy::Offset => spent,
            }
        }
    }

    pub fn describe(&self) -> String {
        match (self.sign, self.credits) {
            (SignConvention::Absolute, _) => {
                "every amount counts as spending (absolute value)".to_string()
            }
            (sign, credits) => {
                let side = if sign == SignConvention::NegativeIsExpense {
                    "negative"
                } else {
                    "positive"
                };
                let credit = match credits {
                    CreditPolicy::Exclude => "credits are ignored",
                    CreditPolicy::Offset => "credits reduce spending",
                };
                format!("{side} amounts are expenses; {credit}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Budget configuration
// ---------------------------------------------------------------------------

/// Spending limits. An unset overall limit is 0 and reports as saturated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default)]
    pub overall: f64,
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
}

impl Budget {
    pub fn set(&mut self, category: &str, limit: f64) {
        self.categories.insert(category.to_string(), limit);
    }

    pub fn remove(&mut self, category: &str) -> bool {
        self.categories.remove(category).is_some()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "category", rename_all = "snake_case")]
pub enum BudgetScope {
    Overall,
    Category(String),
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overall => f.write_str("Overall"),
            Self::Category(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Utilization {
    Ratio(f64),
    /// Limit is zero (or negative): any spending state counts as over budget.
    Saturated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub scope: BudgetScope,
    pub spent: f64,
    pub limit: f64,
    pub utilization: Utilization,
    /// Transactions contributing to `spent`.
    pub count: usize,
}

impl BudgetStatus {
    fn new(scope: BudgetScope, spent: f64, limit: f64, count: usize) -> Self {
        let utilization = if limit > 0.0 && limit.is_finite() {
            Utilization::Ratio(spent / limit)
        } else {
            Utilization::Saturated
        };
        Self {
            scope,
            spent,
            limit,
            utilization,
            count,
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self.utilization {
            Utilization::Ratio(r) => Some(r),
            Utilization::Saturated => None,
        }
    }

    pub fn is_over(&self) -> bool {
        match self.utilization {
            Utilization::Ratio(r) => r > 1.0,
            Utilization::Saturated => true,
        }
    }

    /// Fill fraction for a progress bar, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        match self.utilization {
            Utilization::Ratio(r) => r.clamp(0.0, 1.0),
            Utilization::Saturated => 1.0,
        }
    }

    pub fn remaining(&self) -> f64 {
        self.limit - self.spent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    /// One entry per budgeted category, sorted by category name.
    pub categories: Vec<BudgetStatus>,
    pub overall: BudgetStatus,
    /// Spending with no category; counts toward overall only.
    pub uncategorized: f64,
    /// Spending in categories that have no budget line, sorted by name.
    pub unbudgeted: Vec<(String, f64)>,
}

/// Compare spending against the budget. Never fails; empty input and zero
/// limits give zeroed or saturated statuses.
pub fn aggregate(transactions: &[Transaction], budget: &Budget, policy: &SpendingPolicy) -> BudgetReport {
    let mut per_category: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut overall = 0.0;
    let mut overall_count = 0usize;
    let mut uncategorized = 0.0;

    for txn in transactions {
        let spent = policy.expense(txn.amount);
        if spent == 0.0 {
            continue;
        }
        overall += spent;
        overall_count += 1;
        match txn.category.as_deref() {
            Some(category) => {
                let entry = per_category.entry(category).or_default();
                entry.0 += spent;
                entry.1 += 1;
            }
            None => uncategorized += spent,
        }
    }

    let categories = budget
        .categories
        .iter()
        .map(|(name, limit)| {
            let (spent, count) = per_category.get(name.as_str()).copied().unwrap_or((0.0, 0));
            BudgetStatus::new(BudgetScope::Category(name.clone()), spent, *limit, count)
        })
        .collect();

    let unbudgeted = per_category
        .iter()
        .filter(|(name, _)| !budget.categories.contains_key(**name))
        .map(|(name, (spent, _))| (name.to_string(), *spent))
        .collect();

    BudgetReport {
        categories,
        overall: BudgetStatus::new(BudgetScope::Overall, overall, budget.overall, overall_count),
        uncategorized,
        unbudgeted,
    }
}
