use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::budget::SpendingPolicy;
use crate::models::{Transaction, YearMonth};

// ---------------------------------------------------------------------------
// Months
// ---------------------------------------------------------------------------

/// Distinct months present in the data, oldest first.
pub fn months(transactions: &[Transaction]) -> Vec<YearMonth> {
    transactions
        .iter()
        .map(Transaction::month)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn latest_month(transactions: &[Transaction]) -> Option<YearMonth> {
    transactions.iter().map(Transaction::month).max()
}

pub fn in_month(transactions: &[Transaction], month: YearMonth) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|t| month.contains(t.date))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    /// Signed sum of every amount.
    pub net_total: f64,
    /// Spending under the configured policy.
    pub expense_total: f64,
    pub months: Vec<YearMonth>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub fn summarize(transactions: &[Transaction], policy: &SpendingPolicy) -> Summary {
    Summary {
        count: transactions.len(),
        net_total: transactions.iter().map(|t| t.amount).sum(),
        expense_total: transactions.iter().map(|t| policy.expense(t.amount)).sum(),
        months: months(transactions),
        first_date: transactions.iter().map(|t| t.date).min(),
        last_date: transactions.iter().map(|t| t.date).max(),
    }
}

// ---------------------------------------------------------------------------
// Top descriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionTotal {
    pub description: String,
    pub total: f64,
    pub count: usize,
}

/// Largest spenders by description, highest first; name breaks ties.
pub fn top_descriptions(transactions: &[Transaction], policy: &SpendingPolicy, limit: usize) -> Vec<DescriptionTotal> {
    let mut grouped: HashMap<&str, (f64, usize)> = HashMap::new();
    for txn in transactions {
        let spent = policy.expense(txn.amount);
        if spent == 0.0 {
            continue;
        }
        let entry = grouped.entry(txn.description.as_str()).or_default();
        entry.0 += spent;
        entry.1 += 1;
    }
    let mut items: Vec<DescriptionTotal> = grouped
        .into_iter()
        .map(|(description, (total, count))| DescriptionTotal {
            description: description.to_string(),
            total,
            count,
        })
        .collect();
    items.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.description.cmp(&b.description))
    });
    items.truncate(limit);
    items
}

// ---------------------------------------------------------------------------
// Daily totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
    pub count: usize,
}

/// Signed total per day, in date order.
pub fn daily_totals(transactions: &[Transaction]) -> Vec<DailyTotal> {
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for txn in transactions {
        let entry = by_day.entry(txn.date).or_default();
        entry.0 += txn.amount;
        entry.1 += 1;
    }
    by_day
        .into_iter()
        .map(|(date, (total, count))| DailyTotal { date, total, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::SignConvention;

    fn txn(date: &str, amount: f64, description: &str) -> Transaction {
        Transaction {
            id: format!("{date}{description}"),
            row: 1,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            amount,
            description: description.to_string(),
            category: None,
            category_source: None,
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            txn("2024-09-01", -85.20, "Metro Groceries"),
            txn("2024-09-03", 2000.00, "Payroll Deposit"),
            txn("2024-09-05", -120.00, "Costco Wholesale"),
            txn("2024-09-05", -15.99, "Netflix Subscription"),
            txn("2024-08-30", -40.00, "Metro Groceries"),
        ]
    }

    #[test]
    fn test_months_sorted_and_latest() {
        let data = sample();
        let m = months(&data);
        assert_eq!(m.iter().map(|m| m.to_string()).collect::<Vec<_>>(), vec!["2024-08", "2024-09"]);
        assert_eq!(latest_month(&data).unwrap().to_string(), "2024-09");
        assert_eq!(in_month(&data, "2024-08".parse().unwrap()).len(), 1);
        assert!(latest_month(&[]).is_none());
    }

    #[test]
    fn test_summary() {
        let policy = SpendingPolicy {
            sign: SignConvention::NegativeIsExpense,
            ..SpendingPolicy::default()
        };
        let s = summarize(&sample(), &policy);
        assert_eq!(s.count, 5);
        assert!((s.net_total - 1738.81).abs() < 1e-9);
        assert!((s.expense_total - 261.19).abs() < 1e-9);
        assert_eq!(s.first_date, NaiveDate::from_ymd_opt(2024, 8, 30));
    }

    #[test]
    fn test_top_descriptions() {
        let policy = SpendingPolicy {
            sign: SignConvention::NegativeIsExpense,
            ..SpendingPolicy::default()
        };
        let top = top_descriptions(&sample(), &policy, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].description, "Metro Groceries");
        assert!((top[0].total - 125.2).abs() < 1e-9);
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].description, "Costco Wholesale");
    }

    #[test]
    fn test_daily_totals() {
        let days = daily_totals(&sample());
        assert_eq!(days.len(), 4);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 8, 30).unwrap());
        let sep5 = &days[3];
        assert_eq!(sep5.count, 2);
        assert!((sep5.total + 135.99).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs() {
        let s = summarize(&[], &SpendingPolicy::default());
        assert_eq!(s.count, 0);
        assert_eq!(s.net_total, 0.0);
        assert!(s.months.is_empty());
        assert!(top_descriptions(&[], &SpendingPolicy::default(), 10).is_empty());
        assert!(daily_totals(&[]).is_empty());
    }
}
