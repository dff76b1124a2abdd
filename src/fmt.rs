use crate::budget::{BudgetStatus, Utilization};

const BAR_WIDTH: usize = 20;

/// Dollar amount rounded to cents with thousands separators, e.g. `-$1,234.56`.
/// Anything that rounds to zero prints unsigned.
pub fn money(val: f64) -> String {
    let cents = (val.abs() * 100.0).round() as u64;
    let sign = if val < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${}.{:02}", group_thousands(cents / 100), cents % 100)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `[########------------]` for a fill fraction in `[0, 1]`.
pub fn progress_bar(fraction: f64) -> String {
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 1.0 };
    let filled = (fraction * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Percentage of the limit used, or `over` when there is no limit to divide by.
pub fn utilization(status: &BudgetStatus) -> String {
    match status.utilization {
        Utilization::Ratio(r) => format!("{:.1}%", r * 100.0),
        Utilization::Saturated => "over (no limit)".to_string(),
    }
}
