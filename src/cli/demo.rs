use crate::cli::budget::format_budget_report;
use crate::cli::import::{format_import_summary, format_transactions};
use crate::error::Result;
use crate::reports;
use crate::session::Session;
use crate::settings::Settings;

pub const SAMPLE_CSV: &str = "date,amount,description
2024-09-01,-85.20,Metro Groceries
2024-09-02,-18.70,UBER Ride
2024-09-03,2000.00,Payroll Deposit
2024-09-05,-120.00,Costco Wholesale
2024-09-09,-55.99,Cineplex Movies
2024-09-10,-15.99,Netflix Subscription
2024-09-12,-60.00,Shell Gas Station
2024-09-16,1500.00,Freelance Income
2024-09-19,-12.00,Spotify Premium
";

/// The sample file run through the starter settings. Nothing is written to disk.
pub fn demo_session() -> Result<Session> {
    let mut session = Session::new(Settings::starter());
    session.load("sample.csv", SAMPLE_CSV.as_bytes().to_vec())?;
    Ok(session)
}

pub fn run() -> Result<()> {
    let session = demo_session()?;
    let Some(output) = session.output() else {
        return Ok(());
    };
    println!("{}", format_transactions(&output.transactions));
    println!(
        "{}",
        format_import_summary("sample.csv", output.transactions.len(), output.skipped.len(), &output.categorize)
    );
    println!();

    let month = reports::latest_month(&output.transactions);
    let period = month.map(|m| m.to_string()).unwrap_or_default();
    println!("{}", format_budget_report(&session.budget_report(month), &period));
    println!("Spending: {}", session.settings().spending.describe());
    println!();
    println!("Run `spendlens init` to start from these rules and budgets.");
    Ok(())
}
