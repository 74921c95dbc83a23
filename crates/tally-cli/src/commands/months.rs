//! Month commands (summary, months, recalc)

use anyhow::{Context, Result};
use tally_core::{format_amount, Database, Period};
use tracing::info;

use super::parse_owner;

fn resolve_period(period: Option<&str>) -> Result<Period> {
    match period {
        Some(p) => Period::parse(p).with_context(|| format!("Invalid month '{}'", p)),
        None => Ok(Period::current()),
    }
}

pub fn cmd_summary(db: &Database, owner: &str, period: Option<&str>, json: bool) -> Result<()> {
    let owner = parse_owner(owner)?;
    let period = resolve_period(period)?;

    let summary = db.get_summary(&owner, &period)?;
    let analysis = db.get_analysis(&owner, &period)?;

    if json {
        let out = serde_json::json!({
            "summary": summary,
            "analysis": analysis,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let currency = db.get_preference(&owner)?;
    let money = |value| format_amount(value, currency);

    println!();
    println!("📅 {} ({})", period.label(), owner);
    println!("   ─────────────────────────────");

    if summary.is_none() {
        println!("   No records for this month.");
        println!();
        return Ok(());
    }

    println!("   Income:            {}", money(analysis.total_income));
    println!("   Total expenses:    {}", money(analysis.total_expenses));
    println!("   Balance:           {}", money(analysis.balance));
    println!();
    println!("   Fixed ratio:       {}%", analysis.fixed_ratio);
    println!("   Variable ratio:    {}%", analysis.variable_ratio);
    println!("   Savings rate:      {}%", analysis.savings_rate);
    println!();
    println!("   Status: {} - {}", analysis.status, analysis.status_message);
    println!("   💡 {}", analysis.advice_message);
    println!();

    Ok(())
}

pub fn cmd_months(db: &Database, owner: &str) -> Result<()> {
    let owner = parse_owner(owner)?;
    let periods = db.list_available_periods(&owner)?;

    if periods.is_empty() {
        println!("No months with records for {}.", owner);
        return Ok(());
    }

    println!();
    println!("📆 Months for {}", owner);
    println!("   ─────────────────────────────");
    for period in periods {
        println!("   {}  {}", period, period.label());
    }

    Ok(())
}

/// Rebuild summaries for one owner, or for every owner in the database
pub fn cmd_recalc(db: &Database, owner: Option<&str>) -> Result<()> {
    let owners = match owner {
        Some(o) => vec![parse_owner(o)?],
        None => db
            .list_owners()?
            .iter()
            .map(|o| parse_owner(o))
            .collect::<Result<Vec<_>>>()?,
    };

    if owners.is_empty() {
        println!("Nothing to recalculate.");
        return Ok(());
    }

    println!("🔄 Recalculating summaries...");
    let mut total = 0;
    for owner in &owners {
        let summaries = db
            .recalculate_all(owner)
            .with_context(|| format!("Failed to recalculate summaries for {}", owner))?;
        info!("Recalculated {} summaries for {}", summaries.len(), owner);
        total += summaries.len();
    }

    println!(
        "✅ Rebuilt {} summaries for {} owner(s)",
        total,
        owners.len()
    );
    Ok(())
}
