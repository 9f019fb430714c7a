//! CLI handler for `siteplan rates`: print the effective rate table.

use siteplan_core::RateModel;

pub fn run_rates(rates: &RateModel) {
    print!("{}", format_rates(rates));
}

/// Render the rate table with keyword rows in match order, fallback last.
pub fn format_rates(rates: &RateModel) -> String {
    let mut out = String::new();
    out.push_str(&format!("Daily labor rate: {:.2}\n\n", rates.daily_labor_rate));
    out.push_str(&format!(
        "  {:<12} {:>12} {:>14}  {}\n",
        "KEYWORD", "UNIT COST", "OUTPUT/DAY", "UNIT"
    ));
    let fallback = std::iter::once(&rates.fallback);
    for (i, entry) in rates.rates.iter().chain(fallback).enumerate() {
        let key = if i == rates.rates.len() {
            format!("({})", entry.key)
        } else {
            entry.key.clone()
        };
        out.push_str(&format!(
            "  {:<12} {:>12.2} {:>14.2}  {}\n",
            key, entry.unit_cost, entry.daily_output, entry.unit
        ));
    }
    out
}
