//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use std::collections::BTreeMap;

use crate::domain::{CandidateFit, SrSeries, TrendFit};

/// Format the trend summary: span, candidate diagnostics and the chosen model.
pub fn format_trend_summary(area: Option<&str>, series: &SrSeries, fit: &TrendFit, show_rows: bool) -> String {
    let mut out = String::new();

    out.push_str("=== srt - S-R trend ===\n");
    if let Some(area) = area {
        out.push_str(&format!("Area: {area}\n"));
    }
    if let (Some(start), Some(end)) = (series.start_date(), series.end_date()) {
        out.push_str(&format!("Period: {start} .. {end} ({} observations)\n", series.len()));
    }

    out.push_str("\nCandidates:\n");
    out.push_str(&format!(
        "  {:<22} {:>14} {:>14} {:>12} {:>6}  {}\n",
        "model", "a", "b", "score", "iter", "status"
    ));
    for c in &fit.candidates {
        out.push_str(&format_candidate(c, c.model == fit.best));
    }

    out.push_str(&format!(
        "\nSelected: {} (score={:.6})\n",
        fit.best.display_name(),
        fit.rmsle()
    ));

    if show_rows {
        out.push_str("\n  date        Recovered  Susceptible_actual  Susceptible_predicted\n");
        for r in fit.rows() {
            out.push_str(&format!(
                "  {}  {:>9}  {:>18}  {:>21}\n",
                r.date, r.recovered, r.susceptible_actual, r.susceptible_predicted
            ));
        }
    }

    out
}

fn format_candidate(c: &CandidateFit, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    format!(
        "{marker} {:<22} {:>14.6e} {:>14.6e} {:>12.6} {:>6}  {:?}\n",
        c.model.display_name(),
        c.params[0],
        c.params[1],
        c.score,
        c.iterations,
        c.status
    )
}

/// Format a population lookup table; `Total` is the sum of the listed rows.
pub fn format_population_map(map: &BTreeMap<String, u64>) -> String {
    let width = map.keys().map(String::len).max().unwrap_or(0).max(5);
    let total: u64 = map.values().sum();
    let mut out = String::new();
    for (place, value) in map {
        out.push_str(&format!("{place:<width$}  {value:>14}\n"));
    }
    out.push_str(&format!("{:<width$}  {total:>14}\n", "Total"));
    out
}
