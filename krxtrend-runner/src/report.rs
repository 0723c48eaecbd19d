//! Plain-text rendering of a ledger and its summary.

use std::fmt::Write;

use krxtrend_core::domain::TradeLedger;

use crate::metrics::Summary;

/// Titled block with the ledger table and the four headline lines, or
/// "no trades" for an empty ledger.
pub fn render_report(name: &str, ledger: &TradeLedger, summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==== {name} ====");

    if ledger.is_empty() {
        out.push_str("no trades\n");
        return out;
    }

    out.push_str(&render_ledger(ledger));
    out.push('\n');
    let _ = writeln!(out, "trades:            {}", summary.trades);
    let _ = writeln!(out, "average return:    {}", pct(summary.avg_return));
    let _ = writeln!(out, "cumulative return: {}", pct(summary.cumulative_return));
    let _ = writeln!(out, "win rate:          {}", pct(summary.win_rate));
    out
}

/// One row per trade; a trailing `*` marks a position closed at the last bar.
pub fn render_ledger(ledger: &TradeLedger) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10}  {:>12}  {:<10}  {:>12}  {:>9}  {:>9}",
        "entry", "entry price", "exit", "exit price", "return", "cum"
    );
    for t in ledger {
        let _ = writeln!(
            out,
            "{:<10}  {:>12.0}  {:<10}  {:>12.0}  {:>9}  {:>9.4}{}",
            t.entry_date,
            t.entry_price,
            t.exit_date,
            t.exit_price,
            pct(t.return_pct),
            t.cumulative_return,
            if t.closed_at_end { " *" } else { "" },
        );
    }
    out
}

/// Fraction as a percentage with two decimals.
pub fn pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// One line per analysed code, sorted by the caller's key order.
pub fn render_multi_table<'a>(rows: impl IntoIterator<Item = (&'a str, &'a Summary)>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24}  {:>6}  {:>9}  {:>11}  {:>9}  {:>9}",
        "name", "trades", "avg", "cumulative", "win rate", "max dd"
    );
    for (name, s) in rows {
        let _ = writeln!(
            out,
            "{:<24}  {:>6}  {:>9}  {:>11}  {:>9}  {:>9}",
            name,
            s.trades,
            pct(s.avg_return),
            pct(s.cumulative_return),
            pct(s.win_rate),
            pct(s.max_drawdown),
        );
    }
    out
}
