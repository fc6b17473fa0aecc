//! Export of backtest results as JSON, CSV and Markdown.
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stratlab_core::domain::{EquityPoint, TradeRecord};

use crate::comparison::{Comparison, RankingMetric};
use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade ledger as CSV, one row per round trip.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_index",
        "entry_date",
        "entry_price",
        "quantity",
        "stop_loss_price",
        "exit_index",
        "exit_date",
        "exit_price",
        "exit_reason",
        "bars_held",
        "costs",
        "realized_pnl",
        "return_pct",
    ])?;

    for t in trades {
        let stop = t
            .stop_loss_price
            .map(|p| format!("{p:.6}"))
            .unwrap_or_default();
        wtr.write_record([
            &t.entry_index.to_string(),
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.quantity),
            &stop,
            &t.exit_index.to_string(),
            &t.exit_date.to_string(),
            &format!("{:.6}", t.exit_price),
            t.exit_reason.as_str(),
            &t.bars_held().to_string(),
            &format!("{:.2}", t.costs),
            &format!("{:.2}", t.realized_pnl),
            &format!("{:.4}", t.return_pct()),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity curve as CSV with date and equity columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity"])?;
    for p in equity_curve {
        wtr.write_record([&p.date.to_string(), &format!("{:.2}", p.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Directory name for a run: `{symbol}_{strategy}_{run id prefix}`.
pub fn artifact_dirname(result: &BacktestResult) -> String {
    let prefix: String = result.run_id.chars().take(8).collect();
    let stamp = if prefix.is_empty() {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    } else {
        prefix
    };
    format!(
        "{}_{}_{}",
        sanitize(&result.symbol),
        sanitize(&result.strategy),
        stamp
    )
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// Save the full artifact set for a single backtest run.
///
/// Writes `result.json`, `trades.csv` and `equity.csv` into a fresh directory
/// under `output_dir` and returns its path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(artifact_dirname(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(
        run_dir.join("equity.csv"),
        export_equity_csv(&result.equity_curve)?,
    )?;

    log::info!("artifacts written to {}", run_dir.display());
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

/// Save every result of a comparison plus `comparison.md` and `comparison.json`.
pub fn save_comparison(comparison: &Comparison, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let dirs = comparison
        .results
        .iter()
        .map(|r| save_artifacts(r, output_dir))
        .collect::<Result<Vec<_>>>()?;
    std::fs::write(
        output_dir.join("comparison.md"),
        comparison_report(comparison),
    )?;
    let ranked = serde_json::to_string_pretty(&comparison.ranked())
        .context("failed to serialize ranking")?;
    std::fs::write(output_dir.join("comparison.json"), ranked)?;
    Ok(dirs)
}

// ─── Markdown reports ───────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

/// Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(1024);
    let m = &result.metrics;

    md.push_str(&format!("# Backtest Report: {}\n\n", result.strategy));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date, result.end_date
    ));
    md.push_str(&format!("| Bars | {} |\n", result.bar_count));
    md.push_str(&format!(
        "| Initial Capital | {:.2} |\n",
        result.initial_capital
    ));
    md.push_str(&format!("| Final Equity | {:.2} |\n", result.final_equity()));
    md.push_str(&format!("| Total Return | {} |\n", pct(m.total_return)));
    md.push_str(&format!(
        "| Annualized Return | {} |\n",
        pct(m.annualized_return)
    ));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe_ratio));
    md.push_str(&format!("| Max Drawdown | {} |\n", pct(m.max_drawdown)));
    md.push_str(&format!("| Trades | {} |\n", m.num_trades));
    md.push_str(&format!("| Win Rate | {} |\n", pct(m.win_rate)));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    if result.technical_only_decisions > 0 {
        md.push_str(&format!(
            "| Decisions without sentiment | {} |\n",
            result.technical_only_decisions
        ));
    }
    md
}

/// Markdown table of a ranked comparison, best first.
pub fn comparison_report(comparison: &Comparison) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# Strategy Comparison: {}\n\n", comparison.symbol));
    md.push_str(&format!("Ranked by `{}`.\n\n", comparison.ranking));
    md.push_str(
        "| Rank | Strategy | Total Return | Annualized | Sharpe | Max DD | Trades | Win Rate | Profit Factor |\n",
    );
    md.push_str("| ---: | --- | ---: | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for entry in comparison.ranked() {
        let m = &entry.metrics;
        md.push_str(&format!(
            "| {} | {} | {} | {} | {:.3} | {} | {} | {} | {:.2} |\n",
            entry.rank,
            entry.strategy,
            pct(m.total_return),
            pct(m.annualized_return),
            m.sharpe_ratio,
            pct(m.max_drawdown),
            m.num_trades,
            pct(m.win_rate),
            m.profit_factor,
        ));
    }

    let highlights = [
        ("Best return", RankingMetric::TotalReturn),
        ("Best Sharpe", RankingMetric::SharpeRatio),
        ("Smallest drawdown", RankingMetric::MaxDrawdown),
    ];
    md.push('\n');
    for (label, metric) in highlights {
        if let Some(best) = comparison.best_by(metric) {
            md.push_str(&format!("- {label}: **{}**\n", best.strategy));
        }
    }
    md
}
