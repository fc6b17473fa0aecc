//! StratLab CLI: single backtests, strategy comparisons and multi-symbol runs.
//!
//! Commands:
//! - `run`: one strategy over one series, with optional artifact export
//! - `compare`: several strategies over one series, ranked
//! - `portfolio`: one strategy over several symbols, summarized

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::{EngineConfig, ExecutionTiming};
use stratlab_core::strategy::{
    Outlook, SentimentOracle, StaticOracle, StrategyKind, StrategySpec, TimeoutOracle,
    UnavailableOracle, Verdict,
};
use stratlab_runner::export::{comparison_report, export_json, save_artifacts, save_comparison};
use stratlab_runner::{
    compare_strategies, load_csv, run_backtest, run_multi_symbol, synthetic_series,
    BacktestResult, ComparisonConfig, DateRange, PortfolioSummary, RankingMetric, RunConfig,
    RunContext,
};

#[derive(Parser)]
#[command(
    name = "stratlab",
    about = "StratLab CLI: technical strategy backtesting and comparison"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy over one price series.
    Run {
        /// bollinger, rsi, macd, combined, ai_enhanced.
        #[arg(long)]
        strategy: StrategyKind,

        /// Strategy parameter as key=value; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        sentiment: SentimentArgs,

        /// Print the full result as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Write result.json, trades.csv and equity.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run several strategies over the same series and rank them.
    Compare {
        /// TOML run configuration; replaces the data, engine and strategy flags.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Comma-separated strategy kinds with default parameters.
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<StrategyKind>,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        sentiment: SentimentArgs,

        /// total_return, annualized_return, sharpe_ratio, max_drawdown, win_rate, profit_factor.
        #[arg(long)]
        ranking: Option<RankingMetric>,

        /// Worker threads. Defaults to available parallelism.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Write per-strategy artifacts and comparison.md under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run one strategy across several symbols and summarize.
    Portfolio {
        #[arg(long)]
        strategy: StrategyKind,

        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        /// Comma-separated symbols.
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Directory holding `<SYMBOL>.csv` files.
        #[arg(long, conflicts_with = "synthetic")]
        csv_dir: Option<PathBuf>,

        /// Generate this many synthetic bars per symbol.
        #[arg(long)]
        synthetic: Option<usize>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        sentiment: SentimentArgs,

        #[arg(long)]
        max_workers: Option<usize>,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Symbol label for the series.
    #[arg(long, default_value = "SYNTH")]
    symbol: String,

    /// CSV with date,open,high,low,close,volume.
    #[arg(long, conflicts_with = "synthetic")]
    csv: Option<PathBuf>,

    /// Generate this many synthetic bars.
    #[arg(long)]
    synthetic: Option<usize>,

    /// First date to include (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Args)]
struct EngineArgs {
    #[arg(long, default_value_t = 100_000.0)]
    capital: f64,

    /// Fraction of cash committed per entry, in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    position_fraction: f64,

    #[arg(long, value_enum, default_value_t = Timing::SignalClose)]
    execution: Timing,

    #[arg(long, default_value_t = 0.0)]
    commission: f64,

    #[arg(long, default_value_t = 0.0)]
    slippage: f64,

    /// Stop-loss distance below entry, e.g. 0.1 for 10%.
    #[arg(long)]
    stop_loss: Option<f64>,

    /// Take-profit distance above entry, e.g. 0.2 for 20%.
    #[arg(long)]
    take_profit: Option<f64>,
}

#[derive(Args)]
struct SentimentArgs {
    /// Fixed sentiment verdict for ai_enhanced, e.g. `bullish:0.8`.
    #[arg(long, value_parser = parse_verdict)]
    ai_verdict: Option<Verdict>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Timing {
    SignalClose,
    NextOpen,
}

impl From<Timing> for ExecutionTiming {
    fn from(t: Timing) -> Self {
        match t {
            Timing::SignalClose => Self::SignalClose,
            Timing::NextOpen => Self::NextOpen,
        }
    }
}

impl EngineArgs {
    fn to_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.capital,
            position_fraction: self.position_fraction,
            execution: self.execution.into(),
            commission_rate: self.commission,
            slippage_rate: self.slippage,
            stop_loss_pct: self.stop_loss,
            take_profit_pct: self.take_profit,
        }
    }
}

impl SentimentArgs {
    /// The collaborator for ai_enhanced; absent unless a verdict is given.
    fn context(&self) -> RunContext {
        let inner: Arc<dyn SentimentOracle> = match self.ai_verdict {
            Some(verdict) => Arc::new(StaticOracle(verdict)),
            None => Arc::new(UnavailableOracle),
        };
        RunContext::default().with_oracle(Arc::new(TimeoutOracle::with_default_timeout(inner)))
    }
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value for '{key}': {e}"))?;
    Ok((key.trim().to_string(), value))
}

fn parse_verdict(s: &str) -> Result<Verdict, String> {
    let (outlook, confidence) = s
        .split_once(':')
        .ok_or_else(|| format!("expected outlook:confidence, got '{s}'"))?;
    let outlook = match outlook.trim().to_ascii_lowercase().as_str() {
        "bullish" => Outlook::Bullish,
        "bearish" => Outlook::Bearish,
        "neutral" => Outlook::Neutral,
        other => return Err(format!("unknown outlook '{other}'")),
    };
    let confidence: f64 = confidence
        .trim()
        .parse()
        .map_err(|e| format!("bad confidence: {e}"))?;
    Verdict::new(outlook, confidence)
        .validated()
        .map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            strategy,
            params,
            data,
            engine,
            sentiment,
            json,
            output_dir,
        } => {
            let spec = spec_with_params(strategy, params);
            run_cmd(&spec, &data, &engine, &sentiment, json, output_dir.as_deref())
        }
        Commands::Compare {
            config,
            strategies,
            data,
            engine,
            sentiment,
            ranking,
            max_workers,
            output_dir,
        } => {
            let ctx = sentiment.context();
            let (symbol, series, specs, mut comparison_config) = match config {
                Some(path) => {
                    if !strategies.is_empty() {
                        bail!("--config and --strategies are mutually exclusive");
                    }
                    let config = RunConfig::from_file(&path)?;
                    let series = config.load_series()?;
                    (
                        config.backtest.symbol.clone(),
                        series,
                        config.strategies.clone(),
                        config.comparison_config(),
                    )
                }
                None => {
                    if strategies.is_empty() {
                        bail!("one of --config or --strategies is required");
                    }
                    let series = load_series(&data)?;
                    let specs = strategies.into_iter().map(StrategySpec::new).collect();
                    let config = ComparisonConfig {
                        engine: engine.to_config(),
                        ..ComparisonConfig::default()
                    };
                    (data.symbol.clone(), series, specs, config)
                }
            };
            if let Some(ranking) = ranking {
                comparison_config.ranking = ranking;
            }
            if max_workers.is_some() {
                comparison_config.max_workers = max_workers;
            }

            let comparison =
                compare_strategies(&series, &symbol, &specs, &comparison_config, &ctx)?;
            println!("{}", comparison_report(&comparison));
            if let Some(dir) = output_dir {
                save_comparison(&comparison, &dir)?;
                println!("Report saved to: {}", dir.join("comparison.md").display());
            }
            Ok(())
        }
        Commands::Portfolio {
            strategy,
            params,
            symbols,
            csv_dir,
            synthetic,
            start,
            end,
            engine,
            sentiment,
            max_workers,
        } => {
            let spec = spec_with_params(strategy, params);
            let range = DateRange { start, end };
            let universe = symbols
                .iter()
                .map(|symbol| {
                    let series = match (&csv_dir, synthetic) {
                        (Some(dir), _) => load_csv(&dir.join(format!("{symbol}.csv")), range)?,
                        (None, Some(bars)) => {
                            synthetic_series(symbol, start.unwrap_or(default_start()), bars)?
                        }
                        (None, None) => bail!("one of --csv-dir or --synthetic is required"),
                    };
                    Ok((symbol.clone(), series))
                })
                .collect::<Result<Vec<_>>>()?;

            let summary = run_multi_symbol(
                &spec,
                &universe,
                &engine.to_config(),
                max_workers,
                &sentiment.context(),
            )?;
            print_portfolio(&summary);
            Ok(())
        }
    }
}

fn spec_with_params(kind: StrategyKind, params: Vec<(String, f64)>) -> StrategySpec {
    params
        .into_iter()
        .fold(StrategySpec::new(kind), |spec, (k, v)| spec.with_param(k, v))
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

fn load_series(data: &DataArgs) -> Result<PriceSeries> {
    let range = DateRange {
        start: data.start,
        end: data.end,
    };
    match (&data.csv, data.synthetic) {
        (Some(path), _) => {
            load_csv(path, range).with_context(|| format!("loading {}", path.display()))
        }
        (None, Some(bars)) => Ok(synthetic_series(
            &data.symbol,
            data.start.unwrap_or(default_start()),
            bars,
        )?),
        (None, None) => bail!("one of --csv or --synthetic is required"),
    }
}

fn run_cmd(
    spec: &StrategySpec,
    data: &DataArgs,
    engine: &EngineArgs,
    sentiment: &SentimentArgs,
    json: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    let series = load_series(data)?;
    info!("loaded {} bars for {}", series.len(), data.symbol);
    let result = run_backtest(
        &series,
        &data.symbol,
        spec,
        &engine.to_config(),
        &sentiment.context(),
    )?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_summary(&result);
    }
    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!("Symbol:         {}", result.symbol);
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!("Bars:           {}", result.bar_count);
    println!("Signals:        {}", result.signal_count);
    println!("Trades:         {}", m.num_trades);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", result.final_equity());
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Annualized:     {:.2}%", m.annualized_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    if result.technical_only_decisions > 0 {
        println!();
        println!(
            "NOTE: {} decisions were taken without a sentiment verdict",
            result.technical_only_decisions
        );
    }
    println!();
}

fn print_portfolio(summary: &PortfolioSummary) {
    println!();
    println!("=== Portfolio: {} ===", summary.strategy);
    println!("Symbols:        {}", summary.num_symbols);
    println!("Avg Return:     {:.2}%", summary.avg_total_return * 100.0);
    println!("Avg Annualized: {:.2}%", summary.avg_annualized_return * 100.0);
    println!("Avg Sharpe:     {:.3}", summary.avg_sharpe_ratio);
    println!("Avg Max DD:     {:.2}%", summary.avg_max_drawdown * 100.0);
    if let (Some(best), Some(worst)) = (&summary.best_symbol, &summary.worst_symbol) {
        println!("Best:           {best} ({:.2}%)", summary.best_return * 100.0);
        println!("Worst:          {worst} ({:.2}%)", summary.worst_return * 100.0);
    }
    println!();
    println!("{:<10} {:>10} {:>8} {:>10}", "Symbol", "Return", "Trades", "Sharpe");
    println!("{}", "-".repeat(41));
    for r in &summary.results {
        println!(
            "{:<10} {:>9.2}% {:>8} {:>10.3}",
            r.symbol,
            r.metrics.total_return * 100.0,
            r.metrics.num_trades,
            r.metrics.sharpe_ratio
        );
    }
    for f in &summary.failures {
        println!("FAILED {}: {}", f.symbol, f.error);
    }
    println!();
}
