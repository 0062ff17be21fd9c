//! OI breakout backtester CLI.
//!
//! # Usage
//!
//! ```bash
//! # Backtest on a synthetic scenario
//! oi-breakout backtest --start 2024-03-01 --end 2024-03-31 --scenario volatile --seed 7
//!
//! # Backtest on recorded days (<dir>/<YYYY-MM-DD>.json), caching loaded days
//! oi-breakout backtest --start 2024-03-01 --end 2024-03-31 --data data/chains --cache data/cache
//!
//! # Write synthetic days to disk
//! oi-breakout generate --start 2024-03-01 --end 2024-03-08 --out data/chains
//!
//! # Replay one recorded day through the live pipeline
//! oi-breakout replay --data data/chains --date 2024-03-04
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use oi_breakout::backtest::{run_live, BacktestRunner, LiveSession};
use oi_breakout::config::AppConfig;
use oi_breakout::data::cache::write_day;
use oi_breakout::data::{
    trading_days, DaySnapshots, DirectoryFeed, ExchangeCalendar, HistoricalFeed, HistoricalReplay, MarketHours,
    ReplaySource, ScenarioTemplate, SnapshotCache, SyntheticScenario,
};
use oi_breakout::metrics::BacktestReport;

#[derive(Parser)]
#[command(name = "oi-breakout")]
#[command(about = "Open-interest breakout option buying: backtest and replay")]
#[command(version)]
struct Cli {
    /// Path to JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest over a date range
    Backtest {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD), inclusive
        #[arg(long)]
        end: String,

        /// Directory of recorded day files; synthetic data when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Directory to cache loaded days in
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Synthetic scenario template (bullish, bearish, sideways, volatile)
        #[arg(long, default_value = "sideways")]
        scenario: String,

        /// Synthetic scenario seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Replay days in parallel
        #[arg(long)]
        parallel: bool,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write synthetic trading days as day files
    Generate {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        #[arg(long, default_value = "sideways")]
        scenario: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Replay one recorded day through the live session loop
    Replay {
        /// Directory of recorded day files
        #[arg(short, long)]
        data: PathBuf,

        /// Trading date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date {}", s))
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(&path).with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(AppConfig::default()),
    }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

fn run_backtest<S: DaySnapshots>(
    runner: &BacktestRunner<ExchangeCalendar>,
    source: &mut S,
    start: NaiveDate,
    end: NaiveDate,
    parallel: bool,
) -> Result<BacktestReport> {
    let total = trading_days(runner.calendar(), start, end)?.len();
    let pb = progress_bar(total)?;

    let report = if parallel {
        pb.set_message("loading");
        let days = runner.load_days(source, start, end)?;
        pb.set_position(total as u64);
        pb.set_message("replaying");
        runner.run_parallel(days, start, end)?
    } else {
        runner.run_with(source, start, end, |date| {
            pb.set_message(date.to_string());
            pb.inc(1);
        })?
    };
    pb.finish_with_message("done");
    Ok(report)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("oi_breakout=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let calendar = ExchangeCalendar::new(config.calendar.clone())?;
    let hours = MarketHours {
        open: config.calendar.market_open,
        close: config.calendar.market_close,
    };

    match cli.command {
        Commands::Backtest {
            start,
            end,
            data,
            cache,
            scenario,
            seed,
            parallel,
            output,
        } => {
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            let runner = BacktestRunner::new(config.strategy.clone(), calendar);

            let report = match data {
                Some(dir) => {
                    info!("Replaying recorded days from {:?}", dir);
                    let cache = match cache {
                        Some(cache_dir) => SnapshotCache::with_dir(cache_dir)?,
                        None => SnapshotCache::in_memory(),
                    };
                    let mut source = HistoricalReplay::new(DirectoryFeed::new(dir), cache);
                    run_backtest(&runner, &mut source, start, end, parallel)?
                }
                None => {
                    let template: ScenarioTemplate = scenario.parse()?;
                    info!("Generating {} scenario with seed {}", template, seed);
                    let mut source = SyntheticScenario::new(template, seed, hours);
                    run_backtest(&runner, &mut source, start, end, parallel)?
                }
            };

            for day in &report.days {
                println!("{}\n", day.report());
            }
            for aborted in &report.aborted_days {
                println!("ABORTED {}: {}\n", aborted.date, aborted.reason);
            }
            println!("{}", report.summary());

            if let Some(path) = output {
                fs::write(&path, serde_json::to_string_pretty(&report)?)
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
                println!("\nReport written to {:?}", path);
            }
        }

        Commands::Generate {
            start,
            end,
            scenario,
            seed,
            out,
        } => {
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            let template: ScenarioTemplate = scenario.parse()?;
            let scenario = SyntheticScenario::new(template, seed, hours);

            let days = trading_days(&calendar, start, end)?;
            let pb = progress_bar(days.len())?;
            for date in days {
                let path = write_day(&out, date, &scenario.generate(date)?)?;
                pb.set_message(format!("{:?}", path));
                pb.inc(1);
            }
            pb.finish_with_message("done");
        }

        Commands::Replay { data, date } => {
            let date = parse_date(&date)?;
            let Some(snapshots) = DirectoryFeed::new(&data).fetch_day(date)? else {
                bail!("No recorded data for {} in {:?}", date, data);
            };
            info!("Replaying {} snapshots for {}", snapshots.len(), date);

            let mut source = ReplaySource::new(snapshots);
            let mut session = LiveSession::new(config.strategy, calendar);
            let stop = AtomicBool::new(false);
            let accepted = run_live(&mut source, &mut session, &stop)?;
            info!("{} snapshots accepted", accepted);

            for day in session.finish() {
                println!("{}\n", day.report());
            }
        }
    }

    Ok(())
}
