//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span};

use crate::adapters::clock::TokioClock;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report::CsvReportSink;
use crate::adapters::feed::client::connect_and_consume;
use crate::adapters::feed::server::FeedServer;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_gateway::PaperGateway;
use crate::domain::config_validation::{load_app_config, AppConfig, LogConfig, LogFormat};
use crate::domain::error::DaytraderError;
use crate::domain::ledger::PositionLedger;
use crate::domain::metrics::SessionSummary;
use crate::domain::session::TradingSession;
use crate::domain::strategy::IndicatorEngine;
use crate::domain::timeline::Timeline;

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "DAYTRADER_LOG";

#[derive(Parser, Debug)]
#[command(name = "daytrader", about = "Consensus day-trading engine and bar replay feed")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Log output format (text or json); overrides [log] format
    #[arg(long, global = true)]
    pub log_format: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay CSV bar files to every connecting consumer
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bar files; replaces [feed] files
        #[arg(short, long, num_args = 1..)]
        files: Vec<PathBuf>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Connect to a feed and trade the stream
    Trade {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the trading pipeline over CSV bar files without a network
    Replay {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, num_args = 1..)]
        files: Vec<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        /// Also load the configured bar files
        #[arg(long)]
        check_data: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let log_overrides = (cli.log_level, cli.log_format);
    match cli.command {
        Command::Serve {
            config,
            files,
            port,
            interval_ms,
        } => with_config(config.as_ref(), &log_overrides, |mut app| {
            if !files.is_empty() {
                app.feed.files = files;
            }
            if let Some(port) = port {
                app.feed.port = port;
            }
            if let Some(interval_ms) = interval_ms {
                app.feed.interval_ms = interval_ms;
            }
            run_serve(&app)
        }),
        Command::Trade { config, host, port } => {
            with_config(config.as_ref(), &log_overrides, |mut app| {
                if let Some(host) = host {
                    app.feed.host = host;
                }
                if let Some(port) = port {
                    app.feed.port = port;
                }
                run_trade(&app)
            })
        }
        Command::Replay { config, files } => {
            with_config(config.as_ref(), &log_overrides, |mut app| {
                if !files.is_empty() {
                    app.feed.files = files;
                }
                run_replay(&app)
            })
        }
        Command::Validate { config, check_data } => run_validate(&config, check_data),
    }
}

/// Loads and validates the configuration, starts logging, then runs `f`.
fn with_config<F>(
    path: Option<&PathBuf>,
    log_overrides: &(Option<String>, Option<String>),
    f: F,
) -> ExitCode
where
    F: FnOnce(AppConfig) -> Result<(), DaytraderError>,
{
    let mut app = match load_app(path) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Some(level) = &log_overrides.0 {
        app.log.level = level.clone();
    }
    if let Some(format) = &log_overrides.1 {
        match format.parse::<LogFormat>() {
            Ok(format) => app.log.format = format,
            Err(reason) => {
                eprintln!("error: --log-format: {reason}");
                return ExitCode::from(2);
            }
        }
    }
    if let Err(e) = init_tracing(&app.log) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    match f(app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_app(path: Option<&PathBuf>) -> Result<AppConfig, DaytraderError> {
    match path {
        Some(path) => {
            let adapter = FileConfigAdapter::from_file(path)?;
            load_app_config(&adapter)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Installs the global subscriber. `DAYTRADER_LOG` wins over `log.level`.
pub fn init_tracing(log: &LogConfig) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let installed = match log.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|err| format!("failed to install log subscriber: {err}"))
}

fn runtime() -> Result<tokio::runtime::Runtime, DaytraderError> {
    Ok(tokio::runtime::Runtime::new()?)
}

fn load_timeline(app: &AppConfig) -> Result<Timeline, DaytraderError> {
    if app.feed.files.is_empty() {
        return Err(DaytraderError::ConfigMissing {
            section: "feed".into(),
            key: "files".into(),
        });
    }
    CsvAdapter::new(app.feed.files.clone()).load_timeline()
}

pub fn build_session(app: &AppConfig) -> Result<TradingSession<CsvReportSink>, DaytraderError> {
    let sink = CsvReportSink::create(
        app.report.trade_log.as_deref(),
        app.report.valuation_log.as_deref(),
    )?;
    let session = TradingSession::new(
        IndicatorEngine::new(app.strategy.clone()),
        app.risk.clone(),
        PositionLedger::new(app.ledger.clone()),
        sink,
    );
    if app.mirror_to_gateway {
        info!(initial_cash = app.ledger.initial_cash, "mirroring orders to paper gateway");
        Ok(session.with_gateway(Box::new(PaperGateway::new(app.ledger.initial_cash))))
    } else {
        Ok(session)
    }
}

fn run_serve(app: &AppConfig) -> Result<(), DaytraderError> {
    let timeline = Arc::new(load_timeline(app)?);
    let addr = format!("{}:{}", app.feed.host, app.feed.port);
    let interval = Duration::from_millis(app.feed.interval_ms);

    runtime()?.block_on(async move {
        let server = FeedServer::bind(&addr, timeline, TokioClock, interval).await?;
        eprintln!("Serving bars on {}", server.local_addr()?);
        server.run().await
    })
}

fn run_trade(app: &AppConfig) -> Result<(), DaytraderError> {
    let mut session = build_session(app)?;
    let addr = format!("{}:{}", app.feed.host, app.feed.port);
    let idle = Duration::from_secs(app.feed.idle_timeout_secs);

    let report = runtime()?.block_on(connect_and_consume(&addr, &mut session, idle))?;
    eprintln!(
        "Feed ended ({}): {} groups, {} skipped messages, {} rejected entries",
        report.end, report.groups, report.skipped_messages, report.rejected_entries
    );
    print_summary(&report.summary);
    Ok(())
}

fn run_replay(app: &AppConfig) -> Result<(), DaytraderError> {
    let timeline = load_timeline(app)?;
    let mut session = build_session(app)?;

    let span = info_span!("replay", groups = timeline.len());
    let _guard = span.enter();
    let mut skipped = 0usize;
    for group in timeline.iter() {
        skipped += session.process_group(group)?.skipped_bars;
    }
    let summary = session.finish()?;
    if skipped > 0 {
        eprintln!("Skipped {skipped} invalid bars");
    }
    print_summary(&summary);
    Ok(())
}

fn run_validate(path: &PathBuf, check_data: bool) -> ExitCode {
    eprintln!("Validating {}", path.display());
    let app = match load_app(Some(path)) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let votes: Vec<String> = app.strategy.votes.iter().map(|v| v.to_string()).collect();
    println!("Configuration is valid.");
    println!("  Feed:       {}:{} every {} ms", app.feed.host, app.feed.port, app.feed.interval_ms);
    println!(
        "  Strategy:   votes [{}], threshold {}, warm-up {} of {} bars",
        votes.join(", "),
        app.strategy.consensus_threshold,
        app.strategy.warmup,
        app.strategy.history_capacity
    );
    println!(
        "  Risk:       {:.2}% per trade, ATR({}) x {}, reward {}:1, max {} positions",
        app.risk.risk_per_trade * 100.0,
        app.risk.atr_period,
        app.risk.atr_multiplier,
        app.risk.reward_ratio,
        app.risk.max_open_positions
    );
    println!(
        "  Ledger:     cash {:.2}, trailing {:.2}%, cutoff {}",
        app.ledger.initial_cash,
        app.ledger.trailing_buffer * 100.0,
        app.ledger.eod_cutoff.format("%H:%M")
    );

    if check_data {
        match load_timeline(&app) {
            Ok(timeline) => println!(
                "  Data:       {} bars, {} timestamps, {} symbols",
                timeline.bar_count(),
                timeline.len(),
                timeline.symbols().len()
            ),
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    }
    ExitCode::SUCCESS
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("Session summary");
    println!("  Ticks:          {}", summary.ticks);
    println!("  Entries:        {}", summary.entries);
    println!(
        "  Exits:          {} ({} wins, {} losses, {} flat)",
        summary.exits, summary.wins, summary.losses, summary.breakeven
    );
    println!("  Win rate:       {:.2}%", summary.win_rate * 100.0);
    println!("  Profit factor:  {:.2}", summary.profit_factor);
    println!("  Realized PnL:   {:.2}", summary.realized_pnl);
    println!("  Final value:    {:.2}", summary.final_value);
    println!("  Total return:   {:.2}%", summary.total_return * 100.0);
    println!(
        "  Max drawdown:   {:.2}% over {} ticks",
        summary.max_drawdown * 100.0,
        summary.max_drawdown_ticks
    );
    if summary.open_positions > 0 {
        println!("  Open positions: {}", summary.open_positions);
    }
}
