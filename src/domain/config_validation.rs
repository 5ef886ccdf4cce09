//! Configuration loading and validation.
//!
//! Every section is read into its typed config and checked before anything
//! runs; a bad value is the only fatal error at startup.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveTime;

use crate::domain::error::DaytraderError;
use crate::domain::ledger::LedgerConfig;
use crate::domain::risk::RiskParameters;
use crate::domain::signal::parse_vote_kinds;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    /// Delay between two consecutive messages.
    pub interval_ms: u64,
    /// Consumer read timeout.
    pub idle_timeout_secs: u64,
    pub files: Vec<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            host: "127.0.0.1".to_string(),
            port: 9999,
            interval_ms: 1000,
            idle_timeout_secs: 30,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportConfig {
    pub trade_log: Option<PathBuf>,
    pub valuation_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskParameters,
    pub ledger: LedgerConfig,
    /// Forward simulated entries and exits to the execution gateway.
    pub mirror_to_gateway: bool,
    pub report: ReportConfig,
    pub log: LogConfig,
}

pub fn load_app_config(config: &dyn ConfigPort) -> Result<AppConfig, DaytraderError> {
    Ok(AppConfig {
        feed: load_feed_config(config)?,
        strategy: load_strategy_config(config)?,
        risk: load_risk_parameters(config)?,
        ledger: load_ledger_config(config)?,
        mirror_to_gateway: config.get_bool("ledger", "mirror_to_gateway", false),
        report: load_report_config(config),
        log: load_log_config(config)?,
    })
}

pub fn load_feed_config(config: &dyn ConfigPort) -> Result<FeedConfig, DaytraderError> {
    let defaults = FeedConfig::default();
    let port = read_int(config, "feed", "port", i64::from(defaults.port))?;
    let port = u16::try_from(port).map_err(|_| {
        DaytraderError::config_invalid("feed", "port", "port must be between 0 and 65535")
    })?;
    let interval_ms = read_int(config, "feed", "interval_ms", defaults.interval_ms as i64)?;
    if interval_ms < 0 {
        return Err(DaytraderError::config_invalid(
            "feed",
            "interval_ms",
            "interval_ms must be non-negative",
        ));
    }
    let idle_timeout_secs = read_int(
        config,
        "feed",
        "idle_timeout_secs",
        defaults.idle_timeout_secs as i64,
    )?;
    if idle_timeout_secs < 1 {
        return Err(DaytraderError::config_invalid(
            "feed",
            "idle_timeout_secs",
            "idle_timeout_secs must be at least 1",
        ));
    }

    Ok(FeedConfig {
        host: config
            .get_string("feed", "host")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.host),
        port,
        interval_ms: interval_ms as u64,
        idle_timeout_secs: idle_timeout_secs as u64,
        files: config
            .get_string("feed", "files")
            .map(|list| split_list(&list).map(PathBuf::from).collect())
            .unwrap_or_default(),
    })
}

pub fn load_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, DaytraderError> {
    let d = StrategyConfig::default();
    let votes = match config.get_string("strategy", "votes") {
        Some(list) => parse_vote_kinds(&list)
            .map_err(|reason| DaytraderError::config_invalid("strategy", "votes", reason))?,
        None => d.votes.clone(),
    };

    let strategy = StrategyConfig {
        history_capacity: read_count(config, "strategy", "history_capacity", d.history_capacity)?,
        warmup: read_count(config, "strategy", "warmup", d.warmup)?,
        trend_span: read_count(config, "strategy", "trend_span", d.trend_span)?,
        fast_span: read_count(config, "strategy", "fast_span", d.fast_span)?,
        slow_span: read_count(config, "strategy", "slow_span", d.slow_span)?,
        oscillator_period: read_count(
            config,
            "strategy",
            "oscillator_period",
            d.oscillator_period,
        )?,
        oscillator_threshold: read_double(
            config,
            "strategy",
            "oscillator_threshold",
            d.oscillator_threshold,
        )?,
        volume_period: read_count(config, "strategy", "volume_period", d.volume_period)?,
        volume_factor: read_double(config, "strategy", "volume_factor", d.volume_factor)?,
        votes,
        consensus_threshold: read_count(
            config,
            "strategy",
            "consensus_threshold",
            d.consensus_threshold,
        )?,
    };
    validate_strategy(&strategy)?;
    Ok(strategy)
}

pub fn validate_strategy(s: &StrategyConfig) -> Result<(), DaytraderError> {
    let invalid = |key: &str, reason: &str| -> Result<(), DaytraderError> {
        Err(DaytraderError::config_invalid("strategy", key, reason))
    };

    if s.history_capacity < 1 {
        return invalid("history_capacity", "history_capacity must be at least 1");
    }
    if s.warmup < 1 || s.warmup > s.history_capacity {
        return invalid("warmup", "warmup must be between 1 and history_capacity");
    }
    if s.fast_span < 1 || s.fast_span >= s.slow_span {
        return invalid("fast_span", "fast_span must be at least 1 and below slow_span");
    }
    if s.trend_span < 1 {
        return invalid("trend_span", "trend_span must be at least 1");
    }
    if s.oscillator_period < 2 {
        return invalid("oscillator_period", "oscillator_period must be at least 2");
    }
    if s.oscillator_threshold <= 0.0 {
        return invalid("oscillator_threshold", "oscillator_threshold must be positive");
    }
    if s.volume_period < 1 {
        return invalid("volume_period", "volume_period must be at least 1");
    }
    if s.volume_factor < 0.0 {
        return invalid("volume_factor", "volume_factor must be non-negative");
    }
    if s.votes.is_empty() {
        return invalid("votes", "at least one vote is required");
    }
    let n = s.votes.len();
    if s.consensus_threshold < 1 || s.consensus_threshold > n || 2 * s.consensus_threshold <= n {
        return Err(DaytraderError::config_invalid(
            "strategy",
            "consensus_threshold",
            format!("consensus_threshold must be a strict majority of the {n} votes"),
        ));
    }
    Ok(())
}

pub fn load_risk_parameters(config: &dyn ConfigPort) -> Result<RiskParameters, DaytraderError> {
    let d = RiskParameters::default();
    let index_reward_ratio = if config.has_key("risk", "index_reward_ratio") {
        Some(read_double(config, "risk", "index_reward_ratio", 1.0)?)
    } else {
        None
    };

    let params = RiskParameters {
        risk_per_trade: read_double(config, "risk", "risk_per_trade", d.risk_per_trade)?,
        atr_period: read_count(config, "risk", "atr_period", d.atr_period)?,
        atr_multiplier: read_double(config, "risk", "atr_multiplier", d.atr_multiplier)?,
        reward_ratio: read_double(config, "risk", "reward_ratio", d.reward_ratio)?,
        max_position_fraction: read_double(
            config,
            "risk",
            "max_position_fraction",
            d.max_position_fraction,
        )?,
        max_open_positions: read_count(config, "risk", "max_open_positions", d.max_open_positions)?,
        max_notional_ratio: read_double(
            config,
            "risk",
            "max_notional_ratio",
            d.max_notional_ratio,
        )?,
        index_reward_ratio,
        min_stop_price: read_double(config, "risk", "min_stop_price", d.min_stop_price)?,
        epsilon: read_double(config, "risk", "epsilon", d.epsilon)?,
    };
    validate_risk(&params)?;
    Ok(params)
}

pub fn validate_risk(p: &RiskParameters) -> Result<(), DaytraderError> {
    let invalid = |key: &str, reason: &str| -> Result<(), DaytraderError> {
        Err(DaytraderError::config_invalid("risk", key, reason))
    };

    if p.risk_per_trade <= 0.0 || p.risk_per_trade > 1.0 {
        return invalid("risk_per_trade", "risk_per_trade must be in (0, 1]");
    }
    if p.atr_period < 1 {
        return invalid("atr_period", "atr_period must be at least 1");
    }
    if p.atr_multiplier <= 0.0 {
        return invalid("atr_multiplier", "atr_multiplier must be positive");
    }
    if p.reward_ratio <= 0.0 {
        return invalid("reward_ratio", "reward_ratio must be positive");
    }
    if let Some(ratio) = p.index_reward_ratio {
        if ratio <= 0.0 {
            return invalid("index_reward_ratio", "index_reward_ratio must be positive");
        }
    }
    if p.max_position_fraction <= 0.0 || p.max_position_fraction > 1.0 {
        return invalid("max_position_fraction", "max_position_fraction must be in (0, 1]");
    }
    if p.max_open_positions < 1 {
        return invalid("max_open_positions", "max_open_positions must be at least 1");
    }
    if p.max_notional_ratio <= 0.0 {
        return invalid("max_notional_ratio", "max_notional_ratio must be positive");
    }
    if p.min_stop_price < 0.0 {
        return invalid("min_stop_price", "min_stop_price must be non-negative");
    }
    if p.epsilon <= 0.0 {
        return invalid("epsilon", "epsilon must be positive");
    }
    Ok(())
}

pub fn load_ledger_config(config: &dyn ConfigPort) -> Result<LedgerConfig, DaytraderError> {
    let d = LedgerConfig::default();
    let partial_close_times = match config.get_string("ledger", "partial_close_times") {
        Some(list) => split_list(&list)
            .map(|t| parse_time(t, "partial_close_times"))
            .collect::<Result<Vec<_>, _>>()?,
        None => d.partial_close_times.clone(),
    };
    let eod_cutoff = match config.get_string("ledger", "eod_cutoff") {
        Some(t) => parse_time(&t, "eod_cutoff")?,
        None => d.eod_cutoff,
    };

    let ledger = LedgerConfig {
        initial_cash: read_double(config, "ledger", "initial_cash", d.initial_cash)?,
        trailing_buffer: read_double(config, "ledger", "trailing_buffer", d.trailing_buffer)?,
        partial_close_fraction: read_double(
            config,
            "ledger",
            "partial_close_fraction",
            d.partial_close_fraction,
        )?,
        partial_close_times,
        eod_cutoff,
        buying_power_multiplier: read_double(
            config,
            "ledger",
            "buying_power_multiplier",
            d.buying_power_multiplier,
        )?,
    };

    let invalid = |key: &str, reason: &str| -> Result<LedgerConfig, DaytraderError> {
        Err(DaytraderError::config_invalid("ledger", key, reason))
    };
    if ledger.initial_cash <= 0.0 {
        return invalid("initial_cash", "initial_cash must be positive");
    }
    if ledger.trailing_buffer < 0.0 || ledger.trailing_buffer >= 1.0 {
        return invalid("trailing_buffer", "trailing_buffer must be in [0, 1)");
    }
    if ledger.partial_close_fraction <= 0.0 || ledger.partial_close_fraction > 1.0 {
        return invalid("partial_close_fraction", "partial_close_fraction must be in (0, 1]");
    }
    if ledger.buying_power_multiplier <= 0.0 {
        return invalid("buying_power_multiplier", "buying_power_multiplier must be positive");
    }
    Ok(ledger)
}

pub fn load_report_config(config: &dyn ConfigPort) -> ReportConfig {
    let path = |key: &str| {
        config
            .get_string("report", key)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    };
    ReportConfig {
        trade_log: path("trade_log"),
        valuation_log: path("valuation_log"),
    }
}

pub fn load_log_config(config: &dyn ConfigPort) -> Result<LogConfig, DaytraderError> {
    let d = LogConfig::default();
    let level = config
        .get_string("log", "level")
        .map(|l| l.trim().to_ascii_lowercase())
        .unwrap_or(d.level);
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        return Err(DaytraderError::config_invalid(
            "log",
            "level",
            format!("unknown log level '{level}'"),
        ));
    }
    let format = match config.get_string("log", "format") {
        Some(f) => f
            .parse()
            .map_err(|reason: String| DaytraderError::config_invalid("log", "format", reason))?,
        None => d.format,
    };
    Ok(LogConfig { level, format })
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_time(raw: &str, key: &str) -> Result<NaiveTime, DaytraderError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| {
            let reason = format!("invalid time '{raw}', expected HH:MM");
            DaytraderError::config_invalid("ledger", key, reason)
        })
}

/// Present-but-unparsable values are errors rather than silent defaults.
fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, DaytraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                let reason = format!("'{}' is not a number", raw.trim());
                DaytraderError::config_invalid(section, key, reason)
            }),
    }
}

fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, DaytraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| {
                let reason = format!("'{}' is not an integer", raw.trim());
                DaytraderError::config_invalid(section, key, reason)
            }),
    }
}

fn read_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, DaytraderError> {
    let value = read_int(config, section, key, default as i64)?;
    usize::try_from(value)
        .map_err(|_| {
            DaytraderError::config_invalid(section, key, format!("{key} must be non-negative"))
        })
}
