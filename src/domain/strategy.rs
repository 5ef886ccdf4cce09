//! Consensus strategy: per-symbol history plus an ordered set of votes.

use std::collections::HashMap;

use super::history::SymbolHistory;
use super::indicator::{calculate_cci, calculate_ema, calculate_sma};
use super::ohlcv::Bar;
use super::signal::{consensus, Signal, Vote, VoteKind};

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub history_capacity: usize,
    pub warmup: usize,
    pub trend_span: usize,
    pub fast_span: usize,
    pub slow_span: usize,
    pub oscillator_period: usize,
    pub oscillator_threshold: f64,
    pub volume_period: usize,
    pub volume_factor: f64,
    pub votes: Vec<VoteKind>,
    pub consensus_threshold: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            history_capacity: 300,
            warmup: 200,
            trend_span: 200,
            fast_span: 9,
            slow_span: 26,
            oscillator_period: 20,
            oscillator_threshold: 100.0,
            volume_period: 20,
            volume_factor: 0.8,
            votes: VoteKind::ALL.to_vec(),
            consensus_threshold: 3,
        }
    }
}

/// Outcome of one evaluation, kept for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signal: Signal,
    pub votes: Vec<(VoteKind, Vote)>,
}

impl Evaluation {
    fn insufficient() -> Self {
        Evaluation {
            signal: Signal::None,
            votes: Vec::new(),
        }
    }
}

/// Owns the bar history of every symbol it has seen and turns it into signals.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: StrategyConfig,
    histories: HashMap<String, SymbolHistory>,
}

impl IndicatorEngine {
    pub fn new(config: StrategyConfig) -> Self {
        IndicatorEngine {
            config,
            histories: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Appends `bar` to its symbol's history; returns the evicted bar, if any.
    pub fn update(&mut self, bar: Bar) -> Option<Bar> {
        let capacity = self.config.history_capacity;
        self.histories
            .entry(bar.symbol.clone())
            .or_insert_with(|| SymbolHistory::new(capacity))
            .push(bar)
    }

    pub fn history(&self, symbol: &str) -> Option<&SymbolHistory> {
        self.histories.get(symbol)
    }

    pub fn history_len(&self, symbol: &str) -> usize {
        self.histories.get(symbol).map_or(0, SymbolHistory::len)
    }

    pub fn evaluate(&self, symbol: &str) -> Signal {
        self.evaluate_detailed(symbol).signal
    }

    pub fn evaluate_detailed(&self, symbol: &str) -> Evaluation {
        let Some(history) = self.histories.get(symbol) else {
            return Evaluation::insufficient();
        };
        if history.len() < self.config.warmup || history.is_empty() {
            return Evaluation::insufficient();
        }

        let votes: Vec<(VoteKind, Vote)> = self
            .config
            .votes
            .iter()
            .map(|&kind| (kind, cast_vote(kind, history, &self.config)))
            .collect();
        let ballots: Vec<Vote> = votes.iter().map(|(_, v)| *v).collect();

        Evaluation {
            signal: consensus(&ballots, self.config.consensus_threshold),
            votes,
        }
    }
}

pub fn cast_vote(kind: VoteKind, history: &SymbolHistory, config: &StrategyConfig) -> Vote {
    match kind {
        VoteKind::Trend => trend_vote(history, config.trend_span),
        VoteKind::VwapVolume => {
            vwap_volume_vote(history, config.volume_period, config.volume_factor)
        }
        VoteKind::Cci => cci_vote(
            history,
            config.oscillator_period,
            config.oscillator_threshold,
        ),
        VoteKind::EmaCrossover => ema_crossover_vote(history, config.fast_span, config.slow_span),
    }
}

/// Sign of (close - EMA(close, span)); neutral until the EMA is defined.
pub fn trend_vote(history: &SymbolHistory, span: usize) -> Vote {
    let Some(latest) = history.latest() else {
        return Vote::Neutral;
    };
    match calculate_ema(&history.closes(), span).last() {
        Some(ema) => Vote::from_sign(latest.close - ema),
        None => Vote::Neutral,
    }
}

/// Close against VWAP, counted only when volume beats `factor` times its average.
pub fn vwap_volume_vote(history: &SymbolHistory, period: usize, factor: f64) -> Vote {
    let Some(latest) = history.latest() else {
        return Vote::Neutral;
    };
    let Some(vwap) = latest.vwap else {
        return Vote::Neutral;
    };
    let Some(avg_volume) = calculate_sma(&history.volumes(), period).last() else {
        return Vote::Neutral;
    };
    if latest.volume <= factor * avg_volume {
        return Vote::Neutral;
    }
    Vote::from_sign(latest.close - vwap)
}

/// +1 above `threshold`, -1 below `-threshold`, neutral otherwise or while undefined.
pub fn cci_vote(history: &SymbolHistory, period: usize, threshold: f64) -> Vote {
    match calculate_cci(&history.typical_prices(), period).last() {
        Some(cci) if cci > threshold => Vote::Bullish,
        Some(cci) if cci < -threshold => Vote::Bearish,
        _ => Vote::Neutral,
    }
}

/// Sign of (fast EMA - slow EMA); neutral until the slow EMA is defined.
pub fn ema_crossover_vote(history: &SymbolHistory, fast_span: usize, slow_span: usize) -> Vote {
    let closes = history.closes();
    let slow = calculate_ema(&closes, slow_span).last();
    let fast = calculate_ema(&closes, fast_span).last();
    match (fast, slow) {
        (Some(fast), Some(slow)) => Vote::from_sign(fast - slow),
        _ => Vote::Neutral,
    }
}
