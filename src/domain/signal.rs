//! Indicator votes and the consensus rule that turns them into a signal.

use std::fmt;
use std::str::FromStr;

/// Ternary opinion of one indicator about the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Bullish,
    Bearish,
    Neutral,
}

impl Vote {
    /// Strict sign of `value`; zero and NaN are neutral.
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Vote::Bullish
        } else if value < 0.0 {
            Vote::Bearish
        } else {
            Vote::Neutral
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Vote::Bullish => 1,
            Vote::Bearish => -1,
            Vote::Neutral => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    None,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::None => write!(f, "NONE"),
        }
    }
}

/// The indicators a strategy can poll, in the order they are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteKind {
    /// Close versus the long EMA.
    Trend,
    /// Close versus VWAP, confirmed by above-average volume.
    VwapVolume,
    /// Commodity Channel Index beyond ±threshold.
    Cci,
    /// Fast EMA versus slow EMA.
    EmaCrossover,
}

impl VoteKind {
    pub const ALL: [VoteKind; 4] = [
        VoteKind::Trend,
        VoteKind::VwapVolume,
        VoteKind::Cci,
        VoteKind::EmaCrossover,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VoteKind::Trend => "trend",
            VoteKind::VwapVolume => "vwap_volume",
            VoteKind::Cci => "cci",
            VoteKind::EmaCrossover => "ema_crossover",
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        VoteKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| format!("unknown vote '{}'", s.trim()))
    }
}

/// Parses a comma-separated vote list such as `trend,vwap_volume,cci`.
pub fn parse_vote_kinds(input: &str) -> Result<Vec<VoteKind>, String> {
    let mut kinds = Vec::new();
    for part in input.split(',').filter(|p| !p.trim().is_empty()) {
        let kind: VoteKind = part.parse()?;
        if kinds.contains(&kind) {
            return Err(format!("duplicate vote '{}'", kind));
        }
        kinds.push(kind);
    }
    Ok(kinds)
}

/// BUY if at least `threshold` votes are bullish, SELL if at least
/// `threshold` are bearish, otherwise NONE.
///
/// When both sides reach the threshold (only possible with a threshold at or
/// below half the votes) the result is NONE.
pub fn consensus(votes: &[Vote], threshold: usize) -> Signal {
    if threshold == 0 {
        return Signal::None;
    }
    let bullish = votes.iter().filter(|v| **v == Vote::Bullish).count();
    let bearish = votes.iter().filter(|v| **v == Vote::Bearish).count();
    match (bullish >= threshold, bearish >= threshold) {
        (true, false) => Signal::Buy,
        (false, true) => Signal::Sell,
        _ => Signal::None,
    }
}
