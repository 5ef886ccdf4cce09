//! End-of-session statistics over the trade log and valuation history.

use super::portfolio::{Portfolio, ValuationSnapshot};
use super::position::TradeAction;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub ticks: usize,
    pub entries: usize,
    /// Closing fills, partial closes included.
    pub exits: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub realized_pnl: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_ticks: usize,
    pub open_positions: usize,
}

impl SessionSummary {
    pub fn compute(portfolio: &Portfolio) -> Self {
        let history = &portfolio.valuation_history;
        let initial = portfolio.initial_cash;
        let final_value = history
            .last()
            .map(|snap| snap.total_value)
            .unwrap_or_else(|| portfolio.total_value());
        let total_return = if initial > 0.0 {
            (final_value - initial) / initial
        } else {
            0.0
        };
        let (max_drawdown, max_drawdown_ticks) = compute_drawdown(history);

        let mut entries = 0usize;
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for entry in &portfolio.trade_log {
            if entry.action == TradeAction::Open {
                entries += 1;
                continue;
            }
            let pnl = entry.realized_pnl.unwrap_or(0.0);
            if pnl > 0.0 {
                wins += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                losses += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                breakeven += 1;
            }
        }

        let exits = wins + losses + breakeven;
        let win_rate = if exits > 0 {
            wins as f64 / exits as f64
        } else {
            0.0
        };
        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        SessionSummary {
            ticks: history.len(),
            entries,
            exits,
            wins,
            losses,
            breakeven,
            win_rate,
            profit_factor,
            largest_win,
            largest_loss,
            realized_pnl: portfolio.realized_pnl,
            final_value,
            total_return,
            max_drawdown,
            max_drawdown_ticks,
            open_positions: portfolio.position_count(),
        }
    }
}

/// Largest peak-to-trough fall as a fraction of the peak, and the longest
/// run of ticks spent below a peak.
fn compute_drawdown(history: &[ValuationSnapshot]) -> (f64, usize) {
    let Some(first) = history.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for snap in history {
        if snap.total_value >= peak {
            peak = snap.total_value;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - snap.total_value) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}
