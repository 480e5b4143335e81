//! Run statistics assembled for the final report.

use super::broker::Order;

/// One equity-curve sample, taken after each bar.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EquityPoint {
    pub time: i64,
    pub balance: f64,
    pub equity: f64,
}

/// Headline numbers of a finished run, derived from the closed-order list
/// and the equity curve alone.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Summary {
    pub net_profit: f64,
    pub gross_profit: f64,
    /// Sum of losing trades, stored positive.
    pub gross_loss: f64,
    /// `gross_profit / gross_loss`; with no losing trades this reports
    /// plain `gross_profit` instead of dividing by zero.
    pub profit_factor: f64,
    /// Largest peak-to-trough equity drop, in deposit currency.
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage of closed trades with positive profit.
    pub win_rate: f64,
}

impl Summary {
    pub fn compute(closed: &[Order], equity_curve: &[EquityPoint]) -> Self {
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        let mut wins = 0usize;
        let mut losses = 0usize;
        for order in closed {
            if order.profit > 0.0 {
                wins += 1;
                gross_profit += order.profit;
            } else if order.profit < 0.0 {
                losses += 1;
                gross_loss += -order.profit;
            }
        }

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            gross_profit
        };

        let trade_count = closed.len();
        let win_rate = if trade_count > 0 {
            wins as f64 / trade_count as f64 * 100.0
        } else {
            0.0
        };

        Summary {
            net_profit: gross_profit - gross_loss,
            gross_profit,
            gross_loss,
            profit_factor,
            max_drawdown: max_drawdown(equity_curve),
            trade_count,
            wins,
            losses,
            win_rate,
        }
    }
}

fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else {
            worst = worst.max(peak - point.equity);
        }
    }
    worst
}
