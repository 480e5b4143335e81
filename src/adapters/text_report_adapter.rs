//! Plain-text rendering of a finished backtest.
//!
//! The layout follows the classic strategy-tester report: a summary
//! block, the account snapshot, one line per closed trade and a note
//! about the equity curve. Prices print with five decimals, money with
//! two.

use crate::domain::backtest::BacktestReport;
use crate::domain::broker::{Order, OrderKind};
use crate::domain::semantics::ProgramType;
use crate::ports::report_port::ReportPort;

pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for TextReportAdapter {
    fn render(&self, report: &BacktestReport) -> String {
        let mut out = String::new();
        let kind = match report.program_type {
            ProgramType::Expert => "expert",
            ProgramType::Indicator => "indicator",
            ProgramType::Script => "script",
        };
        out.push_str(&format!("Backtest report ({kind})\n"));
        out.push_str("=======================\n\n");
        if let Some(error) = &report.error {
            out.push_str(&format!("run failed: {error}\n\n"));
        }

        let s = &report.summary;
        out.push_str("Summary\n");
        out.push_str(&format!("  net profit     {:>12.2}\n", s.net_profit));
        out.push_str(&format!("  gross profit   {:>12.2}\n", s.gross_profit));
        out.push_str(&format!("  gross loss     {:>12.2}\n", s.gross_loss));
        out.push_str(&format!("  profit factor  {:>12.2}\n", s.profit_factor));
        out.push_str(&format!("  max drawdown   {:>12.2}\n", s.max_drawdown));
        out.push_str(&format!(
            "  trades         {:>12} ({} wins / {} losses, {:.1}% win rate)\n",
            s.trade_count, s.wins, s.losses, s.win_rate
        ));

        let m = &report.metrics;
        out.push_str("\nAccount\n");
        out.push_str(&format!("  balance        {:>12.2}\n", m.balance));
        out.push_str(&format!("  equity         {:>12.2}\n", m.equity));
        out.push_str(&format!("  open profit    {:>12.2}\n", m.open_profit));
        out.push_str(&format!("  margin         {:>12.2}\n", m.margin));
        out.push_str(&format!("  free margin    {:>12.2}\n", m.free_margin));

        if !report.trades.is_empty() {
            out.push_str("\nTrades\n");
            out.push_str(
                "  ticket  type        lots   open time         open      close     profit\n",
            );
            for trade in &report.trades {
                out.push_str(&trade_line(trade));
            }
        }

        match (report.equity_curve.first(), report.equity_curve.last()) {
            (Some(first), Some(last)) => out.push_str(&format!(
                "\nEquity curve: {} samples from {} to {}\n",
                report.equity_curve.len(),
                timestamp(first.time),
                timestamp(last.time)
            )),
            _ => out.push_str("\nEquity curve: empty\n"),
        }
        out
    }
}

fn trade_line(trade: &Order) -> String {
    format!(
        "  {:<7} {:<11} {:<6.2} {:<17} {:<9.5} {:<9.5} {:.2}\n",
        trade.ticket,
        kind_label(trade.kind),
        trade.volume,
        timestamp(trade.open_time),
        trade.open_price,
        trade.close_price,
        trade.profit
    )
}

fn kind_label(kind: OrderKind) -> &'static str {
    match kind {
        OrderKind::Buy => "buy",
        OrderKind::Sell => "sell",
        OrderKind::BuyLimit => "buy limit",
        OrderKind::SellLimit => "sell limit",
    }
}

fn timestamp(time: i64) -> String {
    match chrono::DateTime::from_timestamp(time, 0) {
        Some(moment) => moment.format("%Y-%m-%d %H:%M").to_string(),
        None => time.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountMetrics;
    use crate::domain::broker::OrderState;
    use crate::domain::metrics::{EquityPoint, Summary};
    use tempfile::TempDir;

    fn sample_report() -> BacktestReport {
        let trade = Order {
            ticket: 1,
            kind: OrderKind::Buy,
            symbol: "EURUSD".into(),
            volume: 1.0,
            open_price: 1.1,
            sl: 0.0,
            tp: 0.0,
            open_time: 7_200,
            state: OrderState::Closed,
            close_time: 14_400,
            close_price: 1.3,
            profit: 0.2,
            comment: String::new(),
            magic: 0,
        };
        let equity_curve = vec![
            EquityPoint {
                time: 3_600,
                balance: 10_000.0,
                equity: 10_000.0,
            },
            EquityPoint {
                time: 14_400,
                balance: 10_000.2,
                equity: 10_000.2,
            },
        ];
        let summary = Summary::compute(std::slice::from_ref(&trade), &equity_curve);
        BacktestReport {
            trades: vec![trade],
            equity_curve,
            metrics: AccountMetrics {
                balance: 10_000.2,
                equity: 10_000.2,
                closed_profit: 0.2,
                open_profit: 0.0,
                margin: 0.0,
                free_margin: 10_000.2,
            },
            summary,
            program_type: ProgramType::Expert,
            error: None,
        }
    }

    #[test]
    fn the_report_carries_summary_account_and_trades() {
        let rendered = TextReportAdapter::new().render(&sample_report());
        assert!(rendered.starts_with("Backtest report (expert)"));
        assert!(rendered.contains("net profit             0.20"));
        assert!(rendered.contains("balance            10000.20"));
        assert!(rendered.contains("buy"));
        assert!(rendered.contains("1.10000"));
        assert!(rendered.contains("2 samples"));
        assert!(!rendered.contains("run failed"));
    }

    #[test]
    fn a_failed_run_leads_with_the_error() {
        let mut report = sample_report();
        report.error = Some("Function Missing not found".into());
        let rendered = TextReportAdapter::new().render(&report);
        assert!(rendered.contains("run failed: Function Missing not found"));
    }

    #[test]
    fn write_puts_the_rendering_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let adapter = TextReportAdapter::new();
        adapter
            .write(&sample_report(), path.to_str().unwrap())
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, adapter.render(&sample_report()));
    }
}
