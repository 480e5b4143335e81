//! Account state and derived metrics.
//!
//! Balance is the only stored number; everything else is computed from the
//! broker book and the current quote on demand, so the figures can never
//! drift from the orders they describe.

use super::broker::Broker;

#[derive(Debug, Clone)]
pub struct Account {
    pub balance: f64,
    pub currency: String,
    pub name: String,
    pub number: i64,
    pub leverage: i64,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            balance: 10_000.0,
            currency: "USD".into(),
            name: "backtest".into(),
            number: 1,
            leverage: 1,
        }
    }
}

/// Snapshot of the derived figures at one quote.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AccountMetrics {
    pub balance: f64,
    pub equity: f64,
    pub closed_profit: f64,
    pub open_profit: f64,
    pub margin: f64,
    pub free_margin: f64,
}

impl Account {
    pub fn new(balance: f64, currency: &str) -> Self {
        Account {
            balance,
            currency: currency.into(),
            ..Account::default()
        }
    }

    /// Realized profit moves the balance; floating profit never does.
    pub fn apply_profit(&mut self, profit: f64) {
        self.balance += profit;
    }

    /// equity = balance + open profit, free margin = equity - held margin
    pub fn metrics(&self, broker: &Broker, bid: f64, ask: f64) -> AccountMetrics {
        let open_profit = broker.open_profit(bid, ask);
        let margin = broker.held_margin();
        let equity = self.balance + open_profit;
        AccountMetrics {
            balance: self.balance,
            equity,
            closed_profit: broker.closed_profit(),
            open_profit,
            margin,
            free_margin: equity - margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::broker::{OrderKind, OrderRequest};
    use approx::assert_relative_eq;

    fn buy_request(price: f64) -> OrderRequest {
        OrderRequest {
            kind: OrderKind::Buy,
            symbol: "EURUSD".into(),
            volume: 2.0,
            price,
            sl: 0.0,
            tp: 0.0,
            time: 0,
            comment: String::new(),
            magic: 0,
        }
    }

    #[test]
    fn defaults() {
        let account = Account::default();
        assert_relative_eq!(account.balance, 10_000.0);
        assert_eq!(account.currency, "USD");
    }

    #[test]
    fn apply_profit_moves_balance() {
        let mut account = Account::new(500.0, "EUR");
        account.apply_profit(-25.0);
        assert_relative_eq!(account.balance, 475.0);
    }

    #[test]
    fn metrics_derive_from_broker_and_quote() {
        let mut account = Account::default();
        let mut broker = Broker::new();
        let ticket = broker.place(buy_request(1.10));
        // floating: (1.15 - 1.10) * 2
        let m = account.metrics(&broker, 1.15, 1.16);
        assert_relative_eq!(m.open_profit, 0.10);
        assert_relative_eq!(m.equity, 10_000.10);
        assert_relative_eq!(m.margin, 2.20);
        assert_relative_eq!(m.free_margin, m.equity - 2.20);
        assert_relative_eq!(m.closed_profit, 0.0);

        let realized = broker.close(ticket, 1.15, 10).unwrap();
        account.apply_profit(realized);
        let m = account.metrics(&broker, 1.15, 1.16);
        assert_relative_eq!(m.balance, 10_000.10);
        assert_relative_eq!(m.equity, m.balance);
        assert_relative_eq!(m.open_profit, 0.0);
        assert_relative_eq!(m.margin, 0.0);
        assert_relative_eq!(m.closed_profit, 0.10);
    }
}
