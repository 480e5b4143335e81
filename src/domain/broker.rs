//! In-memory broker: order book, pending triggers and stop handling.

use super::market::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OrderKind {
    Buy,
    Sell,
    BuyLimit,
    SellLimit,
}

impl OrderKind {
    /// Trade command code as scripts pass it: 0 buy, 1 sell, 2 buy limit,
    /// 3 sell limit.
    pub fn from_cmd(cmd: i64) -> Option<OrderKind> {
        match cmd {
            0 => Some(OrderKind::Buy),
            1 => Some(OrderKind::Sell),
            2 => Some(OrderKind::BuyLimit),
            3 => Some(OrderKind::SellLimit),
            _ => None,
        }
    }

    pub fn cmd(self) -> i64 {
        match self {
            OrderKind::Buy => 0,
            OrderKind::Sell => 1,
            OrderKind::BuyLimit => 2,
            OrderKind::SellLimit => 3,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, OrderKind::Buy | OrderKind::BuyLimit)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, OrderKind::BuyLimit | OrderKind::SellLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OrderState {
    Pending,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Order {
    pub ticket: i64,
    pub kind: OrderKind,
    pub symbol: String,
    pub volume: f64,
    pub open_price: f64,
    pub sl: f64,
    pub tp: f64,
    pub open_time: i64,
    pub state: OrderState,
    pub close_time: i64,
    pub close_price: f64,
    pub profit: f64,
    pub comment: String,
    pub magic: i64,
}

impl Order {
    /// (price - open) * volume for buys, (open - price) * volume for sells.
    pub fn profit_at(&self, price: f64) -> f64 {
        if self.kind.is_buy() {
            (price - self.open_price) * self.volume
        } else {
            (self.open_price - price) * self.volume
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeChange {
    Opened,
    Closed,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEvent {
    pub ticket: i64,
    pub change: TradeChange,
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub kind: OrderKind,
    pub symbol: String,
    pub volume: f64,
    pub price: f64,
    pub sl: f64,
    pub tp: f64,
    pub time: i64,
    pub comment: String,
    pub magic: i64,
}

/// Owns every order of a run. Tickets start at 1 and never recycle, so the
/// book vector stays in placement order.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    orders: Vec<Order>,
    next_ticket: i64,
    events: Vec<TradeEvent>,
}

impl Broker {
    pub fn new() -> Self {
        Broker {
            orders: Vec::new(),
            next_ticket: 1,
            events: Vec::new(),
        }
    }

    /// Accept an order. Market orders open immediately at the given price;
    /// limit orders wait for a candle whose range contains it.
    pub fn place(&mut self, req: OrderRequest) -> i64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let state = if req.kind.is_pending() {
            OrderState::Pending
        } else {
            OrderState::Open
        };
        self.orders.push(Order {
            ticket,
            kind: req.kind,
            symbol: req.symbol,
            volume: req.volume,
            open_price: req.price,
            sl: req.sl,
            tp: req.tp,
            open_time: req.time,
            state,
            close_time: 0,
            close_price: 0.0,
            profit: 0.0,
            comment: req.comment,
            magic: req.magic,
        });
        if state == OrderState::Open {
            self.events.push(TradeEvent {
                ticket,
                change: TradeChange::Opened,
            });
        }
        ticket
    }

    /// One bar of book-keeping: trigger pendings whose limit price falls in
    /// the candle range, then apply take-profit and stop-loss to every open
    /// order (take-profit wins when both are inside the range). Returns the
    /// profit realized during this bar.
    pub fn update(&mut self, symbol: &str, candle: &Candle) -> f64 {
        let mut realized = 0.0;
        for i in 0..self.orders.len() {
            if self.orders[i].symbol != symbol {
                continue;
            }
            if self.orders[i].state == OrderState::Pending {
                let price = self.orders[i].open_price;
                if candle.low <= price && price <= candle.high {
                    self.orders[i].state = OrderState::Open;
                    self.orders[i].open_time = candle.time;
                    self.events.push(TradeEvent {
                        ticket: self.orders[i].ticket,
                        change: TradeChange::Opened,
                    });
                }
            }
            if self.orders[i].state == OrderState::Open {
                let order = &self.orders[i];
                let tp_hit = order.tp > 0.0 && candle.low <= order.tp && order.tp <= candle.high;
                let sl_hit = order.sl > 0.0 && candle.low <= order.sl && order.sl <= candle.high;
                let exit = if tp_hit {
                    Some(order.tp)
                } else if sl_hit {
                    Some(order.sl)
                } else {
                    None
                };
                if let Some(price) = exit {
                    realized += self.settle(i, price, candle.time);
                }
            }
        }
        realized
    }

    /// Close an open order at a price. Returns the realized profit, or None
    /// when the ticket is unknown or not open.
    pub fn close(&mut self, ticket: i64, price: f64, time: i64) -> Option<f64> {
        let index = self
            .orders
            .iter()
            .position(|o| o.ticket == ticket && o.state == OrderState::Open)?;
        Some(self.settle(index, price, time))
    }

    fn settle(&mut self, index: usize, price: f64, time: i64) -> f64 {
        let order = &mut self.orders[index];
        order.state = OrderState::Closed;
        order.close_price = price;
        order.close_time = time;
        order.profit = order.profit_at(price);
        self.events.push(TradeEvent {
            ticket: order.ticket,
            change: TradeChange::Closed,
        });
        order.profit
    }

    /// Change order prices: `price > 0` reprices a pending order (open
    /// orders keep their fill price), `sl`/`tp` set the stop when positive
    /// and clear it at zero.
    pub fn modify(&mut self, ticket: i64, price: f64, sl: f64, tp: f64) -> bool {
        let Some(order) = self
            .orders
            .iter_mut()
            .find(|o| o.ticket == ticket && o.state != OrderState::Closed)
        else {
            return false;
        };
        if price > 0.0 && order.state == OrderState::Pending {
            order.open_price = price;
        }
        order.sl = sl.max(0.0);
        order.tp = tp.max(0.0);
        self.events.push(TradeEvent {
            ticket,
            change: TradeChange::Modified,
        });
        true
    }

    /// Cancel a pending order. Open and closed orders are not deletable.
    pub fn delete(&mut self, ticket: i64, time: i64) -> bool {
        let Some(order) = self
            .orders
            .iter_mut()
            .find(|o| o.ticket == ticket && o.state == OrderState::Pending)
        else {
            return false;
        };
        order.state = OrderState::Closed;
        order.close_time = time;
        order.close_price = order.open_price;
        self.events.push(TradeEvent {
            ticket,
            change: TradeChange::Deleted,
        });
        true
    }

    pub fn find(&self, ticket: i64) -> Option<&Order> {
        self.orders.iter().find(|o| o.ticket == ticket)
    }

    /// Open and pending orders, in placement order.
    pub fn active(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.state != OrderState::Closed)
            .collect()
    }

    /// Closed orders, in placement order.
    pub fn history(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.state == OrderState::Closed)
            .collect()
    }

    pub fn all(&self) -> &[Order] {
        &self.orders
    }

    pub fn closed_profit(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.state == OrderState::Closed)
            .map(|o| o.profit)
            .sum()
    }

    /// Floating profit of open orders: buys valued at bid, sells at ask.
    pub fn open_profit(&self, bid: f64, ask: f64) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.state == OrderState::Open)
            .map(|o| {
                if o.kind.is_buy() {
                    o.profit_at(bid)
                } else {
                    o.profit_at(ask)
                }
            })
            .sum()
    }

    /// Margin held for open orders: volume x open price, 1:1 leverage.
    pub fn held_margin(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.state == OrderState::Open)
            .map(|o| o.volume * o.open_price)
            .sum()
    }

    pub fn take_events(&mut self) -> Vec<TradeEvent> {
        std::mem::take(&mut self.events)
    }
}
