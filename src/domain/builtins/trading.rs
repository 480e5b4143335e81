//! Order tickets against the in-memory broker.
//!
//! Failures follow the dialect's conventions: `-1` or `false` plus a code
//! in the last-error slot, never a runtime error. Market orders ignore the
//! requested price and fill at the current quote side; the slippage,
//! expiration and arrow arguments are accepted and ignored.

use crate::domain::broker::{Order, OrderKind, OrderRequest, OrderState};
use crate::domain::value::Value;

use super::{int, int_or, num, put, symbol_arg, text, BuiltinMap, ExecutionEnv};

const ERR_INVALID_TRADE_PARAMETERS: i64 = 3;
const ERR_INVALID_TRADE_VOLUME: i64 = 131;
const ERR_NOT_ENOUGH_MONEY: i64 = 134;
const ERR_INVALID_TICKET: i64 = 4108;

/// Register a getter over the selected order; `missing` is returned when
/// nothing is selected or the ticket has vanished.
fn order_getter(
    map: &mut BuiltinMap,
    name: &str,
    missing: Value,
    pick: fn(&Order, &ExecutionEnv) -> Value,
) {
    put(map, name, move |env, _args| {
        Ok(
            match env.selected_ticket.and_then(|t| env.broker.find(t)) {
                Some(order) => pick(order, env),
                None => missing.clone(),
            },
        )
    });
}

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "OrderSend", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let volume = num(args, 2);
        if volume <= 0.0 {
            env.last_error = ERR_INVALID_TRADE_VOLUME;
            return Ok(Value::int(-1));
        }
        let Some(kind) = OrderKind::from_cmd(int(args, 1)) else {
            env.last_error = ERR_INVALID_TRADE_PARAMETERS;
            return Ok(Value::int(-1));
        };
        let price = if kind.is_pending() {
            num(args, 3)
        } else {
            env.fill_price(kind.is_buy())
        };
        let metrics = env.account.metrics(&env.broker, env.bid, env.ask);
        if volume * price > metrics.free_margin {
            env.last_error = ERR_NOT_ENOUGH_MONEY;
            return Ok(Value::int(-1));
        }
        let ticket = env.broker.place(OrderRequest {
            kind,
            symbol,
            volume,
            price,
            sl: num(args, 5),
            tp: num(args, 6),
            time: env.terminal.now(),
            comment: text(args, 7),
            magic: int_or(args, 8, 0),
        });
        Ok(Value::int(ticket))
    });
    put(map, "OrderClose", |env, args| {
        let ticket = int(args, 0);
        let Some(order) = env.broker.find(ticket) else {
            env.last_error = ERR_INVALID_TICKET;
            return Ok(Value::bool_val(false));
        };
        // a buy closes by selling at bid, a sell by buying at ask
        let price = if order.kind.is_buy() { env.bid } else { env.ask };
        let now = env.terminal.now();
        match env.broker.close(ticket, price, now) {
            Some(profit) => {
                env.account.apply_profit(profit);
                Ok(Value::bool_val(true))
            }
            None => {
                env.last_error = ERR_INVALID_TICKET;
                Ok(Value::bool_val(false))
            }
        }
    });
    put(map, "OrderModify", |env, args| {
        let ok = env
            .broker
            .modify(int(args, 0), num(args, 1), num(args, 2), num(args, 3));
        if !ok {
            env.last_error = ERR_INVALID_TICKET;
        }
        Ok(Value::bool_val(ok))
    });
    put(map, "OrderDelete", |env, args| {
        let now = env.terminal.now();
        let ok = env.broker.delete(int(args, 0), now);
        if !ok {
            env.last_error = ERR_INVALID_TICKET;
        }
        Ok(Value::bool_val(ok))
    });
    put(map, "OrderSelect", |env, args| {
        let found = if int(args, 1) == 1 {
            // SELECT_BY_TICKET
            env.broker.find(int(args, 0)).map(|o| o.ticket)
        } else {
            let pool = int_or(args, 2, 0);
            let book = if pool == 1 {
                env.broker.history()
            } else {
                env.broker.active()
            };
            usize::try_from(int(args, 0))
                .ok()
                .and_then(|i| book.get(i).map(|o| o.ticket))
        };
        match found {
            Some(ticket) => {
                env.selected_ticket = Some(ticket);
                Ok(Value::bool_val(true))
            }
            None => Ok(Value::bool_val(false)),
        }
    });
    order_getter(map, "OrderTicket", Value::int(-1), |o, _| Value::int(o.ticket));
    order_getter(map, "OrderType", Value::int(0), |o, _| Value::int(o.kind.cmd()));
    order_getter(map, "OrderLots", Value::Double(0.0), |o, _| {
        Value::Double(o.volume)
    });
    order_getter(map, "OrderSymbol", Value::Str(String::new()), |o, _| {
        Value::Str(o.symbol.clone())
    });
    order_getter(map, "OrderOpenPrice", Value::Double(0.0), |o, _| {
        Value::Double(o.open_price)
    });
    order_getter(map, "OrderClosePrice", Value::Double(0.0), |o, _| {
        Value::Double(o.close_price)
    });
    order_getter(map, "OrderStopLoss", Value::Double(0.0), |o, _| {
        Value::Double(o.sl)
    });
    order_getter(map, "OrderTakeProfit", Value::Double(0.0), |o, _| {
        Value::Double(o.tp)
    });
    order_getter(map, "OrderOpenTime", Value::datetime(0), |o, _| {
        Value::datetime(o.open_time)
    });
    order_getter(map, "OrderCloseTime", Value::datetime(0), |o, _| {
        Value::datetime(o.close_time)
    });
    order_getter(map, "OrderProfit", Value::Double(0.0), |o, env| {
        Value::Double(match o.state {
            OrderState::Closed => o.profit,
            OrderState::Open => o.profit_at(if o.kind.is_buy() { env.bid } else { env.ask }),
            OrderState::Pending => 0.0,
        })
    });
    put(map, "OrdersTotal", |env, _args| {
        Ok(Value::int(env.broker.active().len() as i64))
    });
    put(map, "OrdersHistoryTotal", |env, _args| {
        Ok(Value::int(env.broker.history().len() as i64))
    });
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call, test_env};
    use super::super::{BuiltinRegistry, ExecutionEnv};
    use crate::domain::broker::OrderState;
    use crate::domain::value::Value;
    use approx::assert_relative_eq;

    fn quoted_env() -> ExecutionEnv {
        let mut env = test_env();
        env.bid = 1.1000;
        env.ask = 1.1002;
        env
    }

    fn send(env: &mut ExecutionEnv, registry: &BuiltinRegistry, cmd: i64, volume: f64, price: f64) -> i64 {
        call(
            env,
            registry,
            "OrderSend",
            &[
                Value::Str(String::new()),
                Value::int(cmd),
                Value::Double(volume),
                Value::Double(price),
                Value::int(3),
                Value::Double(0.0),
                Value::Double(0.0),
            ],
        )
        .as_i64()
    }

    #[test]
    fn market_orders_fill_at_the_quote_side() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        let buy = send(&mut env, &registry, 0, 1.0, 999.0);
        let sell = send(&mut env, &registry, 1, 1.0, 999.0);
        assert_eq!(buy, 1);
        assert_eq!(sell, 2);
        assert_relative_eq!(env.broker.find(buy).unwrap().open_price, 1.1002);
        assert_relative_eq!(env.broker.find(sell).unwrap().open_price, 1.1000);
        assert_eq!(env.last_error, 0);
    }

    #[test]
    fn pending_orders_keep_the_requested_price() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        let ticket = send(&mut env, &registry, 2, 1.0, 1.0500);
        let order = env.broker.find(ticket).unwrap();
        assert_eq!(order.state, OrderState::Pending);
        assert_relative_eq!(order.open_price, 1.05);
    }

    #[test]
    fn send_rejections_set_the_error_slot() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        assert_eq!(send(&mut env, &registry, 0, 0.0, 0.0), -1);
        assert_eq!(env.last_error, 131);
        assert_eq!(send(&mut env, &registry, 9, 1.0, 0.0), -1);
        assert_eq!(env.last_error, 3);
        // 20000 lots x 1.1002 far exceeds the 10k deposit
        assert_eq!(send(&mut env, &registry, 0, 20_000.0, 0.0), -1);
        assert_eq!(env.last_error, 134);
        assert!(env.broker.active().is_empty());
    }

    #[test]
    fn close_fills_a_buy_at_bid_and_moves_the_balance() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        let ticket = send(&mut env, &registry, 0, 2.0, 0.0);
        env.bid = 1.1202;
        env.ask = 1.1204;
        let ok = call(
            &mut env,
            &registry,
            "OrderClose",
            &[Value::int(ticket), Value::Double(2.0), Value::Double(0.0), Value::int(3)],
        );
        assert_eq!(ok, Value::bool_val(true));
        let order = env.broker.find(ticket).unwrap();
        assert_eq!(order.state, OrderState::Closed);
        assert_relative_eq!(order.close_price, 1.1202);
        // (1.1202 - 1.1002) * 2
        assert_relative_eq!(env.account.balance, 10_000.04);
    }

    #[test]
    fn close_of_an_unknown_ticket_fails_with_a_code() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        let ok = call(
            &mut env,
            &registry,
            "OrderClose",
            &[Value::int(42), Value::Double(1.0), Value::Double(0.0), Value::int(3)],
        );
        assert_eq!(ok, Value::bool_val(false));
        assert_eq!(env.last_error, 4108);
    }

    #[test]
    fn modify_and_delete_report_failures() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        let pending = send(&mut env, &registry, 2, 1.0, 1.05);
        let ok = call(
            &mut env,
            &registry,
            "OrderModify",
            &[
                Value::int(pending),
                Value::Double(1.04),
                Value::Double(1.0),
                Value::Double(1.2),
                Value::datetime(0),
            ],
        );
        assert_eq!(ok, Value::bool_val(true));
        assert_relative_eq!(env.broker.find(pending).unwrap().open_price, 1.04);
        assert_eq!(
            call(&mut env, &registry, "OrderDelete", &[Value::int(pending)]),
            Value::bool_val(true)
        );
        assert_eq!(
            call(&mut env, &registry, "OrderDelete", &[Value::int(pending)]),
            Value::bool_val(false)
        );
        assert_eq!(env.last_error, 4108);
    }

    #[test]
    fn select_walks_both_pools() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        let first = send(&mut env, &registry, 0, 1.0, 0.0);
        let second = send(&mut env, &registry, 0, 1.0, 0.0);
        call(
            &mut env,
            &registry,
            "OrderClose",
            &[Value::int(first), Value::Double(1.0), Value::Double(0.0), Value::int(3)],
        );
        assert_eq!(call(&mut env, &registry, "OrdersTotal", &[]), Value::int(1));
        assert_eq!(call(&mut env, &registry, "OrdersHistoryTotal", &[]), Value::int(1));

        // active pool position 0 is the surviving order
        assert_eq!(
            call(&mut env, &registry, "OrderSelect", &[Value::int(0), Value::int(0)]),
            Value::bool_val(true)
        );
        assert_eq!(call(&mut env, &registry, "OrderTicket", &[]), Value::int(second));

        // history pool holds the closed one
        assert_eq!(
            call(
                &mut env,
                &registry,
                "OrderSelect",
                &[Value::int(0), Value::int(0), Value::int(1)]
            ),
            Value::bool_val(true)
        );
        assert_eq!(call(&mut env, &registry, "OrderTicket", &[]), Value::int(first));

        // by-ticket selection and a miss
        assert_eq!(
            call(&mut env, &registry, "OrderSelect", &[Value::int(second), Value::int(1)]),
            Value::bool_val(true)
        );
        assert_eq!(
            call(&mut env, &registry, "OrderSelect", &[Value::int(9), Value::int(0)]),
            Value::bool_val(false)
        );
        // a failed select leaves the previous selection in place
        assert_eq!(call(&mut env, &registry, "OrderTicket", &[]), Value::int(second));
    }

    #[test]
    fn getters_expose_the_selected_order() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        env.terminal.set_clock(500);
        call(
            &mut env,
            &registry,
            "OrderSend",
            &[
                Value::Str(String::new()),
                Value::int(0),
                Value::Double(2.0),
                Value::Double(0.0),
                Value::int(3),
                Value::Double(1.0900),
                Value::Double(1.1500),
                Value::Str("breakout".into()),
                Value::int(77),
            ],
        );
        call(&mut env, &registry, "OrderSelect", &[Value::int(0), Value::int(0)]);
        assert_eq!(call(&mut env, &registry, "OrderType", &[]), Value::int(0));
        assert_eq!(call(&mut env, &registry, "OrderLots", &[]), Value::Double(2.0));
        assert_eq!(
            call(&mut env, &registry, "OrderSymbol", &[]),
            Value::Str("EURUSD".into())
        );
        assert_eq!(
            call(&mut env, &registry, "OrderOpenPrice", &[]),
            Value::Double(1.1002)
        );
        assert_eq!(
            call(&mut env, &registry, "OrderStopLoss", &[]),
            Value::Double(1.09)
        );
        assert_eq!(
            call(&mut env, &registry, "OrderTakeProfit", &[]),
            Value::Double(1.15)
        );
        assert_eq!(
            call(&mut env, &registry, "OrderOpenTime", &[]),
            Value::datetime(500)
        );
        assert_eq!(
            call(&mut env, &registry, "OrderCloseTime", &[]),
            Value::datetime(0)
        );
        // floating profit of the open buy values at bid
        env.bid = 1.1102;
        let profit = call(&mut env, &registry, "OrderProfit", &[]).as_f64();
        assert_relative_eq!(profit, 0.02, max_relative = 1e-9);
    }

    #[test]
    fn getters_without_a_selection_return_sentinels() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = quoted_env();
        assert_eq!(call(&mut env, &registry, "OrderTicket", &[]), Value::int(-1));
        assert_eq!(call(&mut env, &registry, "OrderLots", &[]), Value::Double(0.0));
        assert_eq!(
            call(&mut env, &registry, "OrderSymbol", &[]),
            Value::Str(String::new())
        );
    }
}
