//! Quote, symbol-selection and account builtins of the backtest host.
//!
//! The chart symbol's quote lives on the environment and is refreshed by
//! the runner each bar; other symbols fall back to their tick history at
//! the simulated clock.

use crate::domain::value::Value;

use super::{int, put, symbol_arg, text, BuiltinMap};

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "MarketInfo", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let (bid, ask) = if symbol == env.symbol {
            (env.bid, env.ask)
        } else {
            let now = env.terminal.now();
            match env.market.tick_at_or_before(&symbol, now) {
                Some(tick) => (tick.bid, tick.ask),
                None => (0.0, 0.0),
            }
        };
        Ok(Value::Double(match int(args, 1) {
            9 => bid,
            10 => ask,
            11 => env.point,
            12 => env.digits as f64,
            13 => ((ask - bid) / env.point).round(),
            _ => 0.0,
        }))
    });
    put(map, "SymbolSelect", |env, args| {
        let symbol = text(args, 0);
        let on = args.get(1).map_or(false, Value::is_truthy);
        Ok(Value::bool_val(env.market.select(&symbol, on)))
    });
    put(map, "SymbolsTotal", |env, args| {
        let selected_only = args.first().map_or(false, Value::is_truthy);
        Ok(Value::int(env.market.symbols_total(selected_only) as i64))
    });
    put(map, "SymbolName", |env, args| {
        let selected_only = args.get(1).map_or(false, Value::is_truthy);
        let name = env
            .market
            .symbol_name(int(args, 0).max(0) as usize, selected_only)
            .unwrap_or("");
        Ok(Value::Str(name.to_string()))
    });
    // quotes advance with the bar cursor, so there is nothing to refresh
    put(map, "RefreshRates", |_env, _args| Ok(Value::bool_val(true)));

    put(map, "AccountBalance", |env, _args| {
        Ok(Value::Double(env.account.balance))
    });
    put(map, "AccountEquity", |env, _args| {
        let m = env.account.metrics(&env.broker, env.bid, env.ask);
        Ok(Value::Double(m.equity))
    });
    put(map, "AccountProfit", |env, _args| {
        let m = env.account.metrics(&env.broker, env.bid, env.ask);
        Ok(Value::Double(m.open_profit))
    });
    put(map, "AccountMargin", |env, _args| {
        let m = env.account.metrics(&env.broker, env.bid, env.ask);
        Ok(Value::Double(m.margin))
    });
    put(map, "AccountFreeMargin", |env, _args| {
        let m = env.account.metrics(&env.broker, env.bid, env.ask);
        Ok(Value::Double(m.free_margin))
    });
    put(map, "AccountCurrency", |env, _args| {
        Ok(Value::Str(env.account.currency.clone()))
    });
    put(map, "AccountName", |env, _args| {
        Ok(Value::Str(env.account.name.clone()))
    });
    put(map, "AccountNumber", |env, _args| {
        Ok(Value::int(env.account.number))
    });
    put(map, "AccountLeverage", |env, _args| {
        Ok(Value::int(env.account.leverage))
    });
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call, test_env};
    use super::super::BuiltinRegistry;
    use crate::domain::broker::{OrderKind, OrderRequest};
    use crate::domain::market::Tick;
    use crate::domain::value::Value;
    use approx::assert_relative_eq;

    #[test]
    fn market_info_reads_the_chart_quote() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = test_env();
        env.bid = 1.23450;
        env.ask = 1.23470;
        let own = Value::Str("EURUSD".into());
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[own.clone(), Value::int(9)]),
            Value::Double(1.23450)
        );
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[own.clone(), Value::int(10)]),
            Value::Double(1.23470)
        );
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[own.clone(), Value::int(11)]),
            Value::Double(1e-5)
        );
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[own.clone(), Value::int(12)]),
            Value::Double(5.0)
        );
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[own.clone(), Value::int(13)]),
            Value::Double(20.0)
        );
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[own, Value::int(99)]),
            Value::Double(0.0)
        );
    }

    #[test]
    fn empty_symbol_means_the_chart_symbol() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = test_env();
        env.bid = 2.0;
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[Value::Str(String::new()), Value::int(9)]),
            Value::Double(2.0)
        );
    }

    #[test]
    fn other_symbols_read_their_tick_history() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = test_env();
        env.market.set_ticks(
            "GBPUSD",
            vec![
                Tick { time: 10, bid: 1.30, ask: 1.31 },
                Tick { time: 20, bid: 1.40, ask: 1.41 },
            ],
        );
        env.terminal.set_clock(15);
        let sym = Value::Str("GBPUSD".into());
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[sym.clone(), Value::int(9)]),
            Value::Double(1.30)
        );
        env.terminal.set_clock(5);
        assert_eq!(
            call(&mut env, &registry, "MarketInfo", &[sym, Value::int(10)]),
            Value::Double(0.0)
        );
    }

    #[test]
    fn selection_is_scriptable() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = test_env();
        // the chart symbol is selected at construction
        assert_eq!(
            call(&mut env, &registry, "SymbolsTotal", &[Value::bool_val(true)]),
            Value::int(1)
        );
        call(
            &mut env,
            &registry,
            "SymbolSelect",
            &[Value::Str("GBPUSD".into()), Value::bool_val(true)],
        );
        assert_eq!(
            call(&mut env, &registry, "SymbolsTotal", &[Value::bool_val(true)]),
            Value::int(2)
        );
        assert_eq!(
            call(
                &mut env,
                &registry,
                "SymbolName",
                &[Value::int(1), Value::bool_val(true)]
            ),
            Value::Str("GBPUSD".into())
        );
        call(
            &mut env,
            &registry,
            "SymbolSelect",
            &[Value::Str("GBPUSD".into()), Value::bool_val(false)],
        );
        assert_eq!(
            call(&mut env, &registry, "SymbolsTotal", &[Value::bool_val(true)]),
            Value::int(1)
        );
        assert_eq!(
            call(&mut env, &registry, "SymbolName", &[Value::int(9), Value::bool_val(false)]),
            Value::Str(String::new())
        );
    }

    #[test]
    fn account_metrics_derive_from_the_book() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = test_env();
        env.bid = 1.15;
        env.ask = 1.16;
        env.broker.place(OrderRequest {
            kind: OrderKind::Buy,
            symbol: "EURUSD".into(),
            volume: 2.0,
            price: 1.10,
            sl: 0.0,
            tp: 0.0,
            time: 0,
            comment: String::new(),
            magic: 0,
        });
        let balance = call(&mut env, &registry, "AccountBalance", &[]).as_f64();
        let equity = call(&mut env, &registry, "AccountEquity", &[]).as_f64();
        let profit = call(&mut env, &registry, "AccountProfit", &[]).as_f64();
        let margin = call(&mut env, &registry, "AccountMargin", &[]).as_f64();
        let free = call(&mut env, &registry, "AccountFreeMargin", &[]).as_f64();
        assert_relative_eq!(balance, 10_000.0);
        // floating (1.15 - 1.10) * 2
        assert_relative_eq!(profit, 0.10);
        assert_relative_eq!(equity, 10_000.10);
        assert_relative_eq!(margin, 2.20);
        assert_relative_eq!(free, equity - margin);
    }

    #[test]
    fn account_identity_fields() {
        let registry = BuiltinRegistry::for_backtest();
        let mut env = test_env();
        assert_eq!(
            call(&mut env, &registry, "AccountCurrency", &[]),
            Value::Str("USD".into())
        );
        assert_eq!(
            call(&mut env, &registry, "AccountName", &[]),
            Value::Str("backtest".into())
        );
        assert_eq!(call(&mut env, &registry, "AccountNumber", &[]), Value::int(1));
        assert_eq!(call(&mut env, &registry, "AccountLeverage", &[]), Value::int(1));
        assert_eq!(
            call(&mut env, &registry, "RefreshRates", &[]),
            Value::bool_val(true)
        );
    }
}
