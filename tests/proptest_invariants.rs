//! Property-based tests for ledger and broker invariants.
//!
//! These tests use proptest to check that accounting identities hold
//! across randomly generated fill sequences.

use proptest::prelude::*;
use tickbroker::mock::MockService;
use tickbroker::{
    Broker, BrokerError, Ledger, NullObserver, Order, OrderId, OrderResult,
    OrderResultKind, Quote, QuoteSnapshot, Symbol, TickResponse, validate_for_flush,
};

const SYMBOLS: [&str; 3] = ["AAA", "BBB", "CCC"];

fn symbol_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(SYMBOLS[0]), Just(SYMBOLS[1]), Just(SYMBOLS[2])]
}

/// Whole-number quantities and prices keep the float sums exact.
fn fill_strategy() -> impl Strategy<Value = (bool, &'static str, u32, u32)> {
    (any::<bool>(), symbol_strategy(), 1u32..=50, 1u32..=20)
}

fn quotes(bid: f64) -> QuoteSnapshot {
    SYMBOLS
        .iter()
        .map(|s| (Symbol::new(*s), Quote::new(bid, bid + 1.0, 0)))
        .collect()
}

fn order_strategy() -> impl Strategy<Value = Order> {
    let qty = 1u32..=1000;
    let px = 1u32..=500;
    prop_oneof![
        (symbol_strategy(), qty.clone()).prop_map(|(s, q)| Order::market_buy(s, q as f64).unwrap()),
        (symbol_strategy(), qty.clone()).prop_map(|(s, q)| Order::market_sell(s, q as f64).unwrap()),
        (symbol_strategy(), qty.clone(), px.clone())
            .prop_map(|(s, q, p)| Order::limit_buy(s, q as f64, p as f64).unwrap()),
        (symbol_strategy(), qty.clone(), px)
            .prop_map(|(s, q, p)| Order::limit_sell(s, q as f64, p as f64).unwrap()),
        (symbol_strategy(), 0u64..100).prop_map(|(s, id)| Order::cancel(s, OrderId(id)).unwrap()),
        (symbol_strategy(), 0u64..100, qty)
            .prop_map(|(s, id, q)| Order::modify(s, OrderId(id), q as f64).unwrap()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // LEDGER INVARIANTS
    // ========================================================================

    /// Cash never goes negative, and a refused fill leaves the ledger untouched.
    #[test]
    fn cash_never_negative(fills in prop::collection::vec(fill_strategy(), 1..60)) {
        let mut ledger = Ledger::new(500.0);
        for (i, (is_buy, sym, qty, px)) in fills.into_iter().enumerate() {
            let value = (qty * px) as f64;
            let result = if is_buy {
                OrderResult::buy(sym, value, qty as f64, 0, OrderId(i as u64))
            } else {
                OrderResult::sell(sym, value, qty as f64, 0, OrderId(i as u64))
            };
            let before = ledger.clone();
            match ledger.apply_fill(&result) {
                Ok(cash) => prop_assert_eq!(cash, ledger.cash()),
                Err(BrokerError::Insolvency { .. }) => prop_assert_eq!(&ledger, &before),
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(ledger.cash() >= 0.0);
        }
    }

    /// Value is cash plus every position marked at its bid.
    #[test]
    fn value_is_cash_plus_marked_positions(
        fills in prop::collection::vec(fill_strategy(), 1..40),
        bid in 1u32..=30,
    ) {
        let mut ledger = Ledger::new(10_000.0);
        for (i, (is_buy, sym, qty, px)) in fills.into_iter().enumerate() {
            let value = (qty * px) as f64;
            let result = if is_buy {
                OrderResult::buy(sym, value, qty as f64, 0, OrderId(i as u64))
            } else {
                OrderResult::sell(sym, value, qty as f64, 0, OrderId(i as u64))
            };
            let _ = ledger.apply_fill(&result);
        }

        let bid = bid as f64;
        let expected = ledger.cash() + ledger.holdings().map(|(_, q)| q * bid).sum::<f64>();
        prop_assert_eq!(ledger.current_value(&quotes(bid)).unwrap(), expected);
    }

    /// No held position is ever stored as exactly zero.
    #[test]
    fn flat_positions_are_dropped(fills in prop::collection::vec(fill_strategy(), 1..40)) {
        let mut ledger = Ledger::new(10_000.0);
        for (i, (is_buy, sym, qty, px)) in fills.into_iter().enumerate() {
            let value = (qty * px) as f64;
            let result = if is_buy {
                OrderResult::buy(sym, value, qty as f64, 0, OrderId(i as u64))
            } else {
                OrderResult::sell(sym, value, qty as f64, 0, OrderId(i as u64))
            };
            let _ = ledger.apply_fill(&result);
            prop_assert!(ledger.holdings().all(|(_, q)| q != 0.0));
        }
    }

    /// Buying fractional lots and selling their decimal total leaves the symbol flat.
    #[test]
    fn fractional_lots_close_out(tenths in prop::collection::vec(1u32..=30, 1..40)) {
        let mut ledger = Ledger::new(1_000_000.0);
        for (i, &t) in tenths.iter().enumerate() {
            let qty = t as f64 / 10.0;
            ledger
                .apply_fill(&OrderResult::buy("AAA", qty, qty, 0, OrderId(i as u64)))
                .unwrap();
        }
        let total = tenths.iter().sum::<u32>() as f64 / 10.0;

        let sell = Order::market_sell("AAA", total).unwrap();
        prop_assert!(validate_for_flush(&sell, &ledger).is_ok());
        ledger
            .apply_fill(&OrderResult::sell("AAA", total, total, 1, OrderId(9_999)))
            .unwrap();
        prop_assert_eq!(ledger.open_positions(), 0);
        prop_assert!(ledger.current_value(&QuoteSnapshot::default()).is_ok());
    }

    // ========================================================================
    // FLUSH VALIDATION
    // ========================================================================

    /// Validation is pure: same order and ledger, same verdict.
    #[test]
    fn validation_is_deterministic(order in order_strategy(), held in 0u32..=100) {
        let mut ledger = Ledger::new(1_000_000.0);
        if held > 0 {
            ledger
                .apply_fill(&OrderResult::buy(order.symbol().clone(), 1.0, held as f64, 0, OrderId(0)))
                .unwrap();
        }
        let first = validate_for_flush(&order, &ledger);
        let second = validate_for_flush(&order, &ledger);
        prop_assert_eq!(first, second);

        let expect_ok = !order.kind().is_sell() || (held > 0 && order.quantity() <= held as f64);
        prop_assert_eq!(first.is_ok(), expect_ok);
    }

    // ========================================================================
    // WIRE FORMAT
    // ========================================================================

    /// Every valid order survives a JSON round trip.
    #[test]
    fn order_json_round_trip(order in order_strategy()) {
        let json = order.to_json().unwrap();
        let back = Order::from_json(&json).unwrap();
        prop_assert_eq!(&back, &order);
        prop_assert_eq!(back.price().is_some(), order.kind().is_limit());
        prop_assert_eq!(back.reference().is_some(), order.kind().requires_reference());
    }

    // ========================================================================
    // BROKER INVARIANTS
    // ========================================================================

    /// After any solvent run, each position equals the signed sum of its fills.
    #[test]
    fn trade_log_sums_to_positions(
        steps in prop::collection::vec(prop::collection::vec(fill_strategy(), 0..4), 1..20),
    ) {
        let mut service = MockService::builder()
            .with_quote(SYMBOLS[0], 10.0, 11.0)
            .with_quote(SYMBOLS[1], 10.0, 11.0)
            .with_quote(SYMBOLS[2], 10.0, 11.0)
            .build();
        let mut next_id = 0u64;
        for (t, step) in steps.iter().enumerate() {
            let mut response = TickResponse::step(quotes(10.0)).with_now(t as i64 + 1);
            for &(is_buy, sym, qty, px) in step {
                next_id += 1;
                let value = (qty * px) as f64;
                let result = if is_buy {
                    OrderResult::buy(sym, value, qty as f64, t as i64, OrderId(next_id))
                } else {
                    OrderResult::sell(sym, value, qty as f64, t as i64, OrderId(next_id))
                };
                response = response.with_executed(result);
            }
            service.push_tick(response);
        }

        let mut broker = Broker::builder()
            .initial_cash(1_000_000.0)
            .dataset("prop")
            .observer(NullObserver)
            .connect(service)
            .unwrap();

        let mut ticks = 0;
        while !broker.is_finished() {
            broker.tick().unwrap();
            ticks += 1;
        }
        prop_assert_eq!(ticks, steps.len() + 1);
        prop_assert_eq!(broker.portfolio_values().len(), steps.len());

        for sym in SYMBOLS {
            let symbol = Symbol::new(sym);
            let logged: f64 = broker
                .trade_log()
                .iter()
                .filter(|r| r.symbol == symbol)
                .map(|r| match r.kind {
                    OrderResultKind::Buy => r.quantity,
                    OrderResultKind::Sell => -r.quantity,
                    _ => 0.0,
                })
                .sum();
            prop_assert_eq!(broker.position(&symbol), logged);
        }
        prop_assert!(broker.cash() >= 0.0);
        prop_assert!(broker.pending_orders().is_empty());
    }
}
