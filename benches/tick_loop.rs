//! Tick loop benchmarks: flush, reconcile, and mark-to-market against a mock service.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tickbroker::mock::MockService;
use tickbroker::{Broker, NullObserver, Order, OrderId, OrderResult, Quote, QuoteSnapshot, Symbol, TickResponse};

fn symbols(n: usize) -> Vec<Symbol> {
    (0..n).map(|i| Symbol::new(format!("S{i:03}"))).collect()
}

fn snapshot(symbols: &[Symbol], ts: i64) -> QuoteSnapshot {
    symbols
        .iter()
        .map(|s| (s.clone(), Quote::new(100.0, 100.5, ts)))
        .collect()
}

/// A session of `n_ticks` steps where every step fills one buy per symbol.
fn scripted_service(symbols: &[Symbol], n_ticks: usize) -> MockService {
    let mut builder = MockService::builder();
    for s in symbols {
        builder = builder.with_quote(s.as_str(), 100.0, 100.5);
    }
    let mut service = builder.build();

    let mut next_id = 0;
    for t in 0..n_ticks {
        let ts = t as i64 + 1;
        let mut step = TickResponse::step(snapshot(symbols, ts));
        for s in symbols {
            next_id += 1;
            step = step.with_executed(OrderResult::buy(s.clone(), 100.0, 1.0, ts, OrderId(next_id)));
        }
        service.push_tick(step);
    }
    service
}

/// Benchmark: full session, one order and one fill per symbol per tick.
fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("broker/session");

    for n_symbols in [1usize, 10, 50] {
        let syms = symbols(n_symbols);
        group.bench_with_input(BenchmarkId::new("250_ticks", n_symbols), &syms, |b, syms| {
            b.iter_batched(
                || scripted_service(syms, 250),
                |service| {
                    let mut broker = Broker::builder()
                        .initial_cash(1e9)
                        .dataset("bench")
                        .observer(NullObserver)
                        .connect(service)
                        .unwrap();
                    while !broker.is_finished() {
                        for s in syms {
                            broker
                                .insert_order(Order::market_buy(s.clone(), 1.0).unwrap())
                                .unwrap();
                        }
                        black_box(broker.tick().unwrap());
                    }
                    black_box(broker.cash())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark: flush-time validation of sells against a populated ledger.
fn bench_flush(c: &mut Criterion) {
    let syms = symbols(100);
    let mut ledger = tickbroker::Ledger::new(1e9);
    for (i, s) in syms.iter().enumerate() {
        ledger
            .apply_fill(&OrderResult::buy(s.clone(), 100.0, 10.0, 0, OrderId(i as u64)))
            .unwrap();
    }
    let orders: Vec<Order> = syms
        .iter()
        .map(|s| Order::market_sell(s.clone(), 5.0).unwrap())
        .collect();

    c.bench_function("lifecycle/flush_100_sells", |b| {
        b.iter(|| {
            let mut tracker = tickbroker::LifecycleTracker::new();
            for order in &orders {
                tracker.enqueue(order.clone());
            }
            black_box(tracker.flush(&ledger))
        });
    });
}

criterion_group!(benches, bench_session, bench_flush);
criterion_main!(benches);
