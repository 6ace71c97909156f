//! Routing benchmarks
//!
//! Measures full `route` calls over a mixed pool set with direct and
//! two-hop candidates, in both swap directions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sor_amm::{Pool, PoolToken, PoolType, SwapType, TokenAddress};
use sor_router::{NativePriceCostCalculator, Router, SwapOptions};
use std::sync::Arc;

fn weighted(id: &str, x: (&str, Decimal), y: (&str, Decimal)) -> Pool {
    Pool::new(
        id,
        PoolType::Weighted,
        dec!(0.003),
        vec![
            PoolToken::new(x.0, x.1, 18).with_weight(dec!(0.5)),
            PoolToken::new(y.0, y.1, 18).with_weight(dec!(0.5)),
        ],
    )
}

/// Direct a/b pools plus a/hub and hub/b pools for two-hop paths
fn pool_set(pairs: usize) -> Vec<Pool> {
    let mut pools = Vec::new();
    for i in 0..pairs {
        let depth = Decimal::from(1000 + 150 * i as u64);
        pools.push(weighted(&format!("ab{i}"), ("a", depth), ("b", depth * dec!(1.01))));
        let hub = format!("hub{i}");
        pools.push(weighted(&format!("ah{i}"), ("a", depth), (hub.as_str(), depth)));
        pools.push(weighted(&format!("hb{i}"), (hub.as_str(), depth), ("b", depth)));
    }
    pools.push(
        Pool::new(
            "stable",
            PoolType::Stable,
            dec!(0.0004),
            vec![PoolToken::new("a", dec!(5000), 18), PoolToken::new("b", dec!(5000), 18)],
        )
        .with_amp(dec!(200)),
    );
    pools
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    let options = SwapOptions::default();
    let token_in: TokenAddress = "a".into();
    let token_out: TokenAddress = "b".into();

    for pairs in [2usize, 8] {
        let router = Router::new(pool_set(pairs), Arc::new(NativePriceCostCalculator::new()));

        group.bench_with_input(BenchmarkId::new("exact_in", pairs), &router, |b, router| {
            b.iter(|| {
                router
                    .route(
                        black_box(&token_in),
                        black_box(&token_out),
                        SwapType::ExactIn,
                        black_box(dec!(250)),
                        &options,
                    )
                    .ok()
            })
        });

        group.bench_with_input(BenchmarkId::new("exact_out", pairs), &router, |b, router| {
            b.iter(|| {
                router
                    .route(
                        black_box(&token_in),
                        black_box(&token_out),
                        SwapType::ExactOut,
                        black_box(dec!(250)),
                        &options,
                    )
                    .ok()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_route);
criterion_main!(benches);
