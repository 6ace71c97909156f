//! Pricing properties that must hold for every curve over its tradable range

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sor_amm::{PairPricing, PairView, Pool, PoolToken, PoolType, SwapType};

fn weighted_pair(balance_in: u32, balance_out: u32, weight_in: u32, weight_out: u32) -> PairView {
    Pool::new(
        "0xweighted",
        PoolType::Weighted,
        dec!(0.003),
        vec![
            PoolToken::new("0xin", Decimal::from(balance_in), 18).with_weight(Decimal::from(weight_in)),
            PoolToken::new("0xout", Decimal::from(balance_out), 18).with_weight(Decimal::from(weight_out)),
        ],
    )
    .pair_view(&"0xin".into(), &"0xout".into())
    .unwrap()
}

fn stable_pair(balance_in: u32, balance_out: u32, amp: u32) -> PairView {
    Pool::new(
        "0xstable",
        PoolType::Stable,
        dec!(0.0004),
        vec![
            PoolToken::new("0xin", Decimal::from(balance_in), 18),
            PoolToken::new("0xout", Decimal::from(balance_out), 18),
        ],
    )
    .with_amp(Decimal::from(amp))
    .pair_view(&"0xin".into(), &"0xout".into())
    .unwrap()
}

/// Amount at `percent` of the pair's exact-in limit
fn trade_size(pair: &PairView, percent: u32) -> Decimal {
    pair.limit_amount(SwapType::ExactIn) * Decimal::from(percent) / dec!(100)
}

fn assert_curve_properties(pair: &PairView, amount: Decimal) -> Result<(), TestCaseError> {
    let out = pair.exact_in(amount).unwrap();
    prop_assert!(out > Decimal::ZERO);
    prop_assert!(out < pair.balance_out());

    // exact out inverts exact in
    let back = pair.exact_out(out).unwrap();
    prop_assert!((back - amount).abs() <= amount * dec!(0.0000001), "{} vs {}", back, amount);

    // price only gets worse with size, in both directions
    let opening = pair.spot_price().unwrap();
    let after_in = pair.spot_price_after_swap(SwapType::ExactIn, amount).unwrap();
    let after_out = pair.spot_price_after_swap(SwapType::ExactOut, out).unwrap();
    prop_assert!(after_in > opening);
    prop_assert!((after_in - after_out).abs() <= after_in * dec!(0.000001));

    // the average price paid sits between the opening and closing marginal prices
    let average = amount / out;
    prop_assert!(average >= opening);
    prop_assert!(average <= after_in);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_weighted_curve(
        balance_in in 10u32..100_000,
        balance_out in 10u32..100_000,
        weight_in in 1u32..10,
        weight_out in 1u32..10,
        percent in 1u32..100,
    ) {
        let pair = weighted_pair(balance_in, balance_out, weight_in, weight_out);
        assert_curve_properties(&pair, trade_size(&pair, percent))?;
    }

    #[test]
    fn prop_stable_curve(
        balance_in in 1_000u32..100_000,
        skew in 50u32..200,
        amp in 10u32..2_000,
        percent in 1u32..50,
    ) {
        let balance_out = balance_in / 100 * skew;
        let pair = stable_pair(balance_in, balance_out, amp);
        assert_curve_properties(&pair, trade_size(&pair, percent))?;
    }
}

#[test]
fn test_limits_scale_with_balances() {
    let pair = weighted_pair(1000, 4000, 1, 1);
    assert_eq!(pair.limit_amount(SwapType::ExactIn), dec!(300));
    assert_eq!(pair.limit_amount(SwapType::ExactOut), dec!(1200));

    let pair = stable_pair(1000, 2000, 100);
    assert_eq!(pair.limit_amount(SwapType::ExactOut), dec!(1980));
}
