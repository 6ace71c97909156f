//! Per-pair projections of a pool and their pricing
//!
//! [`PairView`] is the sum type the optimizer works with: one variant per
//! curve family, dispatched with a `match` so the hot loop never goes
//! through a vtable.

use crate::constant_product_math::{ConstantProductMath, ConstantProductState};
use crate::error::PoolResult;
use crate::pool::{PoolId, PoolType};
use crate::pool_traits::{PairPricing, SwapType};
use crate::stable_math::StableMath;
use crate::weighted_math::WeightedMath;
use crate::Decimal;
use rust_decimal_macros::dec;

/// Largest exact-in trade as a fraction of the input balance (weighted curves)
pub const MAX_IN_RATIO: Decimal = dec!(0.3);

/// Largest exact-out trade as a fraction of the output balance (weighted curves)
pub const MAX_OUT_RATIO: Decimal = dec!(0.3);

/// Largest trade as a fraction of the output balance (stable curves)
pub const STABLE_LIMIT_RATIO: Decimal = dec!(0.99);

/// Finite-difference step relative to the balance, for numeric derivatives
const DERIVATIVE_STEP: Decimal = dec!(0.000001);

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPair {
    pub pool_id: PoolId,
    pub balance_in: Decimal,
    pub balance_out: Decimal,
    pub weight_in: Decimal,
    pub weight_out: Decimal,
    pub swap_fee: Decimal,
}

impl PairPricing for WeightedPair {
    fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    fn balance_in(&self) -> Decimal {
        self.balance_in
    }

    fn balance_out(&self) -> Decimal {
        self.balance_out
    }

    fn exact_in(&self, amount_in: Decimal) -> PoolResult<Decimal> {
        WeightedMath::out_given_in(
            self.balance_in,
            self.weight_in,
            self.balance_out,
            self.weight_out,
            amount_in,
            self.swap_fee,
        )
        .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn exact_out(&self, amount_out: Decimal) -> PoolResult<Decimal> {
        WeightedMath::in_given_out(
            self.balance_in,
            self.weight_in,
            self.balance_out,
            self.weight_out,
            amount_out,
            self.swap_fee,
        )
        .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn limit_amount(&self, swap_type: SwapType) -> Decimal {
        match swap_type {
            SwapType::ExactIn => self.balance_in * MAX_IN_RATIO,
            SwapType::ExactOut => self.balance_out * MAX_OUT_RATIO,
        }
    }

    fn spot_price_after_swap(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal> {
        let (bi, wi, bo, wo, f) = (
            self.balance_in,
            self.weight_in,
            self.balance_out,
            self.weight_out,
            self.swap_fee,
        );
        match swap_type {
            SwapType::ExactIn => WeightedMath::spot_price_after_exact_in(bi, wi, bo, wo, amount, f),
            SwapType::ExactOut => WeightedMath::spot_price_after_exact_out(bi, wi, bo, wo, amount, f),
        }
        .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn derivative_spot_price_after_swap(
        &self,
        swap_type: SwapType,
        amount: Decimal,
    ) -> PoolResult<Decimal> {
        let (bi, wi, bo, wo, f) = (
            self.balance_in,
            self.weight_in,
            self.balance_out,
            self.weight_out,
            self.swap_fee,
        );
        match swap_type {
            SwapType::ExactIn => {
                WeightedMath::derivative_spot_price_after_exact_in(bi, wi, bo, wo, amount, f)
            }
            SwapType::ExactOut => {
                WeightedMath::derivative_spot_price_after_exact_out(bi, wi, bo, wo, amount, f)
            }
        }
        .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn normalized_liquidity(&self) -> Decimal {
        self.balance_out * self.weight_in / (self.weight_in + self.weight_out)
    }
}

/// Stable (or meta stable) pair
///
/// `balances` hold every pool token already multiplied by its price rate;
/// amounts crossing the boundary are scaled by `rate_in` / `rate_out`.
#[derive(Debug, Clone, PartialEq)]
pub struct StablePair {
    pub pool_id: PoolId,
    pub amp: Decimal,
    pub balances: Vec<Decimal>,
    pub index_in: usize,
    pub index_out: usize,
    pub rate_in: Decimal,
    pub rate_out: Decimal,
    pub swap_fee: Decimal,
}

impl StablePair {
    fn scaled_spot_price(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal> {
        let price = match swap_type {
            SwapType::ExactIn => StableMath::spot_price_after_exact_in(
                self.amp,
                &self.balances,
                self.index_in,
                self.index_out,
                amount * self.rate_in,
                self.swap_fee,
            ),
            SwapType::ExactOut => StableMath::spot_price_after_exact_out(
                self.amp,
                &self.balances,
                self.index_in,
                self.index_out,
                amount * self.rate_out,
                self.swap_fee,
            ),
        }
        .map_err(|e| e.for_pool(self.pool_id.as_str()))?;
        Ok(price * self.rate_out / self.rate_in)
    }
}

impl PairPricing for StablePair {
    fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    fn balance_in(&self) -> Decimal {
        self.balances[self.index_in] / self.rate_in
    }

    fn balance_out(&self) -> Decimal {
        self.balances[self.index_out] / self.rate_out
    }

    fn exact_in(&self, amount_in: Decimal) -> PoolResult<Decimal> {
        let scaled_out = StableMath::out_given_in(
            self.amp,
            &self.balances,
            self.index_in,
            self.index_out,
            amount_in * self.rate_in,
            self.swap_fee,
        )
        .map_err(|e| e.for_pool(self.pool_id.as_str()))?;
        Ok(scaled_out / self.rate_out)
    }

    fn exact_out(&self, amount_out: Decimal) -> PoolResult<Decimal> {
        let scaled_in = StableMath::in_given_out(
            self.amp,
            &self.balances,
            self.index_in,
            self.index_out,
            amount_out * self.rate_out,
            self.swap_fee,
        )
        .map_err(|e| e.for_pool(self.pool_id.as_str()))?;
        Ok(scaled_in / self.rate_in)
    }

    fn limit_amount(&self, swap_type: SwapType) -> Decimal {
        let out_limit = self.balance_out() * STABLE_LIMIT_RATIO;
        match swap_type {
            // Near-peg curve: the output cap converts to input units at the rate ratio
            SwapType::ExactIn => out_limit * self.rate_out / self.rate_in,
            SwapType::ExactOut => out_limit,
        }
    }

    fn spot_price_after_swap(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal> {
        self.scaled_spot_price(swap_type, amount)
    }

    /// Central finite difference of the analytic spot price
    fn derivative_spot_price_after_swap(
        &self,
        swap_type: SwapType,
        amount: Decimal,
    ) -> PoolResult<Decimal> {
        let scale = match swap_type {
            SwapType::ExactIn => self.balance_in(),
            SwapType::ExactOut => self.balance_out(),
        };
        let h = scale * DERIVATIVE_STEP;
        if h.is_zero() {
            return Ok(dec!(0));
        }

        if amount >= h {
            let up = self.scaled_spot_price(swap_type, amount + h)?;
            let down = self.scaled_spot_price(swap_type, amount - h)?;
            Ok((up - down) / (dec!(2) * h))
        } else {
            // Second-order one-sided difference near zero
            let p0 = self.scaled_spot_price(swap_type, amount)?;
            let p1 = self.scaled_spot_price(swap_type, amount + h)?;
            let p2 = self.scaled_spot_price(swap_type, amount + dec!(2) * h)?;
            Ok((dec!(4) * p1 - dec!(3) * p0 - p2) / (dec!(2) * h))
        }
    }

    fn normalized_liquidity(&self) -> Decimal {
        self.balance_out() * self.amp
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantProductPair {
    pub pool_id: PoolId,
    pub balance_in: Decimal,
    pub balance_out: Decimal,
    pub swap_fee: Decimal,
}

impl ConstantProductPair {
    fn state(&self) -> ConstantProductState {
        ConstantProductState {
            reserve_in: self.balance_in,
            reserve_out: self.balance_out,
            swap_fee: self.swap_fee,
        }
    }
}

impl PairPricing for ConstantProductPair {
    fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    fn balance_in(&self) -> Decimal {
        self.balance_in
    }

    fn balance_out(&self) -> Decimal {
        self.balance_out
    }

    fn exact_in(&self, amount_in: Decimal) -> PoolResult<Decimal> {
        ConstantProductMath::calculate_output_amount(amount_in, &self.state())
            .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn exact_out(&self, amount_out: Decimal) -> PoolResult<Decimal> {
        ConstantProductMath::calculate_input_amount(amount_out, &self.state())
            .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn limit_amount(&self, swap_type: SwapType) -> Decimal {
        match swap_type {
            SwapType::ExactIn => self.balance_in * MAX_IN_RATIO,
            SwapType::ExactOut => self.balance_out * MAX_OUT_RATIO,
        }
    }

    fn spot_price_after_swap(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal> {
        let state = self.state();
        match swap_type {
            SwapType::ExactIn => ConstantProductMath::spot_price_after_exact_in(amount, &state),
            SwapType::ExactOut => ConstantProductMath::spot_price_after_exact_out(amount, &state),
        }
        .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn derivative_spot_price_after_swap(
        &self,
        swap_type: SwapType,
        amount: Decimal,
    ) -> PoolResult<Decimal> {
        let state = self.state();
        match swap_type {
            SwapType::ExactIn => ConstantProductMath::derivative_spot_price_after_exact_in(amount, &state),
            SwapType::ExactOut => {
                ConstantProductMath::derivative_spot_price_after_exact_out(amount, &state)
            }
        }
        .map_err(|e| e.for_pool(self.pool_id.as_str()))
    }

    fn normalized_liquidity(&self) -> Decimal {
        self.balance_out / dec!(2)
    }
}

/// One pool projected onto a directed token pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairView {
    Weighted(WeightedPair),
    Stable(StablePair),
    MetaStable(StablePair),
    ConstantProduct(ConstantProductPair),
}

impl PairView {
    /// Curve family of the underlying pool (liquidity bootstrapping pools report `Weighted`)
    pub fn pool_type(&self) -> PoolType {
        match self {
            Self::Weighted(_) => PoolType::Weighted,
            Self::Stable(_) => PoolType::Stable,
            Self::MetaStable(_) => PoolType::MetaStable,
            Self::ConstantProduct(_) => PoolType::ConstantProduct,
        }
    }
}

macro_rules! dispatch {
    ($view:expr, $pair:ident => $body:expr) => {
        match $view {
            PairView::Weighted($pair) => $body,
            PairView::Stable($pair) => $body,
            PairView::MetaStable($pair) => $body,
            PairView::ConstantProduct($pair) => $body,
        }
    };
}

impl PairPricing for PairView {
    fn pool_id(&self) -> &PoolId {
        dispatch!(self, pair => pair.pool_id())
    }

    fn balance_in(&self) -> Decimal {
        dispatch!(self, pair => pair.balance_in())
    }

    fn balance_out(&self) -> Decimal {
        dispatch!(self, pair => pair.balance_out())
    }

    fn exact_in(&self, amount_in: Decimal) -> PoolResult<Decimal> {
        dispatch!(self, pair => pair.exact_in(amount_in))
    }

    fn exact_out(&self, amount_out: Decimal) -> PoolResult<Decimal> {
        dispatch!(self, pair => pair.exact_out(amount_out))
    }

    fn limit_amount(&self, swap_type: SwapType) -> Decimal {
        dispatch!(self, pair => pair.limit_amount(swap_type))
    }

    fn spot_price_after_swap(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal> {
        dispatch!(self, pair => pair.spot_price_after_swap(swap_type, amount))
    }

    fn derivative_spot_price_after_swap(
        &self,
        swap_type: SwapType,
        amount: Decimal,
    ) -> PoolResult<Decimal> {
        dispatch!(self, pair => pair.derivative_spot_price_after_swap(swap_type, amount))
    }

    fn normalized_liquidity(&self) -> Decimal {
        dispatch!(self, pair => pair.normalized_liquidity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Pool, PoolToken};

    fn weighted_pool() -> Pool {
        Pool::new(
            "0xweighted",
            PoolType::Weighted,
            dec!(0.003),
            vec![
                PoolToken::new("0xa", dec!(100), 18).with_weight(dec!(50)),
                PoolToken::new("0xb", dec!(100), 18).with_weight(dec!(50)),
            ],
        )
    }

    fn constant_product_pool() -> Pool {
        Pool::new(
            "0xcp",
            PoolType::ConstantProduct,
            dec!(0.003),
            vec![PoolToken::new("0xa", dec!(100), 18), PoolToken::new("0xb", dec!(100), 18)],
        )
    }

    fn meta_stable_pool(rate: Decimal) -> Pool {
        Pool::new(
            "0xmeta",
            PoolType::MetaStable,
            dec!(0.0004),
            vec![
                PoolToken::new("0xa", dec!(1000), 18).with_price_rate(rate),
                PoolToken::new("0xb", dec!(1000) * rate, 18),
            ],
        )
        .with_amp(dec!(100))
    }

    #[test]
    fn test_equal_weight_pool_matches_constant_product() {
        let weighted = weighted_pool().pair_view(&"0xa".into(), &"0xb".into()).unwrap();
        let cp = constant_product_pool().pair_view(&"0xa".into(), &"0xb".into()).unwrap();

        for amount in [dec!(1), dec!(7.5), dec!(25)] {
            let w = weighted.exact_in(amount).unwrap();
            let c = cp.exact_in(amount).unwrap();
            assert!((w - c).abs() < dec!(0.0000000001));

            let w = weighted.derivative_spot_price_after_swap(SwapType::ExactOut, amount).unwrap();
            let c = cp.derivative_spot_price_after_swap(SwapType::ExactOut, amount).unwrap();
            assert!((w - c).abs() < dec!(0.0000000001));
        }
    }

    #[test]
    fn test_weighted_limits_are_thirty_percent() {
        let pair = weighted_pool().pair_view(&"0xa".into(), &"0xb".into()).unwrap();
        assert_eq!(pair.limit_amount(SwapType::ExactIn), dec!(30));
        assert_eq!(pair.limit_amount(SwapType::ExactOut), dec!(30));
        assert_eq!(pair.normalized_liquidity(), dec!(50));
    }

    #[test]
    fn test_meta_stable_prices_through_rate() {
        // token a is worth 1.2 units, balances are in peg once scaled
        let pair = meta_stable_pool(dec!(1.2)).pair_view(&"0xa".into(), &"0xb".into()).unwrap();
        assert_eq!(pair.pool_type(), PoolType::MetaStable);
        let price = pair.spot_price().unwrap();
        // paying in a for b: 1 b costs about 1/1.2 a
        assert!((price - dec!(1) / dec!(1.2)).abs() < dec!(0.001));

        let out = pair.exact_in(dec!(1)).unwrap();
        assert!((out - dec!(1.2)).abs() < dec!(0.001));
    }

    #[test]
    fn test_stable_derivative_positive_both_directions() {
        let pair = meta_stable_pool(dec!(1)).pair_view(&"0xa".into(), &"0xb".into()).unwrap();
        for swap_type in [SwapType::ExactIn, SwapType::ExactOut] {
            let at_zero = pair.derivative_spot_price_after_swap(swap_type, dec!(0)).unwrap();
            let at_size = pair.derivative_spot_price_after_swap(swap_type, dec!(100)).unwrap();
            assert!(at_zero > dec!(0));
            assert!(at_size > dec!(0));
        }
    }

    #[test]
    fn test_stable_derivative_matches_price_slope() {
        let pair = meta_stable_pool(dec!(1)).pair_view(&"0xa".into(), &"0xb".into()).unwrap();
        let a = dec!(200);
        let h = dec!(1);
        let slope = (pair.spot_price_after_swap(SwapType::ExactIn, a + h).unwrap()
            - pair.spot_price_after_swap(SwapType::ExactIn, a - h).unwrap())
            / dec!(2);
        let derivative = pair.derivative_spot_price_after_swap(SwapType::ExactIn, a).unwrap();
        assert!((slope - derivative).abs() <= derivative.abs() * dec!(0.01));
    }
}
