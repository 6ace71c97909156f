//! Pool trait definitions for the unified pricing interface

use crate::error::PoolResult;
use crate::pool::PoolId;
use crate::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the trade is fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapType {
    /// Input amount is fixed, maximise output
    ExactIn,
    /// Output amount is fixed, minimise input
    ExactOut,
}

/// Pricing capability set shared by every pool variant, evaluated on one token pair
///
/// Spot prices are tokenIn per tokenOut with the fee applied. Amounts passed
/// to `spot_price_after_swap` / `derivative_spot_price_after_swap` are input
/// amounts for [`SwapType::ExactIn`] and output amounts for [`SwapType::ExactOut`].
pub trait PairPricing {
    /// Identifier of the pool this pair belongs to
    fn pool_id(&self) -> &PoolId;

    /// Current balance of the input token (human units)
    fn balance_in(&self) -> Decimal;

    /// Current balance of the output token (human units)
    fn balance_out(&self) -> Decimal;

    /// Output amount for an exact input
    fn exact_in(&self, amount_in: Decimal) -> PoolResult<Decimal>;

    /// Input amount for an exact output
    fn exact_out(&self, amount_out: Decimal) -> PoolResult<Decimal>;

    /// Largest amount the pair can take in this direction before the curve degenerates
    fn limit_amount(&self, swap_type: SwapType) -> Decimal;

    /// Marginal price right after a hypothetical swap of `amount`
    fn spot_price_after_swap(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal>;

    /// First derivative of [`PairPricing::spot_price_after_swap`] with respect to `amount`
    fn derivative_spot_price_after_swap(
        &self,
        swap_type: SwapType,
        amount: Decimal,
    ) -> PoolResult<Decimal>;

    /// Liquidity figure used only to rank candidate paths
    fn normalized_liquidity(&self) -> Decimal;

    /// Counter amount of a swap: output for exact-in, input for exact-out
    fn swap(&self, swap_type: SwapType, amount: Decimal) -> PoolResult<Decimal> {
        match swap_type {
            SwapType::ExactIn => self.exact_in(amount),
            SwapType::ExactOut => self.exact_out(amount),
        }
    }

    /// Spot price at zero amount
    fn spot_price(&self) -> PoolResult<Decimal> {
        self.spot_price_after_swap(SwapType::ExactIn, Decimal::ZERO)
    }
}
