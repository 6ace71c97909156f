//! Constant product (x*y=k) AMM math with exact calculations
//!
//! Closed forms for the "other" bonding-curve family: no fractional powers,
//! so every quantity here is a handful of decimal multiplications.

use crate::error::{CurveError, CurveResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Pool reserves and fee for one constant product pair
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantProductState {
    pub reserve_in: Decimal,
    pub reserve_out: Decimal,
    /// Fee as a fraction (0.003 = 0.3%)
    pub swap_fee: Decimal,
}

impl ConstantProductState {
    fn validate(&self) -> CurveResult<()> {
        if self.reserve_in <= dec!(0) || self.reserve_out <= dec!(0) {
            return Err(CurveError::NonPositiveBalance);
        }
        Ok(())
    }

    fn fee_multiplier(&self) -> Decimal {
        dec!(1) - self.swap_fee
    }
}

/// Constant product math functions with zero precision loss
pub struct ConstantProductMath;

impl ConstantProductMath {
    /// Calculate exact output amount using the x*y=k formula
    ///
    /// # Arguments
    /// * `amount_in` - Input token amount (human units)
    /// * `state` - Reserves and fee of the pair
    ///
    /// # Returns
    /// Exact output amount after fees and slippage
    pub fn calculate_output_amount(
        amount_in: Decimal,
        state: &ConstantProductState,
    ) -> CurveResult<Decimal> {
        state.validate()?;
        if amount_in < dec!(0) {
            return Err(CurveError::NegativeAmount);
        }

        // output = (amount_in_after_fee * reserve_out) / (reserve_in + amount_in_after_fee)
        let amount_in_after_fee = amount_in * state.fee_multiplier();
        let numerator = amount_in_after_fee
            .checked_mul(state.reserve_out)
            .ok_or(CurveError::Overflow)?;
        let denominator = state.reserve_in + amount_in_after_fee;

        Ok(numerator / denominator)
    }

    /// Calculate required input amount for desired output (reverse calculation)
    pub fn calculate_input_amount(
        amount_out: Decimal,
        state: &ConstantProductState,
    ) -> CurveResult<Decimal> {
        state.validate()?;
        if amount_out < dec!(0) {
            return Err(CurveError::NegativeAmount);
        }
        if amount_out >= state.reserve_out {
            return Err(CurveError::OutputExceedsBalance);
        }

        let numerator = state
            .reserve_in
            .checked_mul(amount_out)
            .ok_or(CurveError::Overflow)?;
        let denominator = (state.reserve_out - amount_out) * state.fee_multiplier();

        Ok(numerator / denominator)
    }

    /// Spot price after an exact-in trade: `(Ri + Ai·(1−f))² / (Ro·Ri·(1−f))`
    pub fn spot_price_after_exact_in(
        amount_in: Decimal,
        state: &ConstantProductState,
    ) -> CurveResult<Decimal> {
        state.validate()?;
        let grown = state.reserve_in + amount_in * state.fee_multiplier();
        let numerator = grown.checked_mul(grown).ok_or(CurveError::Overflow)?;
        Ok(numerator / (state.reserve_out * state.reserve_in * state.fee_multiplier()))
    }

    /// Spot price after an exact-out trade: `Ri·Ro / ((1−f)·(Ro − Ao)²)`
    pub fn spot_price_after_exact_out(
        amount_out: Decimal,
        state: &ConstantProductState,
    ) -> CurveResult<Decimal> {
        state.validate()?;
        if amount_out >= state.reserve_out {
            return Err(CurveError::OutputExceedsBalance);
        }
        let remaining = state.reserve_out - amount_out;
        let numerator = state
            .reserve_in
            .checked_mul(state.reserve_out)
            .ok_or(CurveError::Overflow)?;
        Ok(numerator / (state.fee_multiplier() * remaining * remaining))
    }

    /// Derivative of the exact-in spot price: `2·(Ri + Ai·(1−f)) / (Ro·Ri)`
    pub fn derivative_spot_price_after_exact_in(
        amount_in: Decimal,
        state: &ConstantProductState,
    ) -> CurveResult<Decimal> {
        state.validate()?;
        let grown = state.reserve_in + amount_in * state.fee_multiplier();
        Ok(dec!(2) * grown / (state.reserve_out * state.reserve_in))
    }

    /// Derivative of the exact-out spot price: `2·Ri·Ro / ((1−f)·(Ro − Ao)³)`
    pub fn derivative_spot_price_after_exact_out(
        amount_out: Decimal,
        state: &ConstantProductState,
    ) -> CurveResult<Decimal> {
        let price = Self::spot_price_after_exact_out(amount_out, state)?;
        Ok(dec!(2) * price / (state.reserve_out - amount_out))
    }
}
