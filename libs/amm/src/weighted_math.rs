//! Weighted product AMM math with exact decimal calculations
//!
//! Balancer-style invariant `Π Bᵢ^wᵢ = k` restricted to one token pair.
//! Only the weight ratio matters, so raw (un-normalized) weights are fine.
//! Spot prices are quoted as tokenIn per tokenOut with the swap fee applied,
//! which makes "lower" the better price in both swap directions.

use crate::error::{CurveError, CurveResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

/// Raise `base` to a decimal power, mapping overflow to a curve error
pub(crate) fn pow(base: Decimal, exp: Decimal) -> CurveResult<Decimal> {
    if exp == Decimal::ONE {
        return Ok(base);
    }
    if exp.fract().is_zero() {
        let whole = exp.to_i64().ok_or(CurveError::Overflow)?;
        return base.checked_powi(whole).ok_or(CurveError::Overflow);
    }
    base.checked_powd(exp).ok_or(CurveError::Overflow)
}

fn check_pair(balance_in: Decimal, balance_out: Decimal) -> CurveResult<()> {
    if balance_in <= dec!(0) || balance_out <= dec!(0) {
        return Err(CurveError::NonPositiveBalance);
    }
    Ok(())
}

/// Weighted pool math functions with zero binary-float precision loss
pub struct WeightedMath;

impl WeightedMath {
    /// Output amount for an exact input
    ///
    /// `out = Bo · (1 − (Bi / (Bi + Ai·(1−f)))^(wi/wo))`
    pub fn out_given_in(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        amount_in: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        check_pair(balance_in, balance_out)?;
        if amount_in < dec!(0) {
            return Err(CurveError::NegativeAmount);
        }
        if amount_in.is_zero() {
            return Ok(dec!(0));
        }

        let amount_in_after_fee = amount_in * (dec!(1) - swap_fee);
        let base = balance_in / (balance_in + amount_in_after_fee);
        let power = pow(base, weight_in / weight_out)?;

        Ok(balance_out * (dec!(1) - power))
    }

    /// Input amount required for an exact output
    ///
    /// `in = Bi · ((Bo / (Bo − Ao))^(wo/wi) − 1) / (1−f)`
    pub fn in_given_out(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        amount_out: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        check_pair(balance_in, balance_out)?;
        if amount_out < dec!(0) {
            return Err(CurveError::NegativeAmount);
        }
        if amount_out >= balance_out {
            return Err(CurveError::OutputExceedsBalance);
        }
        if amount_out.is_zero() {
            return Ok(dec!(0));
        }

        let base = balance_out / (balance_out - amount_out);
        let power = pow(base, weight_out / weight_in)?;
        let gross = balance_in
            .checked_mul(power - dec!(1))
            .ok_or(CurveError::Overflow)?;

        Ok(gross / (dec!(1) - swap_fee))
    }

    /// Spot price before any trade: `(Bi/wi) / (Bo/wo) / (1−f)`
    pub fn spot_price(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        check_pair(balance_in, balance_out)?;
        Ok(balance_in * weight_out / (balance_out * weight_in * (dec!(1) - swap_fee)))
    }

    /// Spot price after an exact-in trade of `amount_in`
    pub fn spot_price_after_exact_in(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        amount_in: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        let spot = Self::spot_price(balance_in, weight_in, balance_out, weight_out, swap_fee)?;
        let growth = (balance_in + amount_in * (dec!(1) - swap_fee)) / balance_in;
        let power = pow(growth, (weight_in + weight_out) / weight_out)?;
        spot.checked_mul(power).ok_or(CurveError::Overflow)
    }

    /// Spot price after an exact-out trade of `amount_out`
    pub fn spot_price_after_exact_out(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        amount_out: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        if amount_out >= balance_out {
            return Err(CurveError::OutputExceedsBalance);
        }
        let spot = Self::spot_price(balance_in, weight_in, balance_out, weight_out, swap_fee)?;
        let shrink = balance_out / (balance_out - amount_out);
        let power = pow(shrink, (weight_in + weight_out) / weight_in)?;
        spot.checked_mul(power).ok_or(CurveError::Overflow)
    }

    /// d(spot price)/d(amount_in) for exact-in trades
    pub fn derivative_spot_price_after_exact_in(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        amount_in: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        check_pair(balance_in, balance_out)?;
        let growth = (balance_in + amount_in * (dec!(1) - swap_fee)) / balance_in;
        let power = pow(growth, weight_in / weight_out)?;
        Ok((weight_in + weight_out) / (balance_out * weight_in) * power)
    }

    /// d(spot price)/d(amount_out) for exact-out trades
    pub fn derivative_spot_price_after_exact_out(
        balance_in: Decimal,
        weight_in: Decimal,
        balance_out: Decimal,
        weight_out: Decimal,
        amount_out: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        let price = Self::spot_price_after_exact_out(
            balance_in,
            weight_in,
            balance_out,
            weight_out,
            amount_out,
            swap_fee,
        )?;
        let exponent = (weight_in + weight_out) / weight_in;
        Ok(price * exponent / (balance_out - amount_out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn test_out_given_in_equal_weights() {
        // 10 in, 100:100 reserves, 0.3% fee, 50/50 weights
        let out =
            WeightedMath::out_given_in(dec!(100), dec!(0.5), dec!(100), dec!(0.5), dec!(10), dec!(0.003))
                .unwrap();
        // x*y=k: 9.97 * 100 / 109.97
        assert!(close(out, dec!(9.066108938801491315813403655), dec!(0.000000001)));
    }

    #[test]
    fn test_in_given_out_inverts_out_given_in() {
        let out =
            WeightedMath::out_given_in(dec!(500), dec!(0.8), dec!(2000), dec!(0.2), dec!(25), dec!(0.01))
                .unwrap();
        let back =
            WeightedMath::in_given_out(dec!(500), dec!(0.8), dec!(2000), dec!(0.2), out, dec!(0.01))
                .unwrap();
        assert!(close(back, dec!(25), dec!(0.0000001)));
    }

    #[test]
    fn test_output_at_balance_rejected() {
        let err = WeightedMath::in_given_out(dec!(100), dec!(1), dec!(100), dec!(1), dec!(100), dec!(0))
            .unwrap_err();
        assert_eq!(err, CurveError::OutputExceedsBalance);
    }

    #[test]
    fn test_zero_balance_rejected() {
        let err = WeightedMath::spot_price(dec!(0), dec!(1), dec!(100), dec!(1), dec!(0)).unwrap_err();
        assert_eq!(err, CurveError::NonPositiveBalance);
    }

    #[test]
    fn test_spot_price_after_zero_matches_spot_price() {
        let spot = WeightedMath::spot_price(dec!(50), dec!(1), dec!(200), dec!(1), dec!(0.003)).unwrap();
        let after =
            WeightedMath::spot_price_after_exact_in(dec!(50), dec!(1), dec!(200), dec!(1), dec!(0), dec!(0.003))
                .unwrap();
        assert_eq!(spot, after);
        // 50/200/0.997
        assert!(close(spot, dec!(0.2507522567703109327983951856), dec!(0.0000000001)));
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let (bi, wi, bo, wo, f) = (dec!(1000), dec!(0.6), dec!(3000), dec!(0.4), dec!(0.002));
        let a = dec!(40);
        let h = dec!(0.0001);
        let p0 = WeightedMath::spot_price_after_exact_in(bi, wi, bo, wo, a, f).unwrap();
        let p1 = WeightedMath::spot_price_after_exact_in(bi, wi, bo, wo, a + h, f).unwrap();
        let numeric = (p1 - p0) / h;
        let analytic = WeightedMath::derivative_spot_price_after_exact_in(bi, wi, bo, wo, a, f).unwrap();
        assert!(close(numeric, analytic, dec!(0.000001)));

        let p0 = WeightedMath::spot_price_after_exact_out(bi, wi, bo, wo, a, f).unwrap();
        let p1 = WeightedMath::spot_price_after_exact_out(bi, wi, bo, wo, a + h, f).unwrap();
        let numeric = (p1 - p0) / h;
        let analytic = WeightedMath::derivative_spot_price_after_exact_out(bi, wi, bo, wo, a, f).unwrap();
        assert!(close(numeric, analytic, dec!(0.000001)));
    }

    #[test]
    fn test_pow_integer_and_fractional() {
        assert_eq!(pow(dec!(2), dec!(3)).unwrap(), dec!(8));
        assert!(close(pow(dec!(4), dec!(0.5)).unwrap(), dec!(2), dec!(0.0000000001)));
    }
}
