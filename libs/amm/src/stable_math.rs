//! StableSwap invariant math for low-slippage pools of similarly priced assets
//!
//! Invariant: `Ann·Σx + D = Ann·D + D^(n+1) / (nⁿ·Πx)` with `Ann = A·nⁿ`.
//! Both the invariant `D` and the balance solved for one token are found by
//! bounded Newton iteration; exceeding the bound is a curve error, never a
//! silently truncated result.

use crate::error::{CurveError, CurveResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

/// Newton iteration cap for invariant and balance solving
pub const MAX_NEWTON_ITERATIONS: usize = 255;

/// Relative convergence threshold for the Newton solvers
const CONVERGENCE_EPSILON: Decimal = dec!(0.00000000000000000001);

fn mul(a: Decimal, b: Decimal) -> CurveResult<Decimal> {
    a.checked_mul(b).ok_or(CurveError::Overflow)
}

fn div(a: Decimal, b: Decimal) -> CurveResult<Decimal> {
    if b.is_zero() {
        return Err(CurveError::NonPositiveBalance);
    }
    a.checked_div(b).ok_or(CurveError::Overflow)
}

fn converged(next: Decimal, prev: Decimal) -> bool {
    (next - prev).abs() <= next.abs() * CONVERGENCE_EPSILON
}

/// StableSwap math functions
pub struct StableMath;

impl StableMath {
    /// `A·nⁿ`
    fn ann(amp: Decimal, n: usize) -> CurveResult<Decimal> {
        let n_dec = Decimal::from(n as u64);
        let mut ann = amp;
        for _ in 0..n {
            ann = mul(ann, n_dec)?;
        }
        Ok(ann)
    }

    fn check_balances(balances: &[Decimal]) -> CurveResult<()> {
        if balances.len() < 2 || balances.iter().any(|b| *b <= dec!(0)) {
            return Err(CurveError::NonPositiveBalance);
        }
        Ok(())
    }

    /// `D^(n+1) / (nⁿ·Πx)`, accumulated one balance at a time to stay in range
    fn product_term(invariant: Decimal, balances: &[Decimal]) -> CurveResult<Decimal> {
        let n_dec = Decimal::from(balances.len() as u64);
        let mut term = invariant;
        for balance in balances {
            term = div(mul(term, invariant)?, mul(*balance, n_dec)?)?;
        }
        Ok(term)
    }

    /// Compute the invariant `D` for the given balances
    pub fn invariant(amp: Decimal, balances: &[Decimal]) -> CurveResult<Decimal> {
        Self::check_balances(balances)?;
        let n = balances.len();
        let n_dec = Decimal::from(n as u64);
        let sum: Decimal = balances.iter().copied().sum();
        let ann = Self::ann(amp, n)?;

        let mut invariant = sum;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let d_p = Self::product_term(invariant, balances)?;
            let previous = invariant;

            // D = (Ann·S + n·D_P)·D / ((Ann − 1)·D + (n + 1)·D_P)
            let numerator = mul(mul(ann, sum)? + mul(d_p, n_dec)?, invariant)?;
            let denominator = mul(ann - dec!(1), invariant)? + mul(n_dec + dec!(1), d_p)?;
            invariant = div(numerator, denominator)?;

            if converged(invariant, previous) {
                return Ok(invariant);
            }
        }

        warn!(%amp, tokens = n, %sum, "Stable invariant did not converge");
        Err(CurveError::NoConvergence)
    }

    /// Solve the balance of `token_index` that keeps `invariant` given all other balances
    pub fn balance_given_invariant(
        amp: Decimal,
        balances: &[Decimal],
        invariant: Decimal,
        token_index: usize,
    ) -> CurveResult<Decimal> {
        let n = balances.len();
        let n_dec = Decimal::from(n as u64);
        let ann = Self::ann(amp, n)?;

        let mut c = invariant;
        let mut sum = dec!(0);
        for (index, balance) in balances.iter().enumerate() {
            if index == token_index {
                continue;
            }
            if *balance <= dec!(0) {
                return Err(CurveError::NonPositiveBalance);
            }
            sum += *balance;
            c = div(mul(c, invariant)?, mul(*balance, n_dec)?)?;
        }
        c = div(mul(c, invariant)?, mul(ann, n_dec)?)?;
        let b = sum + div(invariant, ann)?;

        let mut balance = invariant;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let previous = balance;
            // y = (y² + c) / (2y + b − D)
            let denominator = dec!(2) * balance + b - invariant;
            balance = div(mul(balance, balance)? + c, denominator)?;
            if balance <= dec!(0) {
                return Err(CurveError::NonPositiveBalance);
            }
            if converged(balance, previous) {
                return Ok(balance);
            }
        }

        warn!(%amp, %invariant, token_index, "Stable balance did not converge");
        Err(CurveError::NoConvergence)
    }

    /// Output of `token_out` for an exact input of `token_in`
    pub fn out_given_in(
        amp: Decimal,
        balances: &[Decimal],
        token_in: usize,
        token_out: usize,
        amount_in: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        if amount_in < dec!(0) {
            return Err(CurveError::NegativeAmount);
        }
        let invariant = Self::invariant(amp, balances)?;
        if amount_in.is_zero() {
            return Ok(dec!(0));
        }

        let mut updated = balances.to_vec();
        updated[token_in] += amount_in * (dec!(1) - swap_fee);
        let final_out = Self::balance_given_invariant(amp, &updated, invariant, token_out)?;

        Ok((balances[token_out] - final_out).max(dec!(0)))
    }

    /// Input of `token_in` required for an exact output of `token_out`
    pub fn in_given_out(
        amp: Decimal,
        balances: &[Decimal],
        token_in: usize,
        token_out: usize,
        amount_out: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        if amount_out < dec!(0) {
            return Err(CurveError::NegativeAmount);
        }
        if amount_out >= balances[token_out] {
            return Err(CurveError::OutputExceedsBalance);
        }
        let invariant = Self::invariant(amp, balances)?;
        if amount_out.is_zero() {
            return Ok(dec!(0));
        }

        let mut updated = balances.to_vec();
        updated[token_out] -= amount_out;
        let final_in = Self::balance_given_invariant(amp, &updated, invariant, token_in)?;

        Ok(((final_in - balances[token_in]) / (dec!(1) - swap_fee)).max(dec!(0)))
    }

    /// Marginal price of `token_out` in `token_in` on the curve, fee excluded
    ///
    /// Ratio of the invariant's partial derivatives: `(Ann + c/x_out) / (Ann + c/x_in)`.
    pub fn spot_price(
        amp: Decimal,
        balances: &[Decimal],
        token_in: usize,
        token_out: usize,
    ) -> CurveResult<Decimal> {
        let invariant = Self::invariant(amp, balances)?;
        Self::spot_price_at_invariant(amp, balances, invariant, token_in, token_out)
    }

    fn spot_price_at_invariant(
        amp: Decimal,
        balances: &[Decimal],
        invariant: Decimal,
        token_in: usize,
        token_out: usize,
    ) -> CurveResult<Decimal> {
        let ann = Self::ann(amp, balances.len())?;
        let c = Self::product_term(invariant, balances)?;
        let partial_out = ann + div(c, balances[token_out])?;
        let partial_in = ann + div(c, balances[token_in])?;
        div(partial_out, partial_in)
    }

    /// Spot price (fee included) after an exact-in trade of `amount_in`
    pub fn spot_price_after_exact_in(
        amp: Decimal,
        balances: &[Decimal],
        token_in: usize,
        token_out: usize,
        amount_in: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        let invariant = Self::invariant(amp, balances)?;
        let mut updated = balances.to_vec();
        updated[token_in] += amount_in * (dec!(1) - swap_fee);
        updated[token_out] = Self::balance_given_invariant(amp, &updated, invariant, token_out)?;

        let price = Self::spot_price_at_invariant(amp, &updated, invariant, token_in, token_out)?;
        Ok(price / (dec!(1) - swap_fee))
    }

    /// Spot price (fee included) after an exact-out trade of `amount_out`
    pub fn spot_price_after_exact_out(
        amp: Decimal,
        balances: &[Decimal],
        token_in: usize,
        token_out: usize,
        amount_out: Decimal,
        swap_fee: Decimal,
    ) -> CurveResult<Decimal> {
        if amount_out >= balances[token_out] {
            return Err(CurveError::OutputExceedsBalance);
        }
        let invariant = Self::invariant(amp, balances)?;
        let mut updated = balances.to_vec();
        updated[token_out] -= amount_out;
        updated[token_in] = Self::balance_given_invariant(amp, &updated, invariant, token_in)?;

        let price = Self::spot_price_at_invariant(amp, &updated, invariant, token_in, token_out)?;
        Ok(price / (dec!(1) - swap_fee))
    }

    /// `∂D/∂x_i`, the invariant's sensitivity to one balance
    ///
    /// Implicit differentiation of the invariant equation:
    /// `(Ann + c/x_i) / (Ann − 1 + (n+1)·c/D)`.
    pub fn invariant_sensitivity(
        amp: Decimal,
        balances: &[Decimal],
        token_index: usize,
    ) -> CurveResult<Decimal> {
        let invariant = Self::invariant(amp, balances)?;
        let n_dec = Decimal::from(balances.len() as u64);
        let ann = Self::ann(amp, balances.len())?;
        let c = Self::product_term(invariant, balances)?;

        let numerator = ann + div(c, balances[token_index])?;
        let denominator = ann - dec!(1) + div(mul(n_dec + dec!(1), c)?, invariant)?;
        div(numerator, denominator)
    }
}
