//! Pool-share (BPT) valuation at zero price impact
//!
//! Values a basket of token amounts in pool shares as if every token were
//! added at the current marginal price, i.e. the ideal proportional join.
//! Used by callers to measure the price impact of a real join, independent
//! of routing.
//!
//! Inputs and output are raw integer units: balances and amounts are scaled
//! by each token's `decimals`, the returned share amount by 18 decimals,
//! rounded down.

use crate::error::CurveError;
use crate::stable_math::StableMath;
use crate::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Largest scale a decimal can carry
const MAX_DECIMALS: u8 = 28;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValuationError {
    #[error("input lengths differ: {balances} balances, {other} {field}")]
    LengthMismatch {
        balances: usize,
        other: usize,
        field: &'static str,
    },

    #[error("unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),

    #[error("balance at index {0} must be positive")]
    EmptyBalance(usize),

    #[error(transparent)]
    Curve(#[from] CurveError),
}

pub type ValuationResult<T> = Result<T, ValuationError>;

fn check_lengths(
    balances: &[Decimal],
    decimals: &[u8],
    amounts: &[Decimal],
) -> ValuationResult<()> {
    for (other, field) in [(decimals.len(), "decimals"), (amounts.len(), "amounts")] {
        if other != balances.len() {
            return Err(ValuationError::LengthMismatch {
                balances: balances.len(),
                other,
                field,
            });
        }
    }
    Ok(())
}

/// Raw integer amount to human units
fn to_human(raw: Decimal, decimals: u8) -> ValuationResult<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(ValuationError::UnsupportedDecimals(decimals));
    }
    raw.checked_mul(Decimal::new(1, u32::from(decimals)))
        .ok_or(ValuationError::Curve(CurveError::Overflow))
}

/// Shares minted for `amounts` in a weighted pool: `Σ aᵢ·wᵢ·S / bᵢ`
///
/// `normalized_weights` are fractions summing to one.
pub fn weighted_bpt_for_tokens_zero_price_impact(
    balances: &[Decimal],
    decimals: &[u8],
    normalized_weights: &[Decimal],
    amounts: &[Decimal],
    bpt_total_supply: Decimal,
) -> ValuationResult<Decimal> {
    check_lengths(balances, decimals, amounts)?;
    if normalized_weights.len() != balances.len() {
        return Err(ValuationError::LengthMismatch {
            balances: balances.len(),
            other: normalized_weights.len(),
            field: "weights",
        });
    }

    let mut bpt = dec!(0);
    for (i, ((balance, amount), weight)) in balances
        .iter()
        .zip(amounts)
        .zip(normalized_weights)
        .enumerate()
    {
        let balance = to_human(*balance, decimals[i])?;
        let amount = to_human(*amount, decimals[i])?;
        if balance <= dec!(0) {
            return Err(ValuationError::EmptyBalance(i));
        }
        // share of the pool's value this amount represents
        let share = amount * *weight / balance;
        bpt += share
            .checked_mul(bpt_total_supply)
            .ok_or(ValuationError::Curve(CurveError::Overflow))?;
    }

    Ok(bpt.floor())
}

/// Shares minted for `amounts` in a stable pool: `Σ aᵢ·(∂D/∂xᵢ)·S / D`
///
/// `amounts` must have one entry per pool token (zero for tokens not added).
pub fn stable_bpt_for_tokens_zero_price_impact(
    balances: &[Decimal],
    decimals: &[u8],
    amounts: &[Decimal],
    bpt_total_supply: Decimal,
    amp: Decimal,
) -> ValuationResult<Decimal> {
    check_lengths(balances, decimals, amounts)?;

    let human_balances = balances
        .iter()
        .zip(decimals)
        .map(|(balance, decimals)| to_human(*balance, *decimals))
        .collect::<ValuationResult<Vec<_>>>()?;
    if let Some(i) = human_balances.iter().position(|b| *b <= dec!(0)) {
        return Err(ValuationError::EmptyBalance(i));
    }

    let invariant = StableMath::invariant(amp, &human_balances)?;
    let mut bpt = dec!(0);
    for (i, amount) in amounts.iter().enumerate() {
        let amount = to_human(*amount, decimals[i])?;
        if amount.is_zero() {
            continue;
        }
        let sensitivity = StableMath::invariant_sensitivity(amp, &human_balances, i)?;
        let minted = (amount * sensitivity / invariant)
            .checked_mul(bpt_total_supply)
            .ok_or(ValuationError::Curve(CurveError::Overflow))?;
        bpt += minted;
    }

    Ok(bpt.floor())
}
