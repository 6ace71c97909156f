//! # Gas Cost Conversion
//!
//! ## Purpose
//!
//! Expresses the gas cost of one swap path in the token the routing result
//! is measured in, so the optimizer can weigh an extra path against the
//! output it adds.
//!
//! ## Integration Points
//!
//! - **Price Source**: Native asset price per token, pushed in by the caller's price feed
//! - **Router**: Converted once per request, charged once per selected path
//! - **Fallback**: Tokens without a known native price cost nothing
//!
//! ```text
//! gas_price_wei × gas_units / 1e18 = native cost ──× native price in token──► token cost
//! ```

use crate::log_gas;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sor_amm::TokenAddress;
use std::collections::HashMap;

/// Wei per native asset unit
const WEI_PER_NATIVE: u64 = 1_000_000_000_000_000_000;

/// Converts a gas spend into an amount of some token
pub trait GasCostConverter: Send + Sync {
    fn convert_gas_cost_to_token(
        &self,
        token: &TokenAddress,
        gas_price_wei: u64,
        gas_units: u64,
    ) -> Result<Decimal>;
}

/// Gas cost conversion from cached native asset prices
#[derive(Debug, Default)]
pub struct NativePriceCostCalculator {
    /// Native asset price expressed in each token
    native_prices: RwLock<HashMap<TokenAddress, Decimal>>,
}

impl NativePriceCostCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how many units of `token` one native asset is worth
    pub fn set_native_asset_price_in_token(&self, token: impl Into<TokenAddress>, price: Decimal) {
        let token = token.into();
        log_gas!("Native asset price in {} set to {}", token, price);
        self.native_prices.write().insert(token, price);
    }

    pub fn native_asset_price_in_token(&self, token: &TokenAddress) -> Option<Decimal> {
        self.native_prices.read().get(token).copied()
    }
}

impl GasCostConverter for NativePriceCostCalculator {
    fn convert_gas_cost_to_token(
        &self,
        token: &TokenAddress,
        gas_price_wei: u64,
        gas_units: u64,
    ) -> Result<Decimal> {
        let Some(price) = self.native_asset_price_in_token(token) else {
            log_gas!("No native asset price for {}, gas cost taken as zero", token);
            return Ok(Decimal::ZERO);
        };

        let native_cost = Decimal::from(gas_price_wei)
            .checked_mul(Decimal::from(gas_units))
            .context("Gas cost in wei overflows")?
            / Decimal::from(WEI_PER_NATIVE);
        let cost = native_cost
            .checked_mul(price)
            .with_context(|| format!("Gas cost in {} overflows", token))?;

        log_gas!(
            "{} gas at {} wei costs {} {}",
            gas_units,
            gas_price_wei,
            cost,
            token
        );
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cost_in_token() {
        let calculator = NativePriceCostCalculator::new();
        calculator.set_native_asset_price_in_token("usdc", dec!(2000));

        // 35000 gas at 30 gwei = 0.00105 native
        let cost = calculator
            .convert_gas_cost_to_token(&"usdc".into(), 30_000_000_000, 35_000)
            .unwrap();
        assert_eq!(cost, dec!(2.1));
    }

    #[test]
    fn test_unknown_token_costs_nothing() {
        let calculator = NativePriceCostCalculator::new();
        let cost = calculator
            .convert_gas_cost_to_token(&"dai".into(), 30_000_000_000, 35_000)
            .unwrap();
        assert_eq!(cost, Decimal::ZERO);
    }

    #[test]
    fn test_price_lookup_is_case_insensitive() {
        let calculator = NativePriceCostCalculator::new();
        calculator.set_native_asset_price_in_token("0xABCD", dec!(1.5));
        assert_eq!(
            calculator.native_asset_price_in_token(&"0xabcd".into()),
            Some(dec!(1.5))
        );
    }
}
