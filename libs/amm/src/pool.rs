//! Immutable pool snapshots
//!
//! A [`Pool`] is the state of one liquidity venue for the duration of a
//! routing request. Balance changes produce a new snapshot through
//! [`Pool::after_swap`]; nothing mutates a pool in place.

use crate::error::{PoolError, PoolResult};
use crate::pair::{ConstantProductPair, PairView, StablePair, WeightedPair};
use crate::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token address, normalised to lower case so lookups are case-insensitive
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TokenAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TokenAddress {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<TokenAddress> for String {
    fn from(value: TokenAddress) -> Self {
        value.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pool identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PoolId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PoolId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pool type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    Weighted,
    /// Weighted pool whose swaps can be switched off by its owner
    LiquidityBootstrapping,
    Stable,
    /// Stable pool over tokens with a known exchange rate to a common unit
    MetaStable,
    /// Plain x*y=k pool
    ConstantProduct,
}

/// One constituent token of a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolToken {
    pub address: TokenAddress,
    /// Balance in human units
    pub balance: Decimal,
    pub decimals: u8,
    /// Weight for weighted pools (any scale, only ratios are used)
    pub weight: Option<Decimal>,
    /// Exchange rate to the pool's common unit (meta stable pools)
    pub price_rate: Decimal,
}

impl PoolToken {
    pub fn new(address: impl Into<TokenAddress>, balance: Decimal, decimals: u8) -> Self {
        Self {
            address: address.into(),
            balance,
            decimals,
            weight: None,
            price_rate: dec!(1),
        }
    }

    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_price_rate(mut self, price_rate: Decimal) -> Self {
        self.price_rate = price_rate;
        self
    }
}

/// Snapshot of one liquidity pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub address: String,
    pub pool_type: PoolType,
    /// Fee as a fraction (0.003 = 0.3%)
    pub swap_fee: Decimal,
    /// Outstanding pool-share supply
    pub total_shares: Decimal,
    pub tokens: Vec<PoolToken>,
    /// Amplification parameter for stable curves
    pub amp: Option<Decimal>,
    pub swap_enabled: bool,
}

impl Pool {
    pub fn new(
        id: impl Into<PoolId>,
        pool_type: PoolType,
        swap_fee: Decimal,
        tokens: Vec<PoolToken>,
    ) -> Self {
        let id = id.into();
        Self {
            address: id.as_str().to_string(),
            id,
            pool_type,
            swap_fee,
            total_shares: dec!(0),
            tokens,
            amp: None,
            swap_enabled: true,
        }
    }

    pub fn with_amp(mut self, amp: Decimal) -> Self {
        self.amp = Some(amp);
        self
    }

    pub fn with_total_shares(mut self, total_shares: Decimal) -> Self {
        self.total_shares = total_shares;
        self
    }

    pub fn with_swap_enabled(mut self, swap_enabled: bool) -> Self {
        self.swap_enabled = swap_enabled;
        self
    }

    pub fn token_index(&self, token: &TokenAddress) -> Option<usize> {
        self.tokens.iter().position(|t| &t.address == token)
    }

    pub fn contains(&self, token: &TokenAddress) -> bool {
        self.token_index(token).is_some()
    }

    pub fn token(&self, token: &TokenAddress) -> Option<&PoolToken> {
        self.tokens.iter().find(|t| &t.address == token)
    }

    fn index_of(&self, token: &TokenAddress) -> PoolResult<usize> {
        self.token_index(token).ok_or_else(|| PoolError::UnknownToken {
            pool_id: self.id.to_string(),
            token: token.to_string(),
        })
    }

    /// Project the pool onto one directed token pair
    pub fn pair_view(&self, token_in: &TokenAddress, token_out: &TokenAddress) -> PoolResult<PairView> {
        let index_in = self.index_of(token_in)?;
        let index_out = self.index_of(token_out)?;
        if index_in == index_out {
            return Err(PoolError::invalid(self.id.as_str(), "token in and token out are the same"));
        }
        if self.swap_fee < dec!(0) || self.swap_fee >= dec!(1) {
            return Err(PoolError::invalid(self.id.as_str(), "swap fee must be in [0, 1)"));
        }

        let input = &self.tokens[index_in];
        let output = &self.tokens[index_out];

        match self.pool_type {
            PoolType::Weighted | PoolType::LiquidityBootstrapping => {
                let (Some(weight_in), Some(weight_out)) = (input.weight, output.weight) else {
                    return Err(PoolError::invalid(self.id.as_str(), "weighted pool token without weight"));
                };
                if weight_in <= dec!(0) || weight_out <= dec!(0) {
                    return Err(PoolError::invalid(self.id.as_str(), "weights must be positive"));
                }
                Ok(PairView::Weighted(WeightedPair {
                    pool_id: self.id.clone(),
                    balance_in: input.balance,
                    balance_out: output.balance,
                    weight_in,
                    weight_out,
                    swap_fee: self.swap_fee,
                }))
            }
            PoolType::Stable | PoolType::MetaStable => {
                let amp = self
                    .amp
                    .filter(|amp| *amp > dec!(0))
                    .ok_or_else(|| PoolError::invalid(self.id.as_str(), "stable pool without amplification"))?;
                let with_rates = self.pool_type == PoolType::MetaStable;
                let rate = |token: &PoolToken| if with_rates { token.price_rate } else { dec!(1) };
                if self.tokens.iter().any(|t| rate(t) <= dec!(0)) {
                    return Err(PoolError::invalid(self.id.as_str(), "price rates must be positive"));
                }
                let balances = self.tokens.iter().map(|t| t.balance * rate(t)).collect();
                let pair = StablePair {
                    pool_id: self.id.clone(),
                    amp,
                    balances,
                    index_in,
                    index_out,
                    rate_in: rate(input),
                    rate_out: rate(output),
                    swap_fee: self.swap_fee,
                };
                Ok(if with_rates {
                    PairView::MetaStable(pair)
                } else {
                    PairView::Stable(pair)
                })
            }
            PoolType::ConstantProduct => Ok(PairView::ConstantProduct(ConstantProductPair {
                pool_id: self.id.clone(),
                balance_in: input.balance,
                balance_out: output.balance,
                swap_fee: self.swap_fee,
            })),
        }
    }

    /// New snapshot with `amount_in` added to `token_in` and `amount_out` removed from `token_out`
    pub fn after_swap(
        &self,
        token_in: &TokenAddress,
        amount_in: Decimal,
        token_out: &TokenAddress,
        amount_out: Decimal,
    ) -> PoolResult<Pool> {
        let index_in = self.index_of(token_in)?;
        let index_out = self.index_of(token_out)?;

        let mut updated = self.clone();
        updated.tokens[index_in].balance += amount_in;
        updated.tokens[index_out].balance -= amount_out;
        if updated.tokens[index_out].balance <= dec!(0) {
            return Err(PoolError::insufficient(
                self.id.as_str(),
                format!("swap drains {} balance", token_out),
            ));
        }

        Ok(updated)
    }
}
