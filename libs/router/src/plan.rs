//! Swap plan assembly
//!
//! Flattens an [`Allocation`] into the externally consumed result: one
//! [`PlannedPath`] per selected path, its hops as contiguous [`SwapStep`]s,
//! and aggregate amounts. [`SwapPlan::to_batch_swap`] encodes the plan as a
//! vault batch swap with raw integer amounts.

use crate::graph::Path;
use crate::optimizer::{Allocation, TracePoint};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sor_amm::{PoolId, SwapType, TokenAddress};
use std::collections::BTreeMap;
use thiserror::Error;

/// One hop of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapStep {
    pub pool_id: PoolId,
    pub token_in: TokenAddress,
    pub token_out: TokenAddress,
    /// Fixed amount of this step; `None` means "whatever the neighbouring hop produces"
    pub amount: Option<Decimal>,
    /// Expected input of the hop
    pub amount_in: Decimal,
    /// Expected output of the hop
    pub amount_out: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPath {
    pub path: Path,
    /// Request-side amount: input for exact-in, output for exact-out
    pub amount: Decimal,
    /// Counter amount: output for exact-in, input for exact-out
    pub result: Decimal,
    pub limit: Decimal,
    pub marginal_price: Decimal,
}

/// Routing result handed to the settlement layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapPlan {
    pub token_in: TokenAddress,
    pub token_out: TokenAddress,
    pub swap_type: SwapType,
    /// Requested amount: input for exact-in, output for exact-out
    pub swap_amount: Decimal,
    /// Counter amount before gas
    pub return_amount: Decimal,
    /// Counter amount with the paths' gas cost applied
    pub return_amount_considering_fees: Decimal,
    /// Common marginal price of the selected paths, tokenIn per tokenOut
    pub marginal_price: Decimal,
    /// Zero-amount price of the best-ranked path
    pub market_spot_price: Decimal,
    pub paths: Vec<PlannedPath>,
    pub steps: Vec<SwapStep>,
    /// Net result per evaluated selection size
    pub trace: Vec<TracePoint>,
    /// Decimals of every token the plan touches
    pub token_decimals: BTreeMap<TokenAddress, u8>,
}

impl SwapPlan {
    /// Build the plan from an optimised allocation
    pub fn assemble(
        token_in: TokenAddress,
        token_out: TokenAddress,
        allocation: &Allocation,
        market_spot_price: Decimal,
        token_decimals: BTreeMap<TokenAddress, u8>,
    ) -> Self {
        let swap_type = allocation.swap_type;
        let mut paths = Vec::with_capacity(allocation.entries.len());
        let mut steps = Vec::new();

        for entry in &allocation.entries {
            let last = entry.path.hops.len().saturating_sub(1);
            for (index, (hop, (amount_in, amount_out))) in
                entry.path.hops.iter().zip(&entry.hop_amounts.0).enumerate()
            {
                let fixed = match swap_type {
                    SwapType::ExactIn => index == 0,
                    SwapType::ExactOut => index == last,
                };
                steps.push(SwapStep {
                    pool_id: hop.pool_id.clone(),
                    token_in: hop.token_in.clone(),
                    token_out: hop.token_out.clone(),
                    amount: fixed.then_some(entry.amount),
                    amount_in: *amount_in,
                    amount_out: *amount_out,
                });
            }
            paths.push(PlannedPath {
                path: entry.path.clone(),
                amount: entry.amount,
                result: entry.result,
                limit: entry.limit,
                marginal_price: entry.marginal_price,
            });
        }

        Self {
            token_in,
            token_out,
            swap_type,
            swap_amount: allocation.total,
            return_amount: allocation.gross_result,
            return_amount_considering_fees: allocation.net_result,
            marginal_price: allocation.marginal_price,
            market_spot_price,
            paths,
            steps,
            trace: allocation.trace.clone(),
            token_decimals,
        }
    }

    /// Total input of the plan
    pub fn amount_in(&self) -> Decimal {
        match self.swap_type {
            SwapType::ExactIn => self.swap_amount,
            SwapType::ExactOut => self.return_amount,
        }
    }

    /// Total output of the plan
    pub fn amount_out(&self) -> Decimal {
        match self.swap_type {
            SwapType::ExactIn => self.return_amount,
            SwapType::ExactOut => self.swap_amount,
        }
    }

    /// Encode as a vault batch swap
    ///
    /// Exact-out paths are emitted last hop first, as the vault resolves
    /// chained exact-out steps backwards. Rounding dust from scaling the
    /// per-path amounts goes to the first path so the raw amounts add up to
    /// the raw requested amount.
    pub fn to_batch_swap(&self) -> Result<BatchSwap, BatchSwapError> {
        let mut token_addresses: Vec<TokenAddress> = Vec::new();
        let mut index_of = |token: &TokenAddress| -> usize {
            match token_addresses.iter().position(|t| t == token) {
                Some(index) => index,
                None => {
                    token_addresses.push(token.clone());
                    token_addresses.len() - 1
                }
            }
        };
        index_of(&self.token_in);
        index_of(&self.token_out);

        let given_token = match self.swap_type {
            SwapType::ExactIn => &self.token_in,
            SwapType::ExactOut => &self.token_out,
        };
        let decimals = self.decimals(given_token)?;
        let raw_total = to_raw(self.swap_amount, decimals)?;
        let mut raw_amounts = self
            .paths
            .iter()
            .map(|path| to_raw(path.amount, decimals))
            .collect::<Result<Vec<_>, _>>()?;
        let dust = raw_total.saturating_sub(raw_amounts.iter().sum::<u128>());
        if let Some(first) = raw_amounts.first_mut() {
            *first += dust;
        }

        let mut swaps = Vec::with_capacity(self.steps.len());
        for (path, raw_amount) in self.paths.iter().zip(raw_amounts) {
            let mut hops: Vec<_> = path.path.hops.iter().collect();
            if self.swap_type == SwapType::ExactOut {
                hops.reverse();
            }
            for (i, hop) in hops.into_iter().enumerate() {
                swaps.push(BatchSwapStep {
                    pool_id: hop.pool_id.clone(),
                    asset_in_index: index_of(&hop.token_in),
                    asset_out_index: index_of(&hop.token_out),
                    amount: if i == 0 { raw_amount } else { 0 },
                });
            }
        }

        Ok(BatchSwap {
            kind: self.swap_type,
            swaps,
            token_addresses,
        })
    }

    fn decimals(&self, token: &TokenAddress) -> Result<u8, BatchSwapError> {
        self.token_decimals
            .get(token)
            .copied()
            .ok_or_else(|| BatchSwapError::UnknownDecimals(token.clone()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchSwapError {
    #[error("No decimals known for token {0}")]
    UnknownDecimals(TokenAddress),

    #[error("Amount {0} does not fit a raw token amount")]
    AmountOutOfRange(Decimal),
}

/// Raw integer amount, rounded down
fn to_raw(amount: Decimal, decimals: u8) -> Result<u128, BatchSwapError> {
    let scale = Decimal::from(10u64.pow(u32::from(decimals.min(19))));
    let mut raw = amount
        .checked_mul(scale)
        .ok_or(BatchSwapError::AmountOutOfRange(amount))?;
    // tokens beyond 19 decimals need a second scaling step
    for _ in 19..decimals {
        raw = raw
            .checked_mul(Decimal::TEN)
            .ok_or(BatchSwapError::AmountOutOfRange(amount))?;
    }
    raw.round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_u128()
        .ok_or(BatchSwapError::AmountOutOfRange(amount))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSwapStep {
    pub pool_id: PoolId,
    pub asset_in_index: usize,
    pub asset_out_index: usize,
    /// Raw amount; 0 chains the previous step's result
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSwap {
    pub kind: SwapType,
    pub swaps: Vec<BatchSwapStep>,
    pub token_addresses: Vec<TokenAddress>,
}
