//! Per-request balance ledger
//!
//! Reads go through to the request's pool snapshot until a pool is touched;
//! touched pools are replaced by their post-swap copies so later paths in the
//! same allocation price against updated balances. The snapshot itself is
//! never written.

use crate::graph::Hop;
use rust_decimal::Decimal;
use sor_amm::{PairView, Pool, PoolError, PoolId, PoolResult};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BalanceLedger<'a> {
    snapshot: &'a HashMap<PoolId, Pool>,
    updated: HashMap<PoolId, Pool>,
}

impl<'a> BalanceLedger<'a> {
    pub fn new(snapshot: &'a HashMap<PoolId, Pool>) -> Self {
        Self {
            snapshot,
            updated: HashMap::new(),
        }
    }

    /// Current state of a pool, including swaps applied through this ledger
    pub fn pool(&self, pool_id: &PoolId) -> Option<&Pool> {
        self.updated
            .get(pool_id)
            .or_else(|| self.snapshot.get(pool_id))
    }

    /// Pair view of the hop's pool at its current balances
    pub fn pair(&self, hop: &Hop) -> PoolResult<PairView> {
        self.pool(&hop.pool_id)
            .ok_or_else(|| PoolError::invalid(hop.pool_id.as_str(), "pool not in snapshot"))?
            .pair_view(&hop.token_in, &hop.token_out)
    }

    /// Record a swap through the hop's pool
    pub fn apply_swap(&mut self, hop: &Hop, amount_in: Decimal, amount_out: Decimal) -> PoolResult<()> {
        let updated = self
            .pool(&hop.pool_id)
            .ok_or_else(|| PoolError::invalid(hop.pool_id.as_str(), "pool not in snapshot"))?
            .after_swap(&hop.token_in, amount_in, &hop.token_out, amount_out)?;
        self.updated.insert(hop.pool_id.clone(), updated);
        Ok(())
    }

    pub fn is_touched(&self, pool_id: &PoolId) -> bool {
        self.updated.contains_key(pool_id)
    }
}
