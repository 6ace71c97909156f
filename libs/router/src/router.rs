//! Router facade
//!
//! Owns the pool snapshot and runs one routing request end to end:
//! candidate paths, scoring, gas conversion, allocation and plan assembly.
//! A request only reads the snapshot; swaps between paths are tracked in a
//! per-request [`BalanceLedger`].

use crate::error::{RouterError, RouterResult};
use crate::gas::GasCostConverter;
use crate::graph::{PoolFilter, PoolGraph};
use crate::ledger::BalanceLedger;
use crate::limits::score_paths;
use crate::optimizer::{AllocationOptimizer, OptimizerConfig};
use crate::plan::SwapPlan;
use crate::{log_success, log_warning};
use rust_decimal::Decimal;
use sor_amm::{Pool, PoolId, PoolType, SwapType, TokenAddress};
use sor_config::RouterConfig;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Per-request routing options
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOptions {
    /// Most paths one allocation may split across
    pub max_pools: usize,
    /// Pool types allowed to take part; `None` allows all
    pub pool_type_filter: Option<Vec<PoolType>>,
    pub max_hops: usize,
    /// Candidate paths kept after enumeration
    pub max_paths: usize,
    /// Gas price in wei
    pub gas_price: u64,
    /// Gas units charged per path
    pub swap_gas: u64,
}

impl From<&RouterConfig> for SwapOptions {
    fn from(config: &RouterConfig) -> Self {
        Self {
            max_pools: config.routing.max_pools,
            pool_type_filter: config.routing.pool_type_filter.clone(),
            max_hops: config.routing.max_hops,
            max_paths: config.routing.max_paths,
            gas_price: config.gas.gas_price_wei,
            swap_gas: config.gas.swap_gas,
        }
    }
}

impl Default for SwapOptions {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl SwapOptions {
    fn validate(&self) -> RouterResult<()> {
        if self.max_pools == 0 {
            return Err(RouterError::InvalidRequest("max_pools must be at least 1".into()));
        }
        if self.max_hops == 0 {
            return Err(RouterError::InvalidRequest("max_hops must be at least 1".into()));
        }
        if self.max_paths == 0 {
            return Err(RouterError::InvalidRequest("max_paths must be at least 1".into()));
        }
        Ok(())
    }
}

/// Smart order router over one pool snapshot
pub struct Router {
    pools: HashMap<PoolId, Pool>,
    gas_converter: Arc<dyn GasCostConverter>,
    optimizer: AllocationOptimizer,
}

impl Router {
    pub fn new(pools: Vec<Pool>, gas_converter: Arc<dyn GasCostConverter>) -> Self {
        let mut router = Self {
            pools: HashMap::new(),
            gas_converter,
            optimizer: AllocationOptimizer::new(OptimizerConfig::default()),
        };
        router.replace_pools(pools);
        router
    }

    /// Build a router with the optimizer settings of `config`
    pub fn from_config(
        pools: Vec<Pool>,
        gas_converter: Arc<dyn GasCostConverter>,
        config: &RouterConfig,
    ) -> Self {
        Self::new(pools, gas_converter)
            .with_optimizer_config(OptimizerConfig::from(&config.optimizer))
    }

    pub fn with_optimizer_config(mut self, config: OptimizerConfig) -> Self {
        self.optimizer = AllocationOptimizer::new(config);
        self
    }

    /// Swap in a new pool snapshot; later pools win on duplicate ids
    pub fn replace_pools(&mut self, pools: Vec<Pool>) {
        self.pools.clear();
        for pool in pools {
            if let Some(previous) = self.pools.insert(pool.id.clone(), pool) {
                log_warning!("Duplicate pool {} in snapshot, keeping the later entry", previous.id);
            }
        }
        info!(pools = self.pools.len(), "Pool snapshot installed");
    }

    pub fn pool(&self, pool_id: &PoolId) -> Option<&Pool> {
        self.pools.get(pool_id)
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Find the best swap plan for `amount` of tokenIn (exact in) or tokenOut (exact out)
    pub fn route(
        &self,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
        swap_type: SwapType,
        amount: Decimal,
        options: &SwapOptions,
    ) -> RouterResult<SwapPlan> {
        let started = Instant::now();
        if amount <= Decimal::ZERO {
            return Err(RouterError::InvalidRequest(format!(
                "swap amount must be positive, got {}",
                amount
            )));
        }
        if token_in == token_out {
            return Err(RouterError::InvalidRequest(format!(
                "token in and token out are both {}",
                token_in
            )));
        }
        options.validate()?;

        let filter = PoolFilter::new(options.pool_type_filter.clone());
        let graph = PoolGraph::new(self.pools.values(), &filter);
        let paths = graph.candidate_paths(token_in, token_out, options.max_hops, options.max_paths)?;

        let ledger = BalanceLedger::new(&self.pools);
        let scored = score_paths(&paths, &ledger, swap_type);
        let Some(best) = scored.first() else {
            return Err(RouterError::AmountExceedsLiquidity {
                requested: amount,
                available: Decimal::ZERO,
            });
        };
        let market_spot_price = best.spot_price;

        // gas is charged in the token the result is measured in
        let cost_token = match swap_type {
            SwapType::ExactIn => token_out,
            SwapType::ExactOut => token_in,
        };
        let gas_cost = self.cost_of_swap_in_token(cost_token, options.gas_price, options.swap_gas)?;

        let allocation = self.optimizer.optimize(
            &scored,
            amount,
            swap_type,
            options.max_pools,
            gas_cost,
            &ledger,
        )?;

        let token_decimals = self.token_decimals(
            allocation
                .entries
                .iter()
                .flat_map(|entry| &entry.path.hops)
                .flat_map(|hop| [(&hop.pool_id, &hop.token_in), (&hop.pool_id, &hop.token_out)]),
        );
        let plan = SwapPlan::assemble(
            token_in.clone(),
            token_out.clone(),
            &allocation,
            market_spot_price,
            token_decimals,
        );

        log_success!(
            "Routed {} {} -> {} ({:?}) over {} paths, return {} ({} after gas)",
            amount,
            token_in,
            token_out,
            swap_type,
            plan.paths.len(),
            plan.return_amount,
            plan.return_amount_considering_fees
        );
        debug!(
            candidates = paths.len(),
            scored = scored.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Route complete"
        );
        Ok(plan)
    }

    /// Gas cost of one swap path expressed in `token`
    pub fn cost_of_swap_in_token(
        &self,
        token: &TokenAddress,
        gas_price: u64,
        swap_gas: u64,
    ) -> RouterResult<Decimal> {
        if gas_price == 0 || swap_gas == 0 {
            return Ok(Decimal::ZERO);
        }
        self.gas_converter
            .convert_gas_cost_to_token(token, gas_price, swap_gas)
            .map_err(RouterError::CostConversion)
    }

    fn token_decimals<'a>(
        &self,
        tokens: impl Iterator<Item = (&'a PoolId, &'a TokenAddress)>,
    ) -> BTreeMap<TokenAddress, u8> {
        let mut decimals = BTreeMap::new();
        for (pool_id, token) in tokens {
            if decimals.contains_key(token) {
                continue;
            }
            if let Some(pool_token) = self.pools.get(pool_id).and_then(|pool| pool.token(token)) {
                decimals.insert(token.clone(), pool_token.decimals);
            }
        }
        decimals
    }
}
