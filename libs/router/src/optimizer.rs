//! Allocation optimizer
//!
//! Splits the requested amount across ranked candidate paths so the net
//! result (output minus gas for exact-in, input plus gas for exact-out) is
//! optimal for the selected set.
//!
//! The selection grows in rank order. Each selection whose limits can cover
//! the total is split by equalising marginal prices: a common price `p` is
//! searched for (safeguarded Newton on `Σ aᵢ(p) = total`) and every path's
//! amount is solved from `SPᵢ(aᵢ) = p` inside `[0, limitᵢ]`. Paths are
//! solved in selection order, each against the balances the paths ahead of
//! it leave behind, so a pool shared by two paths is never priced twice from
//! the same state. Paths whose price never reaches `p` get nothing; paths
//! still cheaper at their limit are clamped there and the remainder is
//! redistributed by the same search.
//!
//! Growth stops at the first selection that does not improve the net
//! result, at `max_pools`, or when candidates run out.

use crate::error::{RouterError, RouterResult};
use crate::graph::Path;
use crate::ledger::BalanceLedger;
use crate::limits::{HopAmounts, Marginal, PathQuote, ScoredPath};
use crate::{log_route, log_warning};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sor_amm::{PoolError, SwapType};
use sor_config::{defaults, OptimizerSettings};
use tracing::debug;

/// Fractional digits kept on allocated amounts
const AMOUNT_DP: u32 = 18;

/// Smallest amount bracket the per-path solver distinguishes
const AMOUNT_EPSILON: Decimal = dec!(0.000000000000000001);

/// Configuration for the equalisation search
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Iteration cap for the common-price search and for each per-path solve
    pub max_iterations: usize,
    /// Relative marginal-price tolerance between selected paths
    pub tolerance: Decimal,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: defaults::optimizer::MAX_ITERATIONS,
            tolerance: defaults::optimizer::TOLERANCE,
        }
    }
}

impl From<&OptimizerSettings> for OptimizerConfig {
    fn from(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            tolerance: settings.tolerance,
        }
    }
}

/// Amount assigned to one path and what it yields
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationEntry {
    pub path: Path,
    pub amount: Decimal,
    /// Path limit on the balances left by earlier paths
    pub limit: Decimal,
    /// Output for exact-in, required input for exact-out
    pub result: Decimal,
    /// Path marginal price at `amount`, after earlier paths' swaps
    pub marginal_price: Decimal,
    /// Per-hop amounts after earlier paths' swaps were applied
    pub hop_amounts: HopAmounts,
}

/// Net result of one evaluated selection size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub paths: usize,
    pub net_result: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub swap_type: SwapType,
    pub total: Decimal,
    pub entries: Vec<AllocationEntry>,
    pub gross_result: Decimal,
    pub net_result: Decimal,
    pub gas_cost_per_path: Decimal,
    /// Common marginal price of the selected paths
    pub marginal_price: Decimal,
    pub trace: Vec<TracePoint>,
}

impl Allocation {
    pub fn allocated(&self) -> Decimal {
        self.entries.iter().map(|entry| entry.amount).sum()
    }
}

fn is_better(swap_type: SwapType, candidate: Decimal, incumbent: Decimal) -> bool {
    match swap_type {
        SwapType::ExactIn => candidate > incumbent,
        SwapType::ExactOut => candidate < incumbent,
    }
}

/// Finds the amount split across candidate paths
pub struct AllocationOptimizer {
    config: OptimizerConfig,
}

impl AllocationOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Choose paths from `candidates` (best first) and split `total` across them
    ///
    /// `gas_cost_per_path` is in the result token: tokenOut for exact-in,
    /// tokenIn for exact-out.
    pub fn optimize(
        &self,
        candidates: &[ScoredPath],
        total: Decimal,
        swap_type: SwapType,
        max_pools: usize,
        gas_cost_per_path: Decimal,
        ledger: &BalanceLedger<'_>,
    ) -> RouterResult<Allocation> {
        let mut selected: Vec<&ScoredPath> = Vec::with_capacity(max_pools);
        let mut best: Option<Allocation> = None;
        let mut trace = Vec::new();
        let mut available = Decimal::ZERO;

        for candidate in candidates {
            if selected.len() >= max_pools {
                break;
            }
            selected.push(candidate);

            let capacity: Decimal = selected.iter().map(|s| s.limit).sum();
            if capacity < total {
                available = available.max(capacity);
                log_route!(
                    "{} paths cover {} of {}, adding more",
                    selected.len(),
                    capacity,
                    total
                );
                continue;
            }

            match self.evaluate(&selected, total, swap_type, gas_cost_per_path, ledger) {
                Ok(allocation) => {
                    trace.push(TracePoint {
                        paths: selected.len(),
                        net_result: allocation.net_result,
                    });
                    let improves = best.as_ref().map_or(true, |incumbent| {
                        is_better(swap_type, allocation.net_result, incumbent.net_result)
                    });
                    if !improves {
                        log_route!(
                            "Path {} does not improve net result, keeping {} paths",
                            candidate.path,
                            selected.len() - 1
                        );
                        break;
                    }
                    best = Some(allocation);
                }
                Err(RouterError::AmountExceedsLiquidity { available: live, .. }) => {
                    // shared pools leave later paths less room than their snapshot limits
                    available = available.max(live);
                    log_route!(
                        "{} paths carry only {} of {} after sequential swaps, adding more",
                        selected.len(),
                        live,
                        total
                    );
                }
                Err(RouterError::InsufficientLiquidity { path, source }) => {
                    log_warning!("Dropping path {} from selection: {}", path, source);
                    match selected.iter().rposition(|s| s.path.id == path) {
                        Some(index) => {
                            selected.remove(index);
                        }
                        None => {
                            selected.pop();
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        match best {
            Some(mut allocation) => {
                allocation.trace = trace;
                Ok(allocation)
            }
            None => Err(RouterError::AmountExceedsLiquidity {
                requested: total,
                available,
            }),
        }
    }

    /// Split `total` across `selected`, then price the split sequentially
    fn evaluate(
        &self,
        selected: &[&ScoredPath],
        total: Decimal,
        swap_type: SwapType,
        gas_cost_per_path: Decimal,
        ledger: &BalanceLedger<'_>,
    ) -> RouterResult<Allocation> {
        let (amounts, limits) = if selected.len() == 1 {
            (vec![total], vec![selected[0].limit])
        } else {
            let sweep = self.equalize(selected, total, swap_type, ledger)?;
            (sweep.amounts, sweep.limits)
        };
        let amounts = conserve(&amounts, &limits, total);

        // Later paths see the balances left by earlier ones
        let mut scoped = ledger.clone();
        let mut entries = Vec::with_capacity(selected.len());
        for (scored, amount) in selected.iter().zip(amounts) {
            if amount.is_zero() {
                continue;
            }
            let path = &scored.path;
            let quote = PathQuote::new(path, &scoped)?;
            let limit = quote.limit(swap_type)?;
            if amount > limit {
                return Err(RouterError::on_path(
                    &path.id,
                    PoolError::insufficient(path.id.as_str(), format!("{amount} above limit {limit}")),
                ));
            }
            let hop_amounts = quote.hop_amounts(swap_type, amount)?;
            let marginal_price = quote.marginal(swap_type, amount)?.spot_price;
            apply_hops(&mut scoped, path, &hop_amounts)?;

            entries.push(AllocationEntry {
                path: path.clone(),
                amount,
                limit,
                result: hop_amounts.last_result(swap_type),
                marginal_price,
                hop_amounts,
            });
        }

        let gross_result: Decimal = entries.iter().map(|entry| entry.result).sum();
        let gas = gas_cost_per_path * Decimal::from(entries.len() as u64);
        let net_result = match swap_type {
            SwapType::ExactIn => gross_result - gas,
            SwapType::ExactOut => gross_result + gas,
        };
        let marginal_price = entries
            .iter()
            .map(|entry| entry.marginal_price)
            .max()
            .unwrap_or_default();

        debug!(
            paths = entries.len(),
            %gross_result,
            %net_result,
            %marginal_price,
            "Evaluated selection"
        );

        Ok(Allocation {
            swap_type,
            total,
            entries,
            gross_result,
            net_result,
            gas_cost_per_path,
            marginal_price,
            trace: Vec::new(),
        })
    }

    /// Amounts that equalise the paths' marginal prices and sum to `total`
    ///
    /// Each path is priced on the balances left by the paths ahead of it, so
    /// the split is searched on sweeps rather than on one frozen quote set.
    fn equalize(
        &self,
        selected: &[&ScoredPath],
        total: Decimal,
        swap_type: SwapType,
        ledger: &BalanceLedger<'_>,
    ) -> RouterResult<Sweep> {
        let tolerance = self.config.tolerance;

        let mut at_zero = Vec::with_capacity(selected.len());
        let mut p_hi = Decimal::ZERO;
        for scored in selected {
            let quote = PathQuote::new(&scored.path, ledger)?;
            at_zero.push(quote.marginal(swap_type, Decimal::ZERO)?);
            p_hi = p_hi.max(quote.marginal(swap_type, scored.limit)?.spot_price);
        }
        // no path trades below the cheapest opening price
        let mut p_lo = at_zero
            .iter()
            .map(|m| m.spot_price)
            .min()
            .unwrap_or_default();

        // earlier swaps can push later paths' prices up, so widen until A(p_hi) >= total
        let mut upper = self.sweep(selected, p_hi, swap_type, ledger, &[])?;
        let mut widenings = 0;
        while upper.allocated() < total && !upper.saturated() {
            widenings += 1;
            if widenings > self.config.max_iterations {
                return Err(RouterError::OptimizationDidNotConverge {
                    iterations: self.config.max_iterations,
                });
            }
            p_lo = p_hi;
            p_hi *= dec!(2);
            upper = self.sweep(selected, p_hi, swap_type, ledger, &[])?;
        }
        if upper.allocated() < total {
            return Err(RouterError::AmountExceedsLiquidity {
                requested: total,
                available: upper.allocated(),
            });
        }
        if upper.allocated() == total {
            return Ok(upper);
        }

        let mut price = initial_price(&at_zero, total);
        if price <= p_lo || price >= p_hi {
            price = (p_lo + p_hi) / dec!(2);
        }

        let mut warm = Vec::new();
        for iteration in 1..=self.config.max_iterations {
            let sweep = self.sweep(selected, price, swap_type, ledger, &warm)?;
            let residual = total - sweep.allocated();
            // the residual may land on a single path, so bound its price move there
            let converged = residual.is_zero()
                || (sweep.steepest > Decimal::ZERO
                    && residual.abs() * sweep.steepest <= tolerance * price / dec!(4))
                || p_hi - p_lo <= tolerance * price / dec!(4);
            if converged {
                log_route!(
                    "Equalised {} paths at price {} after {} iterations",
                    selected.len(),
                    price,
                    iteration
                );
                return Ok(sweep);
            }

            if residual > Decimal::ZERO {
                p_lo = price;
            } else {
                p_hi = price;
            }
            let newton = (sweep.slope > Decimal::ZERO).then(|| price + residual / sweep.slope);
            price = match newton {
                Some(next) if next > p_lo && next < p_hi => next,
                _ => (p_lo + p_hi) / dec!(2),
            };
            warm = sweep.amounts;
        }

        Err(RouterError::OptimizationDidNotConverge {
            iterations: self.config.max_iterations,
        })
    }

    /// Fill every path up to `price` in selection order on a forked ledger
    ///
    /// `warm` holds the previous sweep's amounts, or is empty.
    fn sweep(
        &self,
        selected: &[&ScoredPath],
        price: Decimal,
        swap_type: SwapType,
        ledger: &BalanceLedger<'_>,
        warm: &[Decimal],
    ) -> RouterResult<Sweep> {
        let mut scoped = ledger.clone();
        let mut sweep = Sweep {
            amounts: Vec::with_capacity(selected.len()),
            limits: Vec::with_capacity(selected.len()),
            slope: Decimal::ZERO,
            steepest: Decimal::ZERO,
        };

        for (i, scored) in selected.iter().enumerate() {
            let quote = PathQuote::new(&scored.path, &scoped)?;
            let limit = quote.limit(swap_type)?;
            let at_zero = quote.marginal(swap_type, Decimal::ZERO)?;
            let price_at_limit = quote.marginal(swap_type, limit)?.spot_price;
            let warm_start = warm.get(i).copied().unwrap_or_default();

            let (amount, derivative) = self.solve_path_amount(
                &quote,
                swap_type,
                price,
                at_zero,
                price_at_limit,
                limit,
                warm_start,
            )?;
            if amount > Decimal::ZERO {
                let hop_amounts = quote.hop_amounts(swap_type, amount)?;
                apply_hops(&mut scoped, &scored.path, &hop_amounts)?;
            }
            if let Some(derivative) = derivative {
                sweep.slope += Decimal::ONE / derivative;
                sweep.steepest = sweep.steepest.max(derivative);
            }
            sweep.amounts.push(amount);
            sweep.limits.push(limit);
        }
        Ok(sweep)
    }

    /// Amount at which one path's marginal price reaches `price`
    ///
    /// Returns the amount and, when it lies strictly inside `[0, limit]`, the
    /// price derivative there.
    #[allow(clippy::too_many_arguments)]
    fn solve_path_amount(
        &self,
        quote: &PathQuote<'_>,
        swap_type: SwapType,
        price: Decimal,
        at_zero: Marginal,
        price_at_limit: Decimal,
        limit: Decimal,
        warm_start: Decimal,
    ) -> RouterResult<(Decimal, Option<Decimal>)> {
        if price <= at_zero.spot_price {
            return Ok((Decimal::ZERO, None));
        }
        if price >= price_at_limit {
            return Ok((limit, None));
        }

        let tolerance = self.config.tolerance * price / dec!(4);
        let (mut lo, mut hi) = (Decimal::ZERO, limit);
        let mut amount = if warm_start > lo && warm_start < hi {
            warm_start
        } else if at_zero.derivative > Decimal::ZERO {
            ((price - at_zero.spot_price) / at_zero.derivative).min(limit / dec!(2))
        } else {
            limit / dec!(2)
        };

        for _ in 0..self.config.max_iterations {
            let marginal = quote.marginal(swap_type, amount)?;
            let gap = marginal.spot_price - price;
            let derivative = (marginal.derivative > Decimal::ZERO).then_some(marginal.derivative);
            if gap.abs() <= tolerance {
                return Ok((amount, derivative));
            }

            if gap < Decimal::ZERO {
                lo = amount;
            } else {
                hi = amount;
            }
            if hi - lo <= AMOUNT_EPSILON {
                return Ok((amount, derivative));
            }

            amount = match derivative.map(|d| amount - gap / d) {
                Some(next) if next > lo && next < hi => next,
                _ => (lo + hi) / dec!(2),
            };
        }

        debug!(path = %quote.path(), %price, "Per-path price solve ran out of iterations");
        Err(RouterError::OptimizationDidNotConverge {
            iterations: self.config.max_iterations,
        })
    }
}

/// Amounts every path takes at one common price
#[derive(Debug, Clone)]
struct Sweep {
    amounts: Vec<Decimal>,
    /// Path limits on the balances each path actually trades on
    limits: Vec<Decimal>,
    /// dA/dp over paths strictly inside their bounds
    slope: Decimal,
    steepest: Decimal,
}

impl Sweep {
    fn allocated(&self) -> Decimal {
        self.amounts.iter().copied().sum()
    }

    fn saturated(&self) -> bool {
        self.amounts.iter().zip(&self.limits).all(|(amount, limit)| amount >= limit)
    }
}

fn apply_hops(ledger: &mut BalanceLedger<'_>, path: &Path, hop_amounts: &HopAmounts) -> RouterResult<()> {
    for (hop, (amount_in, amount_out)) in path.hops.iter().zip(&hop_amounts.0) {
        ledger
            .apply_swap(hop, *amount_in, *amount_out)
            .map_err(|e| RouterError::on_path(&path.id, e))?;
    }
    Ok(())
}

/// Common price if every path were linear at zero amount
fn initial_price(at_zero: &[Marginal], total: Decimal) -> Decimal {
    let (weighted, inverse) = at_zero
        .iter()
        .filter(|m| m.derivative > Decimal::ZERO)
        .fold((total, Decimal::ZERO), |(weighted, inverse), m| {
            (weighted + m.spot_price / m.derivative, inverse + Decimal::ONE / m.derivative)
        });
    if inverse.is_zero() {
        Decimal::ZERO
    } else {
        weighted / inverse
    }
}

/// Round amounts and move the residual so they sum to `total` within limits
fn conserve(amounts: &[Decimal], limits: &[Decimal], total: Decimal) -> Vec<Decimal> {
    let mut amounts: Vec<Decimal> = amounts
        .iter()
        .zip(limits)
        .map(|(amount, limit)| {
            amount
                .round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::ToZero)
                .min(*limit)
                .max(Decimal::ZERO)
        })
        .collect();

    let mut residual = total - amounts.iter().copied().sum::<Decimal>();
    if residual.is_zero() {
        return amounts;
    }

    let mut order: Vec<usize> = (0..amounts.len()).collect();
    if residual > Decimal::ZERO {
        // paths already in use first, then most slack
        order.sort_by(|&a, &b| {
            (amounts[b] > Decimal::ZERO)
                .cmp(&(amounts[a] > Decimal::ZERO))
                .then((limits[b] - amounts[b]).cmp(&(limits[a] - amounts[a])))
                .then(a.cmp(&b))
        });
        for i in order {
            let take = residual.min(limits[i] - amounts[i]);
            amounts[i] += take;
            residual -= take;
            if residual.is_zero() {
                break;
            }
        }
    } else {
        // largest amount first
        order.sort_by(|&a, &b| amounts[b].cmp(&amounts[a]).then(a.cmp(&b)));
        for i in order {
            let give = (-residual).min(amounts[i]);
            amounts[i] -= give;
            residual += give;
            if residual.is_zero() {
                break;
            }
        }
    }
    amounts
}
