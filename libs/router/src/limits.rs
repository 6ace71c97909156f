//! Path pricing, liquidity limits and ranking
//!
//! A [`PathQuote`] freezes the pair views of a path's hops at the ledger's
//! current balances and chains their prices:
//!
//! - spot price: product of hop spot prices at each hop's amount
//! - derivative: chain rule, walked from tokenIn for exact-in and from
//!   tokenOut for exact-out
//! - limit: smallest hop limit, carried through the intermediate hops
//!
//! All quantities are in the path's request unit: input amounts for
//! exact-in, output amounts for exact-out.

use crate::error::{RouterError, RouterResult};
use crate::graph::Path;
use crate::ledger::BalanceLedger;
use crate::log_metrics;
use rayon::prelude::*;
use rust_decimal::Decimal;
use sor_amm::{PairPricing, PairView, SwapType};
use tracing::debug;

/// Path priced against one ledger state
#[derive(Debug, Clone)]
pub struct PathQuote<'p> {
    path: &'p Path,
    pairs: Vec<PairView>,
}

/// Marginal price of a path and its slope at one amount
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marginal {
    pub spot_price: Decimal,
    pub derivative: Decimal,
}

impl<'p> PathQuote<'p> {
    pub fn new(path: &'p Path, ledger: &BalanceLedger<'_>) -> RouterResult<Self> {
        let pairs = path
            .hops
            .iter()
            .map(|hop| ledger.pair(hop))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RouterError::on_path(&path.id, e))?;
        Ok(Self { path, pairs })
    }

    pub fn path(&self) -> &'p Path {
        self.path
    }

    /// Result of the path for `amount`: output for exact-in, required input for exact-out
    pub fn quote(&self, swap_type: SwapType, amount: Decimal) -> RouterResult<Decimal> {
        Ok(self.hop_amounts(swap_type, amount)?.last_result(swap_type))
    }

    /// Per-hop `(amount_in, amount_out)` in hop order
    pub fn hop_amounts(&self, swap_type: SwapType, amount: Decimal) -> RouterResult<HopAmounts> {
        let mut amounts = vec![(Decimal::ZERO, Decimal::ZERO); self.pairs.len()];
        let mut carried = amount;
        match swap_type {
            SwapType::ExactIn => {
                for (i, pair) in self.pairs.iter().enumerate() {
                    let out = pair.exact_in(carried).map_err(|e| self.fail(e))?;
                    amounts[i] = (carried, out);
                    carried = out;
                }
            }
            SwapType::ExactOut => {
                for (i, pair) in self.pairs.iter().enumerate().rev() {
                    let input = pair.exact_out(carried).map_err(|e| self.fail(e))?;
                    amounts[i] = (input, carried);
                    carried = input;
                }
            }
        }
        Ok(HopAmounts(amounts))
    }

    /// Path spot price and its derivative after trading `amount`
    pub fn marginal(&self, swap_type: SwapType, amount: Decimal) -> RouterResult<Marginal> {
        let hop_amounts = self.hop_amounts(swap_type, amount)?;

        let mut price = Decimal::ONE;
        let mut derivative = Decimal::ZERO;
        // d(hop amount)/d(path amount)
        let mut chain = Decimal::ONE;

        let mut step = |pair: &PairView, hop_amount: Decimal| -> RouterResult<()> {
            let sp = pair
                .spot_price_after_swap(swap_type, hop_amount)
                .map_err(|e| self.fail(e))?;
            let d = pair
                .derivative_spot_price_after_swap(swap_type, hop_amount)
                .map_err(|e| self.fail(e))?;
            if sp <= Decimal::ZERO {
                return Err(self.fail(sor_amm::PoolError::insufficient(
                    pair.pool_id().as_str(),
                    "non-positive spot price",
                )));
            }
            derivative = derivative * sp + price * d * chain;
            price *= sp;
            chain = match swap_type {
                SwapType::ExactIn => chain / sp,
                SwapType::ExactOut => chain * sp,
            };
            Ok(())
        };

        match swap_type {
            SwapType::ExactIn => {
                for (pair, (amount_in, _)) in self.pairs.iter().zip(&hop_amounts.0) {
                    step(pair, *amount_in)?;
                }
            }
            SwapType::ExactOut => {
                for (pair, (_, amount_out)) in self.pairs.iter().zip(&hop_amounts.0).rev() {
                    step(pair, *amount_out)?;
                }
            }
        }

        Ok(Marginal {
            spot_price: price,
            derivative,
        })
    }

    /// Spot price of the path at zero amount
    pub fn spot_price(&self, swap_type: SwapType) -> RouterResult<Decimal> {
        Ok(self.marginal(swap_type, Decimal::ZERO)?.spot_price)
    }

    /// Largest amount the path carries without any hop exceeding its own limit
    pub fn limit(&self, swap_type: SwapType) -> RouterResult<Decimal> {
        match swap_type {
            SwapType::ExactIn => self.exact_in_limit(),
            SwapType::ExactOut => self.exact_out_limit(),
        }
    }

    fn exact_in_limit(&self) -> RouterResult<Decimal> {
        let Some(first) = self.pairs.first() else {
            return Ok(Decimal::ZERO);
        };
        let mut path_limit = first.limit_amount(SwapType::ExactIn);
        // amount entering the current hop when the path trades `path_limit`
        let mut entering = path_limit;

        for k in 1..self.pairs.len() {
            let arriving = self.pairs[k - 1].exact_in(entering).map_err(|e| self.fail(e))?;
            let hop_limit = self.pairs[k].limit_amount(SwapType::ExactIn);
            if arriving > hop_limit {
                // walk the hop limit back to tokenIn
                let mut amount = hop_limit;
                for pair in self.pairs[..k].iter().rev() {
                    amount = pair.exact_out(amount).map_err(|e| self.fail(e))?;
                }
                path_limit = amount;
                entering = hop_limit;
            } else {
                entering = arriving;
            }
        }
        Ok(path_limit)
    }

    fn exact_out_limit(&self) -> RouterResult<Decimal> {
        let Some(last) = self.pairs.last() else {
            return Ok(Decimal::ZERO);
        };
        let n = self.pairs.len();
        let mut path_limit = last.limit_amount(SwapType::ExactOut);
        // amount leaving the current hop when the path delivers `path_limit`
        let mut leaving = path_limit;

        for k in (0..n - 1).rev() {
            let required = self.pairs[k + 1].exact_out(leaving).map_err(|e| self.fail(e))?;
            let hop_limit = self.pairs[k].limit_amount(SwapType::ExactOut);
            if required > hop_limit {
                // walk the hop limit forward to tokenOut
                let mut amount = hop_limit;
                for pair in &self.pairs[k + 1..] {
                    amount = pair.exact_in(amount).map_err(|e| self.fail(e))?;
                }
                path_limit = amount;
                leaving = hop_limit;
            } else {
                leaving = required;
            }
        }
        Ok(path_limit)
    }

    fn fail(&self, error: sor_amm::PoolError) -> RouterError {
        RouterError::on_path(&self.path.id, error)
    }
}

/// Per-hop `(amount_in, amount_out)` of one path trade
#[derive(Debug, Clone, PartialEq)]
pub struct HopAmounts(pub Vec<(Decimal, Decimal)>);

impl HopAmounts {
    /// Output of the last hop for exact-in, input of the first hop for exact-out
    pub fn last_result(&self, swap_type: SwapType) -> Decimal {
        match swap_type {
            SwapType::ExactIn => self.0.last().map(|(_, out)| *out),
            SwapType::ExactOut => self.0.first().map(|(input, _)| *input),
        }
        .unwrap_or(Decimal::ZERO)
    }
}

/// Candidate path with its limit and zero-amount price
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPath {
    pub path: Path,
    pub limit: Decimal,
    pub spot_price: Decimal,
}

/// Price and limit every path, drop unusable ones, best price first
///
/// Paths are scored in parallel; every computation reads the same immutable ledger.
pub fn score_paths(
    paths: &[Path],
    ledger: &BalanceLedger<'_>,
    swap_type: SwapType,
) -> Vec<ScoredPath> {
    let mut scored: Vec<ScoredPath> = paths
        .par_iter()
        .filter_map(|path| {
            let scored = PathQuote::new(path, ledger).and_then(|quote| {
                Ok(ScoredPath {
                    path: path.clone(),
                    limit: quote.limit(swap_type)?,
                    spot_price: quote.spot_price(swap_type)?,
                })
            });
            match scored {
                Ok(scored) if scored.limit > Decimal::ZERO => Some(scored),
                Ok(_) => {
                    debug!(path = %path, "Dropping path with zero limit");
                    None
                }
                Err(e) => {
                    debug!(path = %path, error = %e, "Dropping unpriceable path");
                    None
                }
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        a.spot_price
            .cmp(&b.spot_price)
            .then_with(|| a.path.id.cmp(&b.path.id))
    });

    log_metrics!(
        "Scored {} of {} paths for {:?}",
        scored.len(),
        paths.len(),
        swap_type
    );
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Hop;
    use rust_decimal_macros::dec;
    use sor_amm::{Pool, PoolId, PoolToken, PoolType};
    use std::collections::HashMap;

    fn weighted(id: &str, a: (&str, Decimal), b: (&str, Decimal)) -> Pool {
        Pool::new(
            id,
            PoolType::Weighted,
            dec!(0.003),
            vec![
                PoolToken::new(a.0, a.1, 18).with_weight(dec!(0.5)),
                PoolToken::new(b.0, b.1, 18).with_weight(dec!(0.5)),
            ],
        )
    }

    fn snapshot(pools: Vec<Pool>) -> HashMap<PoolId, Pool> {
        pools.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn hop(pool: &str, token_in: &str, token_out: &str) -> Hop {
        Hop {
            pool_id: pool.into(),
            token_in: token_in.into(),
            token_out: token_out.into(),
        }
    }

    fn close(a: Decimal, b: Decimal, rel: Decimal) -> bool {
        (a - b).abs() <= b.abs() * rel
    }

    #[test]
    fn test_two_hop_quote_chains_hops() {
        let snapshot = snapshot(vec![
            weighted("p1", ("a", dec!(100)), ("c", dec!(100))),
            weighted("p2", ("c", dec!(100)), ("b", dec!(200))),
        ]);
        let ledger = BalanceLedger::new(&snapshot);
        let path = Path::new(vec![hop("p1", "a", "c"), hop("p2", "c", "b")]);
        let quote = PathQuote::new(&path, &ledger).unwrap();

        let mid = ledger.pair(&path.hops[0]).unwrap().exact_in(dec!(5)).unwrap();
        let expected = ledger.pair(&path.hops[1]).unwrap().exact_in(mid).unwrap();
        assert_eq!(quote.quote(SwapType::ExactIn, dec!(5)).unwrap(), expected);

        let input = quote.quote(SwapType::ExactOut, expected).unwrap();
        assert!(close(input, dec!(5), dec!(0.000000001)));
    }

    #[test]
    fn test_chained_derivative_matches_finite_difference() {
        let snapshot = snapshot(vec![
            weighted("p1", ("a", dec!(100)), ("c", dec!(150))),
            weighted("p2", ("c", dec!(120)), ("b", dec!(200))),
        ]);
        let ledger = BalanceLedger::new(&snapshot);
        let path = Path::new(vec![hop("p1", "a", "c"), hop("p2", "c", "b")]);
        let quote = PathQuote::new(&path, &ledger).unwrap();

        for swap_type in [SwapType::ExactIn, SwapType::ExactOut] {
            let a = dec!(8);
            let h = dec!(0.0001);
            let up = quote.marginal(swap_type, a + h).unwrap().spot_price;
            let down = quote.marginal(swap_type, a - h).unwrap().spot_price;
            let numeric = (up - down) / (dec!(2) * h);
            let analytic = quote.marginal(swap_type, a).unwrap().derivative;
            assert!(close(analytic, numeric, dec!(0.0001)), "{swap_type:?}: {analytic} vs {numeric}");
        }
    }

    #[test]
    fn test_path_spot_price_is_inverse_marginal_rate() {
        let snapshot = snapshot(vec![
            weighted("p1", ("a", dec!(100)), ("c", dec!(150))),
            weighted("p2", ("c", dec!(120)), ("b", dec!(200))),
        ]);
        let ledger = BalanceLedger::new(&snapshot);
        let path = Path::new(vec![hop("p1", "a", "c"), hop("p2", "c", "b")]);
        let quote = PathQuote::new(&path, &ledger).unwrap();

        let a = dec!(3);
        let h = dec!(0.00001);
        let rate = (quote.quote(SwapType::ExactIn, a + h).unwrap()
            - quote.quote(SwapType::ExactIn, a - h).unwrap())
            / (dec!(2) * h);
        let price = quote.marginal(SwapType::ExactIn, a).unwrap().spot_price;
        assert!(close(price, dec!(1) / rate, dec!(0.00001)));
    }

    #[test]
    fn test_limit_is_bounded_by_second_hop() {
        // first hop is deep, second hop shallow: the second hop binds
        let snapshot = snapshot(vec![
            weighted("p1", ("a", dec!(10000)), ("c", dec!(10000))),
            weighted("p2", ("c", dec!(10)), ("b", dec!(10))),
        ]);
        let ledger = BalanceLedger::new(&snapshot);
        let path = Path::new(vec![hop("p1", "a", "c"), hop("p2", "c", "b")]);
        let quote = PathQuote::new(&path, &ledger).unwrap();

        let limit = quote.limit(SwapType::ExactIn).unwrap();
        let reaching_second = ledger.pair(&path.hops[0]).unwrap().exact_in(limit).unwrap();
        assert!(close(reaching_second, dec!(3), dec!(0.000000001)));

        let out_limit = quote.limit(SwapType::ExactOut).unwrap();
        assert_eq!(out_limit, dec!(3));
    }

    #[test]
    fn test_score_paths_orders_by_price() {
        let snapshot = snapshot(vec![
            weighted("p1", ("a", dec!(100)), ("b", dec!(100))),
            weighted("p2", ("a", dec!(50)), ("b", dec!(200))),
        ]);
        let ledger = BalanceLedger::new(&snapshot);
        let paths = vec![
            Path::new(vec![hop("p1", "a", "b")]),
            Path::new(vec![hop("p2", "a", "b")]),
        ];
        let scored = score_paths(&paths, &ledger, SwapType::ExactIn);
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].path.id, "p2");
        assert_eq!(scored[0].limit, dec!(15));
        assert!(scored[0].spot_price < scored[1].spot_price);
    }

    #[test]
    fn test_score_paths_drops_broken_pools() {
        let mut empty = weighted("p1", ("a", dec!(100)), ("b", dec!(100)));
        empty.tokens[1].balance = dec!(0);
        let snapshot = snapshot(vec![empty, weighted("p2", ("a", dec!(50)), ("b", dec!(200)))]);
        let ledger = BalanceLedger::new(&snapshot);
        let paths = vec![
            Path::new(vec![hop("p1", "a", "b")]),
            Path::new(vec![hop("p2", "a", "b")]),
        ];
        let scored = score_paths(&paths, &ledger, SwapType::ExactIn);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].path.id, "p2");
    }
}
