//! Pair-pool graph and candidate path enumeration
//!
//! Tokens are nodes and pools are edges. Paths are enumerated depth first
//! over simple token sequences; adjacency lists are kept sorted by pool id
//! so enumeration order never depends on hash map iteration.

use crate::error::{RouterError, RouterResult};
use crate::log_search;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sor_amm::{PairPricing, Pool, PoolId, PoolType, TokenAddress};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// One swap through one pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    pub pool_id: PoolId,
    pub token_in: TokenAddress,
    pub token_out: TokenAddress,
}

/// Position of a hop inside its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapPairType {
    /// Single-hop path
    Direct,
    /// First hop of a multi-hop path, tokenIn to an intermediate token
    HopIn,
    /// Middle hop, intermediate to intermediate
    Intermediate,
    /// Last hop of a multi-hop path, intermediate token to tokenOut
    HopOut,
}

/// Ordered sequence of hops from tokenIn to tokenOut
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    /// Pool ids joined by `-`
    pub id: String,
    pub hops: Vec<Hop>,
}

impl Path {
    pub fn new(hops: Vec<Hop>) -> Self {
        let id = hops
            .iter()
            .map(|hop| hop.pool_id.as_str())
            .collect::<Vec<_>>()
            .join("-");
        Self { id, hops }
    }

    pub fn token_in(&self) -> Option<&TokenAddress> {
        self.hops.first().map(|hop| &hop.token_in)
    }

    pub fn token_out(&self) -> Option<&TokenAddress> {
        self.hops.last().map(|hop| &hop.token_out)
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn uses_pool(&self, pool_id: &PoolId) -> bool {
        self.hops.iter().any(|hop| &hop.pool_id == pool_id)
    }

    pub fn pair_type(&self, index: usize) -> SwapPairType {
        match (self.hops.len(), index) {
            (1, _) => SwapPairType::Direct,
            (_, 0) => SwapPairType::HopIn,
            (n, i) if i + 1 == n => SwapPairType::HopOut,
            _ => SwapPairType::Intermediate,
        }
    }

    /// Token sequence, used to order paths that share a pool sequence
    fn tokens(&self) -> impl Iterator<Item = &TokenAddress> {
        self.token_in()
            .into_iter()
            .chain(self.hops.iter().map(|hop| &hop.token_out))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let (Some(token_in), Some(token_out)) = (self.token_in(), self.token_out()) {
            write!(f, " ({} -> {})", token_in, token_out)?;
        }
        Ok(())
    }
}

/// Which pools may take part in routing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolFilter {
    /// Allowed pool types; `None` allows all
    pub pool_types: Option<Vec<PoolType>>,
}

impl PoolFilter {
    pub fn new(pool_types: Option<Vec<PoolType>>) -> Self {
        Self { pool_types }
    }

    pub fn allows(&self, pool: &Pool) -> bool {
        if !pool.swap_enabled || pool.tokens.len() < 2 {
            return false;
        }
        match &self.pool_types {
            Some(types) => types.contains(&pool.pool_type),
            None => true,
        }
    }
}

/// Token adjacency over a borrowed pool set
pub struct PoolGraph<'a> {
    by_token: BTreeMap<&'a TokenAddress, Vec<&'a Pool>>,
    pool_count: usize,
}

impl<'a> PoolGraph<'a> {
    pub fn new(pools: impl IntoIterator<Item = &'a Pool>, filter: &PoolFilter) -> Self {
        let mut by_token: BTreeMap<&'a TokenAddress, Vec<&'a Pool>> = BTreeMap::new();
        let mut pool_count = 0;

        for pool in pools.into_iter().filter(|pool| filter.allows(pool)) {
            pool_count += 1;
            for token in &pool.tokens {
                by_token.entry(&token.address).or_default().push(pool);
            }
        }
        for pools in by_token.values_mut() {
            pools.sort_by(|a, b| a.id.cmp(&b.id));
            pools.dedup_by(|a, b| a.id == b.id);
        }

        debug!(pools = pool_count, tokens = by_token.len(), "Pool graph built");
        Self {
            by_token,
            pool_count,
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pool_count
    }

    pub fn token_count(&self) -> usize {
        self.by_token.len()
    }

    /// Enumerate simple paths of at most `max_hops` hops, keeping the `max_paths` most liquid
    pub fn candidate_paths(
        &self,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
        max_hops: usize,
        max_paths: usize,
    ) -> RouterResult<Vec<Path>> {
        let mut search = Search::new(max_paths);
        let mut hops = Vec::with_capacity(max_hops);
        let mut visited = vec![token_in];
        self.extend(token_in, token_out, max_hops, None, &mut hops, &mut visited, &mut search);

        if search.found.is_empty() {
            return Err(RouterError::NoPathFound {
                token_in: token_in.clone(),
                token_out: token_out.clone(),
            });
        }

        let mut ranked = search.found;
        ranked.sort_by(|(la, pa), (lb, pb)| {
            lb.cmp(la)
                .then_with(|| pa.id.cmp(&pb.id))
                .then_with(|| pa.tokens().cmp(pb.tokens()))
        });

        let total = ranked.len();
        ranked.truncate(max_paths);
        log_search!(
            "{} candidate paths {} -> {} (kept {})",
            total,
            token_in,
            token_out,
            ranked.len()
        );

        if ranked.is_empty() {
            return Err(RouterError::NoPathFound {
                token_in: token_in.clone(),
                token_out: token_out.clone(),
            });
        }
        Ok(ranked.into_iter().map(|(_, path)| path).collect())
    }

    /// Depth-first extension of `hops` from `current`
    ///
    /// `bottleneck` is the smallest normalized liquidity of the hops so far.
    /// It only shrinks as hops are added, so a prefix already below the
    /// `max_paths`-th best complete path is abandoned.
    #[allow(clippy::too_many_arguments)]
    fn extend<'b>(
        &'b self,
        current: &'b TokenAddress,
        target: &TokenAddress,
        max_hops: usize,
        bottleneck: Option<Decimal>,
        hops: &mut Vec<Hop>,
        visited: &mut Vec<&'b TokenAddress>,
        search: &mut Search,
    ) {
        let Some(pools) = self.by_token.get(current) else {
            return;
        };

        for pool in pools {
            if hops.iter().any(|hop| hop.pool_id == pool.id) {
                continue;
            }
            for token in &pool.tokens {
                let next = &token.address;
                if next == current || visited.contains(&next) {
                    continue;
                }
                let liquidity = match pool.pair_view(current, next) {
                    Ok(pair) => pair.normalized_liquidity(),
                    Err(e) => {
                        debug!(pool = %pool.id, error = %e, "Skipping unpriceable hop");
                        continue;
                    }
                };
                let bottleneck = bottleneck.map_or(liquidity, |b| b.min(liquidity));
                if search.floor().is_some_and(|floor| bottleneck < floor) {
                    continue;
                }

                hops.push(Hop {
                    pool_id: pool.id.clone(),
                    token_in: current.clone(),
                    token_out: next.clone(),
                });
                if next == target {
                    search.record(bottleneck, Path::new(hops.clone()));
                } else if hops.len() < max_hops {
                    visited.push(next);
                    self.extend(next, target, max_hops, Some(bottleneck), hops, visited, search);
                    visited.pop();
                }
                hops.pop();
            }
        }
    }
}

/// Complete paths found so far with their bottleneck liquidity
struct Search {
    found: Vec<(Decimal, Path)>,
    /// Best bottlenecks seen, descending, at most `max_paths` long
    best: Vec<Decimal>,
    max_paths: usize,
}

impl Search {
    fn new(max_paths: usize) -> Self {
        Self {
            found: Vec::new(),
            best: Vec::with_capacity(max_paths),
            max_paths,
        }
    }

    /// Bottleneck a new path must reach to make the final cut
    fn floor(&self) -> Option<Decimal> {
        self.best.get(self.max_paths.checked_sub(1)?).copied()
    }

    fn record(&mut self, bottleneck: Decimal, path: Path) {
        let at = self.best.partition_point(|b| *b >= bottleneck);
        self.best.insert(at, bottleneck);
        self.best.truncate(self.max_paths);
        self.found.push((bottleneck, path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sor_amm::PoolToken;

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

    fn pools() -> Vec<Pool> {
        vec![
            weighted("p1", ("a", dec!(100)), ("b", dec!(100))),
            weighted("p2", ("a", dec!(50)), ("b", dec!(200))),
            weighted("p3", ("a", dec!(1000)), ("c", dec!(1000))),
            weighted("p4", ("c", dec!(1000)), ("b", dec!(1000))),
            weighted("p5", ("d", dec!(10)), ("e", dec!(10))),
        ]
    }

    #[test]
    fn test_direct_and_hop_paths() {
        let pools = pools();
        let graph = PoolGraph::new(&pools, &PoolFilter::default());
        let paths = graph
            .candidate_paths(&"a".into(), &"b".into(), 2, 10)
            .unwrap();

        let ids: Vec<&str> = paths.iter().map(|p| p.id.as_str()).collect();
        // p3-p4 has the deepest bottleneck (500), then p2 (200 * 0.5), then p1 (50)
        assert_eq!(ids, vec!["p3-p4", "p2", "p1"]);
        assert_eq!(paths[0].pair_type(0), SwapPairType::HopIn);
        assert_eq!(paths[0].pair_type(1), SwapPairType::HopOut);
        assert_eq!(paths[1].pair_type(0), SwapPairType::Direct);
    }

    #[test]
    fn test_max_hops_and_max_paths() {
        let pools = pools();
        let graph = PoolGraph::new(&pools, &PoolFilter::default());

        let direct = graph.candidate_paths(&"a".into(), &"b".into(), 1, 10).unwrap();
        assert!(direct.iter().all(|p| p.len() == 1));

        let capped = graph.candidate_paths(&"a".into(), &"b".into(), 2, 1).unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, "p3-p4");
    }

    #[test]
    fn test_capped_search_matches_full_ranking() {
        // every token pair connected, at assorted depths
        let tokens = ["a", "b", "c", "d", "e"];
        let mut pools = Vec::new();
        for (i, x) in tokens.iter().enumerate() {
            for (j, y) in tokens.iter().enumerate().skip(i + 1) {
                let depth = Decimal::from((10 + 37 * i + 11 * j) as u64);
                pools.push(weighted(&format!("{x}{y}"), (*x, depth), (*y, depth)));
            }
        }
        let graph = PoolGraph::new(&pools, &PoolFilter::default());

        let full = graph.candidate_paths(&"a".into(), &"b".into(), 4, 1000).unwrap();
        assert!(full.len() > 10);
        for cap in [1, 3, 7] {
            let capped = graph.candidate_paths(&"a".into(), &"b".into(), 4, cap).unwrap();
            assert_eq!(capped, full[..cap].to_vec());
        }
    }

    #[test]
    fn test_no_path_found() {
        let pools = pools();
        let graph = PoolGraph::new(&pools, &PoolFilter::default());
        let err = graph.candidate_paths(&"a".into(), &"e".into(), 2, 10).unwrap_err();
        assert!(matches!(err, RouterError::NoPathFound { .. }));
    }

    #[test]
    fn test_filter_excludes_types_and_disabled_pools() {
        let mut pools = pools();
        pools[1] = pools[1].clone().with_swap_enabled(false);
        let graph = PoolGraph::new(&pools, &PoolFilter::default());
        let ids: Vec<String> = graph
            .candidate_paths(&"a".into(), &"b".into(), 2, 10)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert!(!ids.contains(&"p2".to_string()));

        let stable_only = PoolFilter::new(Some(vec![PoolType::Stable]));
        let graph = PoolGraph::new(&pools, &stable_only);
        assert_eq!(graph.pool_count(), 0);
        assert!(graph.candidate_paths(&"a".into(), &"b".into(), 2, 10).is_err());
    }

    #[test]
    fn test_endpoints_never_intermediate_and_pools_not_reused() {
        let three = Pool::new(
            "tri",
            PoolType::Weighted,
            dec!(0.003),
            vec![
                PoolToken::new("a", dec!(100), 18).with_weight(dec!(1)),
                PoolToken::new("b", dec!(100), 18).with_weight(dec!(1)),
                PoolToken::new("c", dec!(100), 18).with_weight(dec!(1)),
            ],
        );
        let pools = vec![three, weighted("p4", ("c", dec!(100)), ("b", dec!(100)))];
        let graph = PoolGraph::new(&pools, &PoolFilter::default());
        let paths = graph.candidate_paths(&"a".into(), &"b".into(), 3, 10).unwrap();

        for path in &paths {
            assert_eq!(path.token_in(), Some(&"a".into()));
            assert_eq!(path.token_out(), Some(&"b".into()));
            let mut pools: Vec<_> = path.hops.iter().map(|h| &h.pool_id).collect();
            pools.sort();
            pools.dedup();
            assert_eq!(pools.len(), path.len());
            for hop in &path.hops[..path.len() - 1] {
                assert_ne!(hop.token_out, TokenAddress::from("a"));
                assert_ne!(hop.token_out, TokenAddress::from("b"));
            }
        }
        let ids: Vec<&str> = paths.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"tri"));
        assert!(ids.contains(&"tri-p4"));
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let pools = pools();
        let mut reversed = pools.clone();
        reversed.reverse();
        let a = PoolGraph::new(&pools, &PoolFilter::default())
            .candidate_paths(&"a".into(), &"b".into(), 2, 10)
            .unwrap();
        let b = PoolGraph::new(&reversed, &PoolFilter::default())
            .candidate_paths(&"a".into(), &"b".into(), 2, 10)
            .unwrap();
        assert_eq!(a, b);
    }
}
