//! # SOR Router - Smart Order Routing Core
//!
//! ## Purpose
//!
//! Finds how to split one swap request across the paths of a pool snapshot
//! so the trader receives the most output (exact in) or pays the least input
//! (exact out) once per-path gas is accounted for.
//!
//! ## Integration Points
//!
//! - **Input**: Pool snapshots from [`pool_loader`] or the caller's data layer
//! - **Pricing**: `sor-amm` pair views for every hop
//! - **Gas**: Any [`GasCostConverter`]; [`NativePriceCostCalculator`] keeps prices in memory
//! - **Output**: [`SwapPlan`] with per-hop steps, encodable as a [`BatchSwap`]
//! - **Configuration**: [`SwapOptions`] built from `sor-config`
//!
//! ## Architecture Role
//!
//! ```text
//! Pools ──► PoolGraph ──candidate paths──► score_paths ──ranked──► AllocationOptimizer
//!                                               ▲                         │
//!                                         BalanceLedger ◄──sequential─────┤
//!                                                                         ▼
//!                                                             SwapPlan::assemble
//! ```
//!
//! ## Example
//!
//! ```
//! use sor_amm::{dec, Pool, PoolToken, PoolType, SwapType};
//! use sor_router::{NativePriceCostCalculator, Router, SwapOptions};
//! use std::sync::Arc;
//!
//! let pool = Pool::new(
//!     "0xpool",
//!     PoolType::ConstantProduct,
//!     dec!(0.003),
//!     vec![PoolToken::new("0xaaa", dec!(1000), 18), PoolToken::new("0xbbb", dec!(1000), 18)],
//! );
//! let router = Router::new(vec![pool], Arc::new(NativePriceCostCalculator::new()));
//! let plan = router.route(
//!     &"0xaaa".into(),
//!     &"0xbbb".into(),
//!     SwapType::ExactIn,
//!     dec!(10),
//!     &SwapOptions::default(),
//! )?;
//! assert_eq!(plan.paths.len(), 1);
//! # Ok::<(), sor_router::RouterError>(())
//! ```

pub mod error;
pub mod gas;
pub mod graph;
pub mod ledger;
pub mod limits;
pub mod logging;
pub mod optimizer;
pub mod plan;
pub mod pool_loader;
pub mod router;

pub use error::{RouterError, RouterResult};
pub use gas::{GasCostConverter, NativePriceCostCalculator};
pub use graph::{Hop, Path, PoolFilter, PoolGraph, SwapPairType};
pub use ledger::BalanceLedger;
pub use limits::{score_paths, HopAmounts, Marginal, PathQuote, ScoredPath};
pub use optimizer::{Allocation, AllocationEntry, AllocationOptimizer, OptimizerConfig, TracePoint};
pub use plan::{BatchSwap, BatchSwapError, BatchSwapStep, PlannedPath, SwapPlan, SwapStep};
pub use pool_loader::{load_pools_from_json, parse_subgraph_pools};
pub use router::{Router, SwapOptions};
