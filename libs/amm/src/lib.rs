//! # SOR AMM Library - Pool Pricing Model
//!
//! ## Purpose
//!
//! Exact decimal pricing for every bonding curve the smart order router can
//! route through: Balancer-style weighted pools (including liquidity
//! bootstrapping pools), StableSwap pools, meta stable pools with per-token
//! price rates, and plain constant product pools. Each pool is projected onto
//! a directed token pair and priced through one capability set.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Immutable [`Pool`] snapshots supplied by the caller's data layer
//! - **Output Destinations**: Path scoring and allocation optimisation in `sor-router`
//! - **Pricing Surface**: [`PairPricing`] - swap amounts, limits, marginal price and its derivative
//! - **Valuation**: [`zero_price_impact`] values pool-share joins at the current marginal price
//! - **Precision**: `rust_decimal` throughout; no binary floating point in pricing
//!
//! ## Architecture Role
//!
//! ```text
//! Pool snapshot ──pair_view(in, out)──► PairView ──PairPricing──► sor-router
//!                                         │
//!          ┌──────────────┬───────────────┼─────────────────┐
//!     WeightedMath    StableMath     StableMath + rates   ConstantProductMath
//! ```
//!
//! Curve formulas live in stateless `*Math` types returning [`CurveError`];
//! the pair types attach the pool id and report every curve failure as
//! [`PoolError::InsufficientLiquidity`].

pub mod constant_product_math;
pub mod error;
pub mod pair;
pub mod pool;
pub mod pool_traits;
pub mod stable_math;
pub mod weighted_math;
pub mod zero_price_impact;

pub use constant_product_math::{ConstantProductMath, ConstantProductState};
pub use error::{CurveError, PoolError, PoolResult};
pub use pair::{ConstantProductPair, PairView, StablePair, WeightedPair};
pub use pool::{Pool, PoolId, PoolToken, PoolType, TokenAddress};
pub use pool_traits::{PairPricing, SwapType};
pub use stable_math::StableMath;
pub use weighted_math::WeightedMath;
pub use zero_price_impact::{
    stable_bpt_for_tokens_zero_price_impact, weighted_bpt_for_tokens_zero_price_impact,
    ValuationError,
};

/// Common types for AMM calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
