//! Error types for pool pricing
//!
//! Every curve-level failure (empty balances, output at or above the
//! available balance, invariant solver divergence, decimal overflow) is
//! reported as insufficient liquidity for the pool/pair that produced it.
//! Callers treat it as "this hop cannot carry the amount" and drop the path.

use thiserror::Error;

/// Errors raised while pricing a swap on a single pool pair
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool cannot support the requested amount in this direction
    #[error("Insufficient liquidity in pool {pool_id}: {reason}")]
    InsufficientLiquidity { pool_id: String, reason: String },

    /// Token is not a constituent of the pool
    #[error("Token {token} is not part of pool {pool_id}")]
    UnknownToken { pool_id: String, token: String },

    /// Pool snapshot is missing a parameter its curve needs
    #[error("Pool {pool_id} is misconfigured: {reason}")]
    InvalidPool { pool_id: String, reason: String },
}

impl PoolError {
    pub fn insufficient(pool_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InsufficientLiquidity {
            pool_id: pool_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(pool_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPool {
            pool_id: pool_id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that only mean "this pool cannot carry the trade"
    pub fn is_insufficient_liquidity(&self) -> bool {
        matches!(self, Self::InsufficientLiquidity { .. })
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Failures of the stateless curve formulas, before a pool id is attached
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    #[error("balances must be positive")]
    NonPositiveBalance,

    #[error("amount must not be negative")]
    NegativeAmount,

    #[error("output exceeds available balance")]
    OutputExceedsBalance,

    #[error("decimal overflow")]
    Overflow,

    #[error("invariant did not converge")]
    NoConvergence,
}

impl CurveError {
    /// Attach the pool id; every curve failure is a liquidity failure of that pool
    pub fn for_pool(self, pool_id: &str) -> PoolError {
        PoolError::insufficient(pool_id, self.to_string())
    }
}

pub type CurveResult<T> = Result<T, CurveError>;
