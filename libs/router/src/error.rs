//! Router error types

use rust_decimal::Decimal;
use sor_amm::{PoolError, TokenAddress};
use thiserror::Error;

/// Errors surfaced by path discovery, allocation and plan assembly
#[derive(Debug, Error)]
pub enum RouterError {
    /// One hop of a path cannot carry the amount; the path is dropped from the candidates
    #[error("Insufficient liquidity on path {path}: {source}")]
    InsufficientLiquidity {
        path: String,
        #[source]
        source: PoolError,
    },

    /// No combination of candidate paths can fill the requested amount
    #[error("Requested amount {requested} exceeds available liquidity {available}")]
    AmountExceedsLiquidity {
        requested: Decimal,
        available: Decimal,
    },

    /// Marginal price equalisation ran out of iterations
    #[error("Optimization did not converge after {iterations} iterations")]
    OptimizationDidNotConverge { iterations: usize },

    /// No pool path connects the two tokens
    #[error("No path found from {token_in} to {token_out}")]
    NoPathFound {
        token_in: TokenAddress,
        token_out: TokenAddress,
    },

    #[error("Invalid routing request: {0}")]
    InvalidRequest(String),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Gas cost conversion failed: {0}")]
    CostConversion(anyhow::Error),
}

impl RouterError {
    /// Attribute a pool failure to the path it happened on
    ///
    /// Liquidity failures become [`RouterError::InsufficientLiquidity`] so the
    /// optimizer can drop the path; anything else is a malformed snapshot.
    pub fn on_path(path_id: &str, error: PoolError) -> Self {
        if error.is_insufficient_liquidity() {
            Self::InsufficientLiquidity {
                path: path_id.to_string(),
                source: error,
            }
        } else {
            Self::Pool(error)
        }
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
