//! Router defaults
//!
//! Production values used when a configuration file leaves a field out.

/// Path selection defaults
pub mod routing {
    /// Maximum number of paths a single allocation may split across
    pub const MAX_POOLS: usize = 4;

    /// Maximum number of hops per path
    pub const MAX_HOPS: usize = 2;

    /// Candidate paths kept after enumeration
    pub const MAX_PATHS: usize = 20;
}

/// Gas cost defaults
pub mod gas {
    /// Gas price used when the caller supplies none (30 gwei)
    pub const GAS_PRICE_WEI: u64 = 30_000_000_000;

    /// Gas units charged per path in an allocation
    pub const SWAP_GAS: u64 = 35_000;
}

/// Allocation optimizer defaults
pub mod optimizer {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Iteration cap for the price equalisation search
    pub const MAX_ITERATIONS: usize = 50;

    /// Relative marginal-price tolerance between selected paths
    pub const TOLERANCE: Decimal = dec!(0.000000000001);
}

/// Default configuration file locations
pub mod paths {
    pub const CONFIG_FILE: &str = "config/router.toml";

    /// Directory holding `<environment>.toml` overlays, relative to the base file
    pub const ENVIRONMENTS_DIR: &str = "environments";

    /// Prefix for environment variable overrides (`SOR_ROUTING__MAX_POOLS=2`)
    pub const ENV_PREFIX: &str = "SOR";
}
