//! # SOR Configuration
//!
//! Layered configuration and defaults for the smart order router.
//!
//! ## Features
//!
//! - **Defaults**: Production values for routing, gas and optimizer settings
//! - **Layering**: Base TOML file, environment overlay, `SOR_` environment variables
//! - **Validation**: Settings the router cannot run with are rejected at load time
//!
//! ## Usage
//!
//! ```no_run
//! use sor_config::RouterConfig;
//! use std::path::Path;
//!
//! let config = RouterConfig::load(Some(Path::new("config/router.toml")), Some("production"))?;
//! assert!(config.routing.max_pools >= 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod defaults;
pub mod router_config;

// Re-export commonly used types
pub use router_config::{
    load_config, GasConfig, OptimizerSettings, RouterConfig, RoutingConfig,
};
