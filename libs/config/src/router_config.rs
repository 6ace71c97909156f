//! Router Configuration Module
//!
//! Loads router settings from a TOML file, an optional environment-specific
//! overlay and `SOR_` prefixed environment variables, in that order.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sor_amm::PoolType;
use std::path::Path;
use tracing::{debug, info, warn};

/// Main router configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Path enumeration and selection
    pub routing: RoutingConfig,

    /// Gas cost charged per path
    pub gas: GasConfig,

    /// Price equalisation search
    pub optimizer: OptimizerSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    pub max_pools: usize,
    pub max_hops: usize,
    pub max_paths: usize,
    /// Pool types allowed to participate; `None` allows every type
    pub pool_type_filter: Option<Vec<PoolType>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GasConfig {
    pub gas_price_wei: u64,
    pub swap_gas: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OptimizerSettings {
    pub max_iterations: usize,
    pub tolerance: Decimal,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_pools: defaults::routing::MAX_POOLS,
            max_hops: defaults::routing::MAX_HOPS,
            max_paths: defaults::routing::MAX_PATHS,
            pool_type_filter: None,
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_price_wei: defaults::gas::GAS_PRICE_WEI,
            swap_gas: defaults::gas::SWAP_GAS,
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: defaults::optimizer::MAX_ITERATIONS,
            tolerance: defaults::optimizer::TOLERANCE,
        }
    }
}

impl RouterConfig {
    /// Load configuration from files with environment overrides
    ///
    /// The overlay for `environment` is looked up in an `environments/`
    /// directory next to the base file and is optional.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new(defaults::paths::CONFIG_FILE));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join(defaults::paths::ENVIRONMENTS_DIR)
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // SOR_ROUTING__MAX_POOLS=2 overrides routing.max_pools
        builder = builder.add_source(
            Environment::with_prefix(defaults::paths::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: RouterConfig = builder
            .build()
            .context("Failed to build router configuration")?
            .try_deserialize()
            .context("Failed to deserialize router configuration")?;

        config.validate()?;
        debug!(?config, "Router configuration loaded");
        Ok(config)
    }

    /// Parse a configuration from TOML text, without file or environment layers
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RouterConfig =
            toml::from_str(content).context("Failed to parse router configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the router cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.routing.max_pools == 0 {
            bail!("routing.max_pools must be at least 1");
        }
        if self.routing.max_hops == 0 {
            bail!("routing.max_hops must be at least 1");
        }
        if self.routing.max_paths == 0 {
            bail!("routing.max_paths must be at least 1");
        }
        if matches!(&self.routing.pool_type_filter, Some(types) if types.is_empty()) {
            bail!("routing.pool_type_filter must name at least one pool type when set");
        }
        if self.optimizer.max_iterations == 0 {
            bail!("optimizer.max_iterations must be at least 1");
        }
        if self.optimizer.tolerance <= Decimal::ZERO {
            bail!("optimizer.tolerance must be positive");
        }
        Ok(())
    }
}

/// Convenience function to load configuration from the default location
pub fn load_config(environment: Option<&str>) -> Result<RouterConfig> {
    RouterConfig::load(None, environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("router.toml");

        let config_content = r#"
[routing]
max_pools = 3
max_hops = 1

[gas]
gas_price_wei = 1000000000

[optimizer]
tolerance = "0.0000001"
"#;

        fs::write(&config_path, config_content).unwrap();

        let config = RouterConfig::load(Some(&config_path), None).unwrap();

        assert_eq!(config.routing.max_pools, 3);
        assert_eq!(config.routing.max_hops, 1);
        assert_eq!(config.routing.max_paths, defaults::routing::MAX_PATHS);
        assert_eq!(config.routing.pool_type_filter, None);
        assert_eq!(config.gas.gas_price_wei, 1_000_000_000);
        assert_eq!(config.gas.swap_gas, defaults::gas::SWAP_GAS);
        assert_eq!(config.optimizer.tolerance, dec!(0.0000001));
        assert_eq!(config.optimizer.max_iterations, defaults::optimizer::MAX_ITERATIONS);
    }

    #[test]
    fn test_environment_overlay() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("router.toml");
        fs::write(&config_path, "[routing]\nmax_pools = 4\nmax_paths = 10\n").unwrap();

        let env_dir = dir.path().join("environments");
        fs::create_dir(&env_dir).unwrap();
        fs::write(env_dir.join("staging.toml"), "[routing]\nmax_pools = 2\n").unwrap();

        let config = RouterConfig::load(Some(&config_path), Some("staging")).unwrap();
        assert_eq!(config.routing.max_pools, 2);
        assert_eq!(config.routing.max_paths, 10);

        // missing overlay falls back to the base file
        let config = RouterConfig::load(Some(&config_path), Some("missing")).unwrap();
        assert_eq!(config.routing.max_pools, 4);
    }

    #[test]
    fn test_missing_base_file_fails() {
        let dir = tempdir().unwrap();
        assert!(RouterConfig::load(Some(&dir.path().join("absent.toml")), None).is_err());
    }

    #[test]
    fn test_pool_type_filter_parsing() {
        let config = RouterConfig::from_toml_str(
            "[routing]\npool_type_filter = [\"Weighted\", \"MetaStable\"]\n",
        )
        .unwrap();
        assert_eq!(
            config.routing.pool_type_filter,
            Some(vec![PoolType::Weighted, PoolType::MetaStable])
        );

        assert!(RouterConfig::from_toml_str("[routing]\npool_type_filter = []\n").is_err());
    }

    #[test]
    fn test_validation_rejects_zero_counts() {
        let err = RouterConfig::from_toml_str("[routing]\nmax_pools = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_pools"));

        let err = RouterConfig::from_toml_str("[optimizer]\ntolerance = \"0\"\n").unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RouterConfig::default();
        config.validate().unwrap();
        assert_eq!(config, RouterConfig::from_toml_str("").unwrap());
    }
}
