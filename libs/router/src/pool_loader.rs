//! Pool snapshot loading from subgraph JSON
//!
//! Reads the `{"pools": [...]}` document served by a pool subgraph: camelCase
//! keys with amounts as decimal strings. Pools that cannot be converted are
//! skipped with a warning so one bad entry never hides the rest.

use crate::{log_pool, log_warning};
use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use sor_amm::{Pool, PoolToken, PoolType};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct SubgraphDocument {
    pools: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphPool {
    id: String,
    address: Option<String>,
    pool_type: String,
    swap_fee: String,
    total_shares: Option<String>,
    tokens: Vec<SubgraphToken>,
    amp: Option<String>,
    swap_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphToken {
    address: String,
    balance: String,
    decimals: u8,
    weight: Option<String>,
    price_rate: Option<String>,
}

/// Map a subgraph pool type name onto a supported curve
fn parse_pool_type(name: &str) -> Result<PoolType> {
    match name {
        "Weighted" | "Investment" => Ok(PoolType::Weighted),
        "LiquidityBootstrapping" => Ok(PoolType::LiquidityBootstrapping),
        "Stable" => Ok(PoolType::Stable),
        "MetaStable" => Ok(PoolType::MetaStable),
        "ConstantProduct" => Ok(PoolType::ConstantProduct),
        other => bail!("unsupported pool type '{}'", other),
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| anyhow!("invalid {} '{}': {}", field, value, e))
}

fn convert_pool(raw: SubgraphPool) -> Result<Pool> {
    let pool_type = parse_pool_type(&raw.pool_type)?;
    let swap_fee = parse_decimal("swapFee", &raw.swap_fee)?;

    let tokens = raw
        .tokens
        .iter()
        .map(|token| -> Result<PoolToken> {
            let mut parsed = PoolToken::new(
                token.address.as_str(),
                parse_decimal("balance", &token.balance)?,
                token.decimals,
            );
            if let Some(weight) = &token.weight {
                parsed = parsed.with_weight(parse_decimal("weight", weight)?);
            }
            if let Some(rate) = &token.price_rate {
                parsed = parsed.with_price_rate(parse_decimal("priceRate", rate)?);
            }
            Ok(parsed)
        })
        .collect::<Result<Vec<_>>>()?;
    if tokens.len() < 2 {
        bail!("pool has {} tokens", tokens.len());
    }

    let mut pool = Pool::new(raw.id, pool_type, swap_fee, tokens)
        .with_swap_enabled(raw.swap_enabled.unwrap_or(true));
    if let Some(address) = raw.address {
        pool.address = address;
    }
    if let Some(shares) = &raw.total_shares {
        pool = pool.with_total_shares(parse_decimal("totalShares", shares)?);
    }
    if let Some(amp) = &raw.amp {
        pool = pool.with_amp(parse_decimal("amp", amp)?);
    }
    if matches!(pool_type, PoolType::Stable | PoolType::MetaStable) && pool.amp.is_none() {
        bail!("stable pool without amp");
    }
    Ok(pool)
}

/// Parse a subgraph pool document, skipping pools that cannot be converted
pub fn parse_subgraph_pools(content: &str) -> Result<Vec<Pool>> {
    let document: SubgraphDocument =
        serde_json::from_str(content).context("Failed to parse pool JSON")?;

    let total = document.pools.len();
    let mut pools = Vec::with_capacity(total);
    for (index, value) in document.pools.into_iter().enumerate() {
        let id = value
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));
        let converted = serde_json::from_value::<SubgraphPool>(value)
            .map_err(anyhow::Error::from)
            .and_then(convert_pool);
        match converted {
            Ok(pool) => pools.push(pool),
            Err(e) => log_warning!("Skipping pool {}: {}", id, e),
        }
    }

    let mut by_type: HashMap<PoolType, usize> = HashMap::new();
    for pool in &pools {
        *by_type.entry(pool.pool_type).or_insert(0) += 1;
    }
    for (pool_type, count) in &by_type {
        tracing::debug!(?pool_type, count, "Pools by type");
    }

    log_pool!("Parsed {} of {} pools", pools.len(), total);
    Ok(pools)
}

/// Load pool snapshots from a subgraph JSON file
pub fn load_pools_from_json(path: &Path) -> Result<Vec<Pool>> {
    log_pool!("Loading pools from {:?}", path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pool file {:?}", path))?;
    parse_subgraph_pools(&content).with_context(|| format!("Invalid pool file {:?}", path))
}
