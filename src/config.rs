use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::canvas::viewport::HitRounding;
use crate::constants::{
    DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_SESSION_ID, EVENT_BACKFILL_BLOCKS,
    EVENT_POLL_INTERVAL_SECS, RECEIPT_POLL_INTERVAL_MS, TX_CONFIRM_TIMEOUT_MS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Relay server
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub cors_allowed_origins: String,

    // Chain
    pub evm_rpc_url: String,
    pub evm_chain_id: u64,
    pub contract_address: String,
    pub wallet_private_key: Option<String>,

    // Pinning
    pub pinning_api_url: String,
    pub pinning_jwt: Option<String>,

    // Canvas
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub hit_rounding: HitRounding,
    pub session_id: String,

    // Transactions
    pub tx_confirm_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,

    // Event watcher
    pub event_poll_interval_secs: u64,
    pub event_backfill_blocks: u64,
}

// Internal helper that reads `name` and parses it, falling back to `default` when unset.
fn env_parse<T: FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}")),
        _ => Ok(default),
    }
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),

            evm_rpc_url: env::var("EVM_RPC_URL")?,
            evm_chain_id: env_parse("EVM_CHAIN_ID", 123_420_001_114)?,
            contract_address: env::var("CONTRACT_ADDRESS")?,
            wallet_private_key: env_optional("WALLET_PRIVATE_KEY"),

            pinning_api_url: env::var("PINNING_API_URL")
                .unwrap_or_else(|_| "https://api.pinata.cloud".to_string()),
            pinning_jwt: env_optional("PINNING_JWT"),

            canvas_width: env_parse("CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH)?,
            canvas_height: env_parse("CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT)?,
            hit_rounding: env_parse("HIT_ROUNDING", HitRounding::Legacy)?,
            session_id: env::var("SESSION_ID").unwrap_or_else(|_| DEFAULT_SESSION_ID.to_string()),

            tx_confirm_timeout_ms: env_parse("TX_CONFIRM_TIMEOUT_MS", TX_CONFIRM_TIMEOUT_MS)?,
            receipt_poll_interval_ms: env_parse(
                "RECEIPT_POLL_INTERVAL_MS",
                RECEIPT_POLL_INTERVAL_MS,
            )?,

            event_poll_interval_secs: env_parse(
                "EVENT_POLL_INTERVAL_SECS",
                EVENT_POLL_INTERVAL_SECS,
            )?,
            event_backfill_blocks: env_parse("EVENT_BACKFILL_BLOCKS", EVENT_BACKFILL_BLOCKS)?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.evm_rpc_url.trim().is_empty() {
            anyhow::bail!("EVM_RPC_URL is empty");
        }
        url::Url::parse(&self.evm_rpc_url)
            .map_err(|e| anyhow::anyhow!("EVM_RPC_URL is not a valid URL: {e}"))?;
        url::Url::parse(&self.pinning_api_url)
            .map_err(|e| anyhow::anyhow!("PINNING_API_URL is not a valid URL: {e}"))?;
        if !self.contract_address.starts_with("0x") || self.contract_address.len() != 42 {
            anyhow::bail!("CONTRACT_ADDRESS must be a 0x-prefixed 20-byte address");
        }
        if self.tx_confirm_timeout_ms == 0 || self.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Transaction timeouts must be > 0");
        }
        if self.canvas_width <= 0.0 || self.canvas_height <= 0.0 {
            anyhow::bail!("Canvas dimensions must be positive");
        }
        if self.session_id.trim().is_empty() {
            anyhow::bail!("SESSION_ID is empty");
        }

        if self.contract_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder contract address");
        }
        if self.wallet_private_key.is_none() {
            tracing::warn!("WALLET_PRIVATE_KEY not set; write actions will report no wallet");
        }
        if self.pinning_jwt.is_none() {
            tracing::warn!("PINNING_JWT not set; NFT uploads will fail");
        }
        if self.event_poll_interval_secs == 0 {
            tracing::warn!("EVENT_POLL_INTERVAL_SECS should be > 0");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        self.environment == "development" || self.environment == "testnet"
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "development".to_string(),
            cors_allowed_origins: "*".to_string(),
            evm_rpc_url: "http://localhost:8545".to_string(),
            evm_chain_id: 31_337,
            contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            wallet_private_key: None,
            pinning_api_url: "http://localhost:9999".to_string(),
            pinning_jwt: None,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            hit_rounding: HitRounding::Legacy,
            session_id: DEFAULT_SESSION_ID.to_string(),
            tx_confirm_timeout_ms: 200,
            receipt_poll_interval_ms: 10,
            event_poll_interval_secs: 1,
            event_backfill_blocks: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validates() {
        assert!(Config::for_tests().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_contract_address() {
        let mut config = Config::for_tests();
        config.contract_address = "0x1234".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::for_tests();
        config.tx_confirm_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_rpc_url() {
        let mut config = Config::for_tests();
        config.evm_rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
