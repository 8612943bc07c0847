use ethers::types::{H256, U256};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

use super::onchain::{ChainClient, ContractCall, TxReceipt};
use crate::{
    config::Config,
    error::{AppError, Result},
    utils::short_hash,
};

/// Where the transaction value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    Free,
    DailyClaimFee,
    BombPrice { quantity: u32 },
    RocketPrice { quantity: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedTx {
    pub call: ContractCall,
    pub value: U256,
    pub receipt: TxReceipt,
}

impl ConfirmedTx {
    pub fn tx_hash(&self) -> H256 {
        self.receipt.tx_hash
    }

    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.receipt.tx_hash)
    }

    pub fn short_hash(&self) -> String {
        short_hash(&self.hash_hex())
    }
}

/// `unit_price × quantity`, refusing values that do not fit a uint256.
pub fn price_times(unit_price: U256, quantity: u32) -> Result<U256> {
    unit_price.checked_mul(U256::from(quantity)).ok_or_else(|| {
        AppError::InvalidInput(format!("price {} x {} overflows uint256", unit_price, quantity))
    })
}

/// Fee read, submit, then wait for the receipt under a fixed timeout.
///
/// Nothing here touches canvas or inventory state; callers apply their
/// effects only after [`TransactionEnvelope::execute`] returns `Ok`.
#[derive(Clone)]
pub struct TransactionEnvelope {
    chain: Arc<dyn ChainClient>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl TransactionEnvelope {
    pub fn new(chain: Arc<dyn ChainClient>, config: &Config) -> Self {
        Self {
            chain,
            confirm_timeout: Duration::from_millis(config.tx_confirm_timeout_ms),
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        }
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub async fn resolve_fee(&self, source: FeeSource) -> Result<U256> {
        match source {
            FeeSource::Free => Ok(U256::zero()),
            FeeSource::DailyClaimFee => self.chain.daily_claim_fee().await,
            FeeSource::BombPrice { quantity } => price_times(self.chain.bomb_price().await?, quantity),
            FeeSource::RocketPrice { quantity } => {
                price_times(self.chain.rocket_price().await?, quantity)
            }
        }
    }

    pub async fn execute(&self, call: ContractCall, fee: FeeSource) -> Result<ConfirmedTx> {
        if self.chain.account().is_none() {
            return Err(AppError::WalletNotConnected);
        }
        let value = self.resolve_fee(fee).await?;
        let tx_hash = self.chain.submit(&call, value).await?;
        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.success {
            tracing::warn!("{} tx {:#x} reverted", call.function_name(), tx_hash);
            return Err(AppError::TransactionReverted(format!("{:#x}", tx_hash)));
        }
        tracing::info!("{} tx {:#x} confirmed", call.function_name(), tx_hash);
        Ok(ConfirmedTx { call, value, receipt })
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt> {
        let poll = async {
            let mut last_error = String::new();
            loop {
                match self.chain.receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(err) => {
                        let message = err.to_string();
                        if message != last_error {
                            tracing::warn!("Receipt poll for {:#x} failed: {}", tx_hash, message);
                            last_error = message;
                        }
                    }
                }
                sleep(self.poll_interval).await;
            }
        };
        timeout(self.confirm_timeout, poll)
            .await
            .map_err(|_| AppError::ConfirmationTimeout(self.confirm_timeout.as_millis() as u64))
    }
}
