use async_trait::async_trait;
use ethers::{
    abi::{parse_abi, Abi, Detokenize, Tokenize},
    contract::BaseContract,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, Filter, Log, TransactionRequest, H256, U256, U64},
};
use std::str::FromStr;

use crate::{
    config::Config,
    error::{AppError, Result},
};

/// Human-readable ABI of the pixel-war contract.
pub const PIXEL_WAR_ABI: &[&str] = &[
    "event AreaBombed(address indexed user, uint256 x, uint256 y, uint256 radius)",
    "event RocketFired(address indexed user, uint256 x, uint256 y, uint256 radius)",
    "event NFTMinted(address indexed to, uint256 tokenId, string tokenURI)",
    "function bombs(address user) external view returns (uint256)",
    "function rockets(address user) external view returns (uint256)",
    "function bombPrice() external view returns (uint256)",
    "function rocketPrice() external view returns (uint256)",
    "function dailyClaimFee() external view returns (uint256)",
    "function canClaimToday(address user) external view returns (bool)",
    "function placePixel(uint256 x, uint256 y, string color) external",
    "function bombArea(uint256 centerX, uint256 centerY, uint256 radius) external",
    "function fireRocket(uint256 centerX, uint256 centerY, uint256 radius) external",
    "function buyBomb() external payable",
    "function buyRocket() external payable",
    "function claimDaily() external payable",
    "function mintNFT(string tokenURI) external returns (uint256)",
];

pub fn pixel_war_abi() -> Result<Abi> {
    parse_abi(PIXEL_WAR_ABI).map_err(|e| AppError::Internal(format!("Invalid contract ABI: {}", e)))
}

/// State-changing contract calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    PlacePixel { x: u32, y: u32, color: String },
    BombArea { x: u32, y: u32, radius: u32 },
    FireRocket { x: u32, y: u32, radius: u32 },
    BuyBomb,
    BuyRocket,
    ClaimDaily,
    MintNft { token_uri: String },
}

impl ContractCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::PlacePixel { .. } => "placePixel",
            ContractCall::BombArea { .. } => "bombArea",
            ContractCall::FireRocket { .. } => "fireRocket",
            ContractCall::BuyBomb => "buyBomb",
            ContractCall::BuyRocket => "buyRocket",
            ContractCall::ClaimDaily => "claimDaily",
            ContractCall::MintNft { .. } => "mintNFT",
        }
    }

    pub fn encode(&self, contract: &BaseContract) -> Result<Bytes> {
        let name = self.function_name();
        let encoded = match self {
            ContractCall::PlacePixel { x, y, color } => {
                contract.encode(name, (U256::from(*x), U256::from(*y), color.clone()))
            }
            ContractCall::BombArea { x, y, radius } | ContractCall::FireRocket { x, y, radius } => {
                contract.encode(name, (U256::from(*x), U256::from(*y), U256::from(*radius)))
            }
            ContractCall::MintNft { token_uri } => contract.encode(name, token_uri.clone()),
            ContractCall::BuyBomb | ContractCall::BuyRocket | ContractCall::ClaimDaily => {
                contract.encode(name, ())
            }
        };
        encoded.map_err(|e| AppError::Internal(format!("Failed to encode {}: {}", name, e)))
    }
}

/// Settled transaction as reported by the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

/// Read/write/subscribe surface of the contract.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address transactions are sent from; `None` when no wallet is connected.
    fn account(&self) -> Option<Address>;

    async fn bombs(&self, user: Address) -> Result<u64>;
    async fn rockets(&self, user: Address) -> Result<u64>;
    async fn bomb_price(&self) -> Result<U256>;
    async fn rocket_price(&self) -> Result<U256>;
    async fn daily_claim_fee(&self) -> Result<U256>;
    async fn can_claim_today(&self, user: Address) -> Result<bool>;

    /// Sign and broadcast; returns the transaction hash without waiting.
    async fn submit(&self, call: &ContractCall, value: U256) -> Result<H256>;

    /// `None` while the transaction is still pending.
    async fn receipt(&self, tx_hash: H256) -> Result<Option<TxReceipt>>;

    async fn block_number(&self) -> Result<u64>;

    /// Contract logs in the inclusive block range.
    async fn logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>>;
}

// Wallet errors that mean the signer declined rather than the chain failing.
fn is_rejection(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("user rejected") || lower.contains("user denied") || lower.contains("rejected the request")
}

fn count_from_word(function: &str, count: U256) -> Result<u64> {
    if count > U256::from(u64::MAX) {
        return Err(AppError::BlockchainRPC(format!("{} returned out-of-range count {}", function, count)));
    }
    Ok(count.as_u64())
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid EVM address: {}", raw)))
}

pub struct EvmChain {
    provider: Provider<Http>,
    signer: Option<SignerMiddleware<Provider<Http>, LocalWallet>>,
    contract: BaseContract,
    address: Address,
}

impl EvmChain {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.evm_rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid EVM RPC URL: {}", e)))?;

        let signer = match config.wallet_private_key.as_deref() {
            Some(key) => {
                let wallet = LocalWallet::from_str(key.trim_start_matches("0x"))
                    .map_err(|e| AppError::Internal(format!("Invalid wallet private key: {}", e)))?
                    .with_chain_id(config.evm_chain_id);
                tracing::info!("Wallet connected: {:#x}", wallet.address());
                Some(SignerMiddleware::new(provider.clone(), wallet))
            }
            None => {
                tracing::warn!("WALLET_PRIVATE_KEY not set; write actions are disabled");
                None
            }
        };

        Ok(Self {
            provider,
            signer,
            contract: BaseContract::from(pixel_war_abi()?),
            address: parse_address(&config.contract_address)?,
        })
    }

    async fn read<A: Tokenize + Send, T: Detokenize + Send>(&self, function: &str, args: A) -> Result<T> {
        let data = self
            .contract
            .encode(function, args)
            .map_err(|e| AppError::Internal(format!("Failed to encode {}: {}", function, e)))?;
        let tx = TransactionRequest::new().to(self.address).data(data);
        let raw = self
            .provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| AppError::BlockchainRPC(format!("{} call failed: {}", function, e)))?;
        self.contract
            .decode_output(function, raw)
            .map_err(|e| AppError::BlockchainRPC(format!("{} returned malformed data: {}", function, e)))
    }
}

#[async_trait]
impl ChainClient for EvmChain {
    fn account(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn bombs(&self, user: Address) -> Result<u64> {
        count_from_word("bombs", self.read("bombs", user).await?)
    }

    async fn rockets(&self, user: Address) -> Result<u64> {
        count_from_word("rockets", self.read("rockets", user).await?)
    }

    async fn bomb_price(&self) -> Result<U256> {
        self.read("bombPrice", ()).await
    }

    async fn rocket_price(&self) -> Result<U256> {
        self.read("rocketPrice", ()).await
    }

    async fn daily_claim_fee(&self) -> Result<U256> {
        self.read("dailyClaimFee", ()).await
    }

    async fn can_claim_today(&self, user: Address) -> Result<bool> {
        self.read("canClaimToday", user).await
    }

    async fn submit(&self, call: &ContractCall, value: U256) -> Result<H256> {
        let Some(signer) = self.signer.as_ref() else {
            return Err(AppError::WalletNotConnected);
        };
        let tx = TransactionRequest::new()
            .to(self.address)
            .data(call.encode(&self.contract)?)
            .value(value);
        let pending = signer.send_transaction(tx, None).await.map_err(|e| {
            let message = e.to_string();
            if is_rejection(&message) {
                AppError::TransactionRejected(message)
            } else {
                AppError::BlockchainRPC(message)
            }
        })?;
        let tx_hash = pending.tx_hash();
        tracing::info!("Submitted {} tx {:#x}", call.function_name(), tx_hash);
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: H256) -> Result<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(receipt.map(|r| TxReceipt {
            tx_hash,
            success: r.status == Some(U64::from(1)),
            block_number: r.block_number.map(|n| n.as_u64()),
            logs: r.logs,
        }))
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }

    async fn logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(self.address)
            .from_block(from_block)
            .to_block(to_block);
        self.provider
            .get_logs(&filter)
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }
}
