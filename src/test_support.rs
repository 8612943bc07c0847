//! In-memory chain and pinning doubles for unit tests.

use async_trait::async_trait;
use ethers::types::{Address, Log, H256, U256};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use crate::{
    error::{AppError, Result},
    indexer::event_parser::fixtures::mint_log,
    services::{
        onchain::{ChainClient, ContractCall, TxReceipt},
        pinning::PinningService,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    Success,
    Revert,
    NeverMined,
    Reject,
}

struct ChainState {
    bombs: u64,
    rockets: u64,
    bomb_price: U256,
    rocket_price: U256,
    daily_claim_fee: U256,
    can_claim: bool,
    outcomes: VecDeque<MockOutcome>,
    submitted: Vec<(ContractCall, U256)>,
    receipts: HashMap<H256, Option<TxReceipt>>,
    next_token_id: u64,
    block_number: u64,
    logs: Vec<Log>,
    log_queries: Vec<(u64, u64)>,
    fail_logs: Option<String>,
    fail_reads: bool,
}

pub struct MockChain {
    account: Option<Address>,
    state: Mutex<ChainState>,
}

impl MockChain {
    fn with_account(account: Option<Address>) -> Self {
        Self {
            account,
            state: Mutex::new(ChainState {
                bombs: 0,
                rockets: 0,
                bomb_price: U256::from(10u64),
                rocket_price: U256::from(20u64),
                daily_claim_fee: U256::from(1u64),
                can_claim: true,
                outcomes: VecDeque::new(),
                submitted: Vec::new(),
                receipts: HashMap::new(),
                next_token_id: 1,
                block_number: 0,
                logs: Vec::new(),
                log_queries: Vec::new(),
                fail_logs: None,
                fail_reads: false,
            }),
        }
    }

    pub fn connected() -> Self {
        Self::with_account(Some(Address::repeat_byte(0xaa)))
    }

    pub fn disconnected() -> Self {
        Self::with_account(None)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_bombs(&self, count: u64) {
        self.with_state(|s| s.bombs = count);
    }

    pub fn set_rockets(&self, count: u64) {
        self.with_state(|s| s.rockets = count);
    }

    pub fn set_bomb_price(&self, price: U256) {
        self.with_state(|s| s.bomb_price = price);
    }

    pub fn set_rocket_price(&self, price: U256) {
        self.with_state(|s| s.rocket_price = price);
    }

    pub fn set_can_claim(&self, can_claim: bool) {
        self.with_state(|s| s.can_claim = can_claim);
    }

    pub fn set_block_number(&self, block: u64) {
        self.with_state(|s| s.block_number = block);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with_state(|s| s.fail_reads = fail);
    }

    /// Outcome of the next submitted transaction; defaults to success.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.with_state(|s| s.outcomes.push_back(outcome));
    }

    pub fn push_log(&self, log: Log) {
        self.with_state(|s| s.logs.push(log));
    }

    pub fn fail_logs_once(&self, message: &str) {
        self.with_state(|s| s.fail_logs = Some(message.to_string()));
    }

    pub fn submitted(&self) -> Vec<(ContractCall, U256)> {
        self.with_state(|s| s.submitted.clone())
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.with_state(|s| s.log_queries.clone())
    }

    fn check_reads(state: &ChainState) -> Result<()> {
        if state.fail_reads {
            return Err(AppError::BlockchainRPC("mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn bombs(&self, _user: Address) -> Result<u64> {
        self.with_state(|s| Self::check_reads(s).map(|_| s.bombs))
    }

    async fn rockets(&self, _user: Address) -> Result<u64> {
        self.with_state(|s| Self::check_reads(s).map(|_| s.rockets))
    }

    async fn bomb_price(&self) -> Result<U256> {
        self.with_state(|s| Self::check_reads(s).map(|_| s.bomb_price))
    }

    async fn rocket_price(&self) -> Result<U256> {
        self.with_state(|s| Self::check_reads(s).map(|_| s.rocket_price))
    }

    async fn daily_claim_fee(&self) -> Result<U256> {
        self.with_state(|s| Self::check_reads(s).map(|_| s.daily_claim_fee))
    }

    async fn can_claim_today(&self, _user: Address) -> Result<bool> {
        self.with_state(|s| Self::check_reads(s).map(|_| s.can_claim))
    }

    async fn submit(&self, call: &ContractCall, value: U256) -> Result<H256> {
        let account = self.account.ok_or(AppError::WalletNotConnected)?;
        self.with_state(|s| {
            let outcome = s.outcomes.pop_front().unwrap_or(MockOutcome::Success);
            if outcome == MockOutcome::Reject {
                return Err(AppError::TransactionRejected("User rejected the request.".to_string()));
            }
            s.submitted.push((call.clone(), value));
            let tx_hash = H256::from_low_u64_be(0x1000 + s.submitted.len() as u64);
            s.block_number += 1;

            let mut logs = Vec::new();
            if let (MockOutcome::Success, ContractCall::MintNft { token_uri }) = (outcome, call) {
                logs.push(mint_log(account, s.next_token_id, token_uri, s.block_number));
                s.next_token_id += 1;
            }
            let receipt = match outcome {
                MockOutcome::NeverMined => None,
                _ => Some(TxReceipt {
                    tx_hash,
                    success: outcome == MockOutcome::Success,
                    block_number: Some(s.block_number),
                    logs,
                }),
            };
            s.receipts.insert(tx_hash, receipt);
            Ok(tx_hash)
        })
    }

    async fn receipt(&self, tx_hash: H256) -> Result<Option<TxReceipt>> {
        self.with_state(|s| Ok(s.receipts.get(&tx_hash).cloned().flatten()))
    }

    async fn block_number(&self) -> Result<u64> {
        self.with_state(|s| Ok(s.block_number))
    }

    async fn logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        self.with_state(|s| {
            if let Some(message) = s.fail_logs.take() {
                return Err(AppError::BlockchainRPC(message));
            }
            s.log_queries.push((from_block, to_block));
            Ok(s
                .logs
                .iter()
                .filter(|log| {
                    let block = log.block_number.map(|n| n.as_u64()).unwrap_or(0);
                    (from_block..=to_block).contains(&block)
                })
                .cloned()
                .collect())
        })
    }
}

#[derive(Default)]
struct PinningState {
    sequence: u64,
    failures_left: u32,
    files: Vec<(String, usize)>,
    json: Vec<Value>,
}

/// Pinning double; content ids are `QmFile{n}` / `QmJson{n}` from one counter.
#[derive(Default)]
pub struct MockPinning {
    state: Mutex<PinningState>,
}

impl MockPinning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` pin calls fail.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().unwrap().failures_left = n;
    }

    pub fn json_documents(&self) -> Vec<Value> {
        self.state.lock().unwrap().json.clone()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    fn next_cid(&self, prefix: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(AppError::Storage("mock pinning outage".to_string()));
        }
        state.sequence += 1;
        Ok(format!("Qm{}{}", prefix, state.sequence))
    }
}

#[async_trait]
impl PinningService for MockPinning {
    async fn pin_file(&self, file_name: &str, bytes: Vec<u8>, _mime: &str) -> Result<String> {
        let cid = self.next_cid("File")?;
        self.state
            .lock()
            .unwrap()
            .files
            .push((file_name.to_string(), bytes.len()));
        Ok(cid)
    }

    async fn pin_json(&self, _name: &str, document: &Value) -> Result<String> {
        let cid = self.next_cid("Json")?;
        self.state.lock().unwrap().json.push(document.clone());
        Ok(cid)
    }
}
