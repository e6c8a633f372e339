//! 测试用的链、后端与路由替身。

mod decode;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;

use crate::api::{RelayApiError, RelayBackend, TopUpWithSwapRequest};
use crate::context::UsageStatus;
use crate::error::{RelayError, RelayResult};
use crate::instructions::token_swap::TOKEN_SWAP_PROGRAM_ID;
use crate::relay::RetryPolicy;
use crate::router::{PoolRouter, PoolsPair, SwapPool};

pub use decode::*;

pub const TOKEN_ACCOUNT_RENT: u64 = 2_039_280;
pub const RELAY_ACCOUNT_RENT: u64 = 890_880;
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::network(3, Duration::from_millis(1))
}

pub fn fast_pending_retry() -> RetryPolicy {
    RetryPolicy::pending_account(5, Duration::from_millis(1))
}

fn signature_from_counter(counter: &AtomicU64) -> Signature {
    let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
    let mut bytes = [7u8; 64];
    bytes[..8].copy_from_slice(&value.to_le_bytes());
    Signature::from(bytes)
}

pub fn sample_pool(source_mint: Pubkey, destination_mint: Pubkey) -> SwapPool {
    SwapPool {
        address: Pubkey::new_unique(),
        program_id: TOKEN_SWAP_PROGRAM_ID,
        authority: Pubkey::new_unique(),
        source_mint,
        destination_mint,
        pool_source: Pubkey::new_unique(),
        pool_destination: Pubkey::new_unique(),
        pool_token_mint: Pubkey::new_unique(),
        fee_account: Pubkey::new_unique(),
    }
}

/// 已初始化的 SPL 代币账户数据。
pub fn token_account_data(mint: &Pubkey, owner: &Pubkey) -> Vec<u8> {
    let account = spl_token::state::Account {
        mint: *mint,
        owner: *owner,
        amount: 0,
        delegate: COption::None,
        state: spl_token::state::AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Account::LEN];
    spl_token::state::Account::pack(account, &mut data).expect("pack token account");
    data
}

pub struct MockChain {
    rents: HashMap<usize, u64>,
    lamports_per_signature: u64,
    blockhash: Hash,
    accounts: RwLock<HashMap<Pubkey, Account>>,
    confirmed: Mutex<Vec<Signature>>,
    fail_confirmation: AtomicBool,
    signatures: AtomicU64,
}

impl MockChain {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn set_lamports(&self, address: Pubkey, lamports: u64) {
        self.accounts.write().entry(address).or_default().lamports = lamports;
    }

    pub fn set_account_data(&self, address: Pubkey, data: Vec<u8>) {
        let mut accounts = self.accounts.write();
        let account = accounts.entry(address).or_default();
        account.owner = spl_token::id();
        if account.lamports == 0 {
            account.lamports = TOKEN_ACCOUNT_RENT;
        }
        account.data = data;
    }

    pub fn fail_confirmation(&self, fail: bool) {
        self.fail_confirmation.store(fail, Ordering::SeqCst);
    }

    pub fn confirmed(&self) -> Vec<Signature> {
        self.confirmed.lock().clone()
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            rents: HashMap::from([
                (spl_token::state::Account::LEN, TOKEN_ACCOUNT_RENT),
                (0, RELAY_ACCOUNT_RENT),
            ]),
            lamports_per_signature: LAMPORTS_PER_SIGNATURE,
            blockhash: Hash::new_from_array([9u8; 32]),
            accounts: RwLock::new(HashMap::new()),
            confirmed: Mutex::new(Vec::new()),
            fail_confirmation: AtomicBool::new(false),
            signatures: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl crate::rpc::ChainClient for MockChain {
    async fn minimum_balance_for_rent_exemption(&self, span: usize) -> RelayResult<u64> {
        Ok(self.rents.get(&span).copied().unwrap_or(RELAY_ACCOUNT_RENT))
    }

    async fn lamports_per_signature(&self) -> RelayResult<u64> {
        Ok(self.lamports_per_signature)
    }

    async fn recent_blockhash(&self) -> RelayResult<Hash> {
        Ok(self.blockhash)
    }

    async fn account_info(&self, address: &Pubkey) -> RelayResult<Option<Account>> {
        Ok(self.accounts.read().get(address).cloned())
    }

    async fn send_transaction(&self, _transaction: &Transaction) -> RelayResult<Signature> {
        Ok(signature_from_counter(&self.signatures))
    }

    async fn wait_for_confirmation(&self, signature: &Signature) -> RelayResult<()> {
        if self.fail_confirmation.load(Ordering::SeqCst) {
            return Err(RelayError::TransactionFailed(format!(
                "{signature}: custom program error: 0x1"
            )));
        }
        self.confirmed.lock().push(*signature);
        Ok(())
    }
}

/// 注入到后端提交接口的失败类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    ConnectionClosed,
    PendingAccount,
    Rejected,
}

impl MockFailure {
    fn into_error(self) -> RelayError {
        match self {
            Self::ConnectionClosed => RelayError::TransactionFailed(
                "error sending request: connection closed before message completed".into(),
            ),
            Self::PendingAccount => RelayError::Api(RelayApiError::Backend {
                code: -32002,
                message: "Transaction simulation failed: invalid account data for instruction"
                    .into(),
                data: None,
            }),
            Self::Rejected => RelayError::Api(RelayApiError::Backend {
                code: -32002,
                message: "Transaction simulation failed: insufficient funds".into(),
                data: None,
            }),
        }
    }
}

pub struct MockBackend {
    fee_payer: Pubkey,
    usage: Mutex<UsageStatus>,
    fail_fee_payer: AtomicBool,
    relay_failures: Mutex<VecDeque<MockFailure>>,
    top_up_failures: Mutex<VecDeque<MockFailure>>,
    relayed: Mutex<Vec<Transaction>>,
    signed: Mutex<Vec<Transaction>>,
    top_ups: Mutex<Vec<TopUpWithSwapRequest>>,
    signatures: AtomicU64,
}

impl MockBackend {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.fee_payer
    }

    pub fn set_usage(&self, usage: UsageStatus) {
        *self.usage.lock() = usage;
    }

    pub fn fail_fee_payer(&self, fail: bool) {
        self.fail_fee_payer.store(fail, Ordering::SeqCst);
    }

    /// 依次消费：每次提交取出一个失败，队列为空后正常返回。
    pub fn push_relay_failure(&self, failure: MockFailure) {
        self.relay_failures.lock().push_back(failure);
    }

    pub fn push_top_up_failure(&self, failure: MockFailure) {
        self.top_up_failures.lock().push_back(failure);
    }

    pub fn relayed(&self) -> Vec<Transaction> {
        self.relayed.lock().clone()
    }

    pub fn signed(&self) -> Vec<Transaction> {
        self.signed.lock().clone()
    }

    pub fn top_ups(&self) -> Vec<TopUpWithSwapRequest> {
        self.top_ups.lock().clone()
    }

    fn next_failure(queue: &Mutex<VecDeque<MockFailure>>) -> RelayResult<()> {
        match queue.lock().pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            fee_payer: Pubkey::new_unique(),
            usage: Mutex::new(UsageStatus {
                max_usage: 100,
                current_usage: 0,
                max_amount: 10_000_000,
                amount_used: 0,
            }),
            fail_fee_payer: AtomicBool::new(false),
            relay_failures: Mutex::new(VecDeque::new()),
            top_up_failures: Mutex::new(VecDeque::new()),
            relayed: Mutex::new(Vec::new()),
            signed: Mutex::new(Vec::new()),
            top_ups: Mutex::new(Vec::new()),
            signatures: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RelayBackend for MockBackend {
    async fn fee_payer_address(&self) -> RelayResult<Pubkey> {
        if self.fail_fee_payer.load(Ordering::SeqCst) {
            return Err(RelayError::Api(RelayApiError::Schema(
                "fee payer 响应为空".into(),
            )));
        }
        Ok(self.fee_payer)
    }

    async fn usage_status(&self, _owner: &Pubkey) -> RelayResult<UsageStatus> {
        Ok(*self.usage.lock())
    }

    async fn relay_transaction(&self, transaction: &Transaction) -> RelayResult<String> {
        Self::next_failure(&self.relay_failures)?;
        self.relayed.lock().push(transaction.clone());
        Ok(signature_from_counter(&self.signatures).to_string())
    }

    async fn sign_relay_transaction(&self, transaction: &Transaction) -> RelayResult<String> {
        Self::next_failure(&self.relay_failures)?;
        self.signed.lock().push(transaction.clone());
        Ok(signature_from_counter(&self.signatures).to_string())
    }

    async fn relay_top_up_with_swap(&self, request: &TopUpWithSwapRequest) -> RelayResult<String> {
        Self::next_failure(&self.top_up_failures)?;
        self.top_ups.lock().push(request.clone());
        Ok(signature_from_counter(&self.signatures).to_string())
    }
}

/// 无手续费的恒定乘积报价。
#[derive(Default)]
pub struct MockRouter {
    reserves: RwLock<HashMap<Pubkey, (u64, u64)>>,
    routes: RwLock<Vec<PoolsPair>>,
}

impl MockRouter {
    pub fn set_reserves(&self, pool: &SwapPool, reserve_in: u64, reserve_out: u64) {
        self.reserves
            .write()
            .insert(pool.address, (reserve_in, reserve_out));
    }

    pub fn add_route(&self, pair: PoolsPair) {
        self.routes.write().push(pair);
    }

    fn reserves_of(&self, pool: &SwapPool) -> Option<(u64, u64)> {
        self.reserves.read().get(&pool.address).copied()
    }

    fn required_input(&self, pair: &PoolsPair, amount_out: u64) -> Option<u64> {
        pair.pools()
            .iter()
            .rev()
            .try_fold(amount_out, |required, pool| self.amount_in(pool, required))
    }
}

#[async_trait]
impl PoolRouter for MockRouter {
    async fn routes(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
    ) -> RelayResult<Vec<PoolsPair>> {
        Ok(self
            .routes
            .read()
            .iter()
            .filter(|pair| {
                pair.source_mint() == *source_mint && pair.destination_mint() == *destination_mint
            })
            .cloned()
            .collect())
    }

    fn best_pools_pair_for_estimated_output(
        &self,
        estimated_amount_out: u64,
        pairs: &[PoolsPair],
    ) -> Option<PoolsPair> {
        pairs
            .iter()
            .filter_map(|pair| {
                self.required_input(pair, estimated_amount_out)
                    .map(|input| (input, pair))
            })
            .min_by_key(|(input, _)| *input)
            .map(|(_, pair)| pair.clone())
    }

    fn amount_out(&self, pool: &SwapPool, amount_in: u64) -> Option<u64> {
        let (reserve_in, reserve_out) = self.reserves_of(pool)?;
        let denominator = reserve_in as u128 + amount_in as u128;
        if denominator == 0 {
            return None;
        }
        Some((reserve_out as u128 * amount_in as u128 / denominator) as u64)
    }

    fn amount_in(&self, pool: &SwapPool, amount_out: u64) -> Option<u64> {
        let (reserve_in, reserve_out) = self.reserves_of(pool)?;
        if amount_out >= reserve_out {
            return None;
        }
        let numerator = amount_out as u128 * reserve_in as u128;
        let denominator = (reserve_out - amount_out) as u128;
        Some(numerator.div_ceil(denominator) as u64)
    }

    fn minimum_amount_out(&self, pool: &SwapPool, amount_in: u64, slippage: f64) -> Option<u64> {
        let amount_out = self.amount_out(pool, amount_in)?;
        Some((amount_out as f64 * (1.0 - slippage)).floor() as u64)
    }
}
