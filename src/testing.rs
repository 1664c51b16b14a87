//! Shared fixtures for unit tests.

use async_trait::async_trait;
use ethers::signers::Signer;
use ethers::utils::to_checksum;
use sea_orm::DatabaseConnection;
use secrecy::{ ExposeSecret, SecretSlice };
use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use uuid::Uuid;

use crate::app::WalletCore;
use crate::config::NetworkPolicy;
use crate::chains::evm::wallet as evm_wallet;
use crate::crypto::{ Encryptor, MemoryKeyStore };
use crate::enums::{ Chain, TxStatus };
use crate::error::{ AppError, Result };
use crate::providers::{
    ChainAdapter,
    KeyPair,
    SignedTransfer,
    SubmittedTransfer,
    TransferRequest,
};
use crate::rpc::AdapterRegistry;
use crate::services::{ TransferService, WalletService };

/// 21000 gas at 20 gwei.
pub const MOCK_FEE: u128 = 420_000_000_000_000;

/// Fresh in-memory database with the schema applied.
pub async fn test_db() -> DatabaseConnection {
    crate::db::connect("sqlite::memory:").await.unwrap()
}

/// Scriptable adapter. Uses secp256k1 keys and `0x` addresses whatever
/// chain it claims, and counts every call that would hit the network.
pub struct MockAdapter {
    chain: Chain,
    balance: Mutex<u128>,
    confirmation: Mutex<TxStatus>,
    delay: Option<Duration>,
    network_calls: AtomicUsize,
    submissions: AtomicUsize,
    fail_balance: AtomicBool,
    fail_submit: AtomicBool,
    fail_status: AtomicBool,
    hang: AtomicBool,
}

impl MockAdapter {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            balance: Mutex::new(0),
            confirmation: Mutex::new(TxStatus::Pending),
            delay: None,
            network_calls: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            fail_balance: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            hang: AtomicBool::new(false),
        }
    }

    /// Every network call sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_balance(&self, balance: u128) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_confirmation_status(&self, status: TxStatus) {
        *self.confirmation.lock().unwrap() = status;
    }

    pub fn fail_balance_queries(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_queries(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Network calls never complete while set.
    pub fn hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub fn reset_network_calls(&self) {
        self.network_calls.store(0, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    async fn network_round_trip(&self) {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        evm_wallet::generate_key_pair()
    }

    fn derive_address(&self, public_key: &[u8]) -> Result<String> {
        evm_wallet::derive_address(public_key)
    }

    fn validate_address(&self, address: &str) -> bool {
        evm_wallet::validate_address(address)
    }

    async fn get_balance(&self, _address: &str) -> Result<u128> {
        self.network_round_trip().await;
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(AppError::BalanceQuery("mock outage".to_string()));
        }
        Ok(*self.balance.lock().unwrap())
    }

    // Leaves the balance check to the caller
    async fn build_and_sign_transfer(
        &self,
        private_key: &SecretSlice<u8>,
        request: &TransferRequest
    ) -> Result<SignedTransfer> {
        self.network_round_trip().await;

        let signer = evm_wallet::wallet_from_secret(private_key.expose_secret())?;
        if to_checksum(&signer.address(), None) != request.from {
            return Err(AppError::InvalidPrivateKey);
        }

        let tx_hash = format!("0x{}", Uuid::new_v4().simple());
        SignedTransfer::new(self.chain, tx_hash, Vec::new(), MOCK_FEE)
    }

    async fn submit(&self, signed: SignedTransfer) -> Result<SubmittedTransfer> {
        self.network_round_trip().await;
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(AppError::Broadcast("mock node rejected transaction".to_string()));
        }

        self.submissions.fetch_add(1, Ordering::SeqCst);
        let tx_hash = signed.tx_hash.clone();
        signed.into_submitted(tx_hash)
    }

    async fn confirmation_status(&self, _tx_hash: &str) -> Result<TxStatus> {
        self.network_round_trip().await;
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(AppError::Rpc("mock outage".to_string()));
        }
        Ok(*self.confirmation.lock().unwrap())
    }
}

/// A wired `WalletCore` over an in-memory database and mock adapters.
pub struct Harness {
    pub db: DatabaseConnection,
    pub wallets: Arc<WalletService>,
    pub transfers: Arc<TransferService>,
    mocks: HashMap<Chain, Arc<MockAdapter>>,
}

impl Harness {
    pub async fn new(adapters: Vec<MockAdapter>) -> Self {
        Self::with_policy(adapters, NetworkPolicy {
            balance_query_retries: 1,
            timeout_override: None,
        }).await
    }

    /// Every network call gives up after `timeout`.
    pub async fn with_network_timeout(adapters: Vec<MockAdapter>, timeout: Duration) -> Self {
        Self::with_policy(adapters, NetworkPolicy {
            balance_query_retries: 1,
            timeout_override: Some(timeout),
        }).await
    }

    async fn with_policy(adapters: Vec<MockAdapter>, policy: NetworkPolicy) -> Self {
        let db = test_db().await;
        let registry = AdapterRegistry::new();
        let mut mocks = HashMap::new();

        for adapter in adapters {
            let adapter = Arc::new(adapter);
            mocks.insert(adapter.chain(), adapter.clone());
            registry.register(adapter).await;
        }

        let encryptor = Encryptor::initialize(&MemoryKeyStore::new()).await.unwrap();
        let core = WalletCore::from_parts(db.clone(), registry, encryptor, policy);

        Self {
            db,
            wallets: core.wallets(),
            transfers: core.transfers(),
            mocks,
        }
    }

    pub fn adapter(&self, chain: Chain) -> Arc<MockAdapter> {
        self.mocks[&chain].clone()
    }
}
