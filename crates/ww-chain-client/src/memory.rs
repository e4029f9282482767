//! In-process backends for offline development and tests.
//!
//! All backends can share one [`CallTrace`] so the relative order of calls
//! across wallet, storage and registries can be inspected afterwards.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use ww_api_types::{ChainDescriptor, ChainId, Cid, WalletAddress};

use crate::{
    ContentStore, JobsRegistry, ProfileRegistry, RegistryError, TransactionRequest, TxHash,
    TxReceipt, WalletError, WalletProvider,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn digest_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

#[derive(Clone, Default)]
pub struct CallTrace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallTrace {
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.entries).iter().position(|recorded| recorded == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|recorded| recorded.as_str() == entry)
            .count()
    }
}

struct WalletState {
    chain: ChainId,
    known_chains: HashSet<ChainId>,
    account_error: Option<WalletError>,
    switch_error: Option<WalletError>,
    add_error: Option<WalletError>,
    switch_delay: Option<Duration>,
    account_delay: Option<Duration>,
    sent: Vec<TransactionRequest>,
    receipts: HashMap<TxHash, TxReceipt>,
    next_block: u64,
}

/// A wallet that approves everything unless told otherwise.
pub struct MemoryWallet {
    accounts: Vec<WalletAddress>,
    state: Mutex<WalletState>,
    events: broadcast::Sender<String>,
    trace: CallTrace,
}

impl MemoryWallet {
    pub fn new(account: WalletAddress, chain: ChainId) -> Self {
        Self::with_trace(account, chain, CallTrace::default())
    }

    pub fn with_trace(account: WalletAddress, chain: ChainId, trace: CallTrace) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: vec![account],
            state: Mutex::new(WalletState {
                chain,
                known_chains: HashSet::from([chain]),
                account_error: None,
                switch_error: None,
                add_error: None,
                switch_delay: None,
                account_delay: None,
                sent: Vec::new(),
                receipts: HashMap::new(),
                next_block: 1,
            }),
            events,
            trace,
        }
    }

    pub fn knows_chain(&self, chain: ChainId) {
        lock(&self.state).known_chains.insert(chain);
    }

    pub fn set_account_error(&self, error: Option<WalletError>) {
        lock(&self.state).account_error = error;
    }

    pub fn set_switch_error(&self, error: Option<WalletError>) {
        lock(&self.state).switch_error = error;
    }

    pub fn set_add_error(&self, error: Option<WalletError>) {
        lock(&self.state).add_error = error;
    }

    pub fn set_switch_delay(&self, delay: Option<Duration>) {
        lock(&self.state).switch_delay = delay;
    }

    /// Holds account requests open, like a wallet prompt nobody answers yet.
    pub fn set_account_delay(&self, delay: Option<Duration>) {
        lock(&self.state).account_delay = delay;
    }

    pub fn current_chain(&self) -> ChainId {
        lock(&self.state).chain
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        lock(&self.state).sent.clone()
    }

    /// Simulates the user picking another network in the wallet UI.
    pub fn emit_chain_changed(&self, chain: ChainId) {
        {
            let mut state = lock(&self.state);
            state.chain = chain;
            state.known_chains.insert(chain);
        }
        let _ = self.events.send(chain.to_hex());
    }
}

#[async_trait]
impl WalletProvider for MemoryWallet {
    async fn request_accounts(&self) -> Result<Vec<WalletAddress>, WalletError> {
        self.trace.record("wallet.request_accounts");
        let delay = lock(&self.state).account_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = lock(&self.state).account_error.clone() {
            return Err(err);
        }
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> Result<String, WalletError> {
        Ok(lock(&self.state).chain.to_hex())
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError> {
        self.trace.record("wallet.switch_chain");
        let delay = lock(&self.state).switch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = lock(&self.state);
            if let Some(err) = state.switch_error.clone() {
                return Err(err);
            }
            if !state.known_chains.contains(&chain_id) {
                return Err(WalletError::UnrecognizedChain(chain_id.to_hex()));
            }
            state.chain = chain_id;
        }
        let _ = self.events.send(chain_id.to_hex());
        Ok(())
    }

    async fn add_chain(&self, descriptor: &ChainDescriptor) -> Result<(), WalletError> {
        self.trace.record("wallet.add_chain");
        let mut state = lock(&self.state);
        if let Some(err) = state.add_error.clone() {
            return Err(err);
        }
        state.known_chains.insert(descriptor.chain_id);
        Ok(())
    }

    async fn send_transaction(
        &self,
        from: &WalletAddress,
        tx: TransactionRequest,
    ) -> Result<TxHash, WalletError> {
        self.trace.record("wallet.send_transaction");
        let mut state = lock(&self.state);
        let nonce = state.sent.len().to_be_bytes();
        let tx_hash = TxHash(format!(
            "0x{}",
            digest_hex(&[
                from.as_str().as_bytes(),
                tx.to.as_str().as_bytes(),
                &tx.value.to_be_bytes(),
                &tx.data,
                &nonce,
            ])
        ));
        let block_number = state.next_block;
        state.next_block += 1;
        state.receipts.insert(
            tx_hash.clone(),
            TxReceipt {
                tx_hash: tx_hash.clone(),
                block_number,
                success: true,
            },
        );
        state.sent.push(tx);
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, WalletError> {
        Ok(lock(&self.state).receipts.get(tx_hash).cloned())
    }

    fn subscribe_chain_changed(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct ContentState {
    objects: HashMap<Cid, Vec<u8>>,
    fail_uploads: bool,
    fail_verification: bool,
    fail_unpin: bool,
}

/// Content store that derives CIDs from a SHA-256 of the stored bytes.
pub struct MemoryContentStore {
    gateway: String,
    state: Mutex<ContentState>,
    trace: CallTrace,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::with_trace(CallTrace::default())
    }
}

impl MemoryContentStore {
    pub fn with_trace(trace: CallTrace) -> Self {
        Self {
            gateway: "memory://gateway".to_owned(),
            state: Mutex::new(ContentState::default()),
            trace,
        }
    }

    /// Stores arbitrary bytes, bypassing JSON encoding.
    pub fn put_raw(&self, bytes: &[u8]) -> Cid {
        let cid = Self::cid_for(bytes);
        lock(&self.state).objects.insert(cid.clone(), bytes.to_vec());
        cid
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        lock(&self.state).objects.contains_key(cid)
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        lock(&self.state).fail_uploads = fail;
    }

    pub fn set_fail_verification(&self, fail: bool) {
        lock(&self.state).fail_verification = fail;
    }

    pub fn set_fail_unpin(&self, fail: bool) {
        lock(&self.state).fail_unpin = fail;
    }

    fn cid_for(bytes: &[u8]) -> Cid {
        let digest = digest_hex(&[bytes]);
        Cid(format!("bafkrei{}", &digest[..52]))
    }

    fn store(&self, bytes: Vec<u8>) -> Result<Cid> {
        let mut state = lock(&self.state);
        if state.fail_uploads {
            bail!("upload rejected by memory content store");
        }
        let cid = Self::cid_for(&bytes);
        state.objects.insert(cid.clone(), bytes);
        Ok(cid)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload_json(&self, value: &serde_json::Value) -> Result<Cid> {
        self.trace.record("content.upload_json");
        self.store(serde_json::to_vec(value)?)
    }

    async fn upload_file(&self, _file_name: &str, bytes: Vec<u8>) -> Result<Cid> {
        self.trace.record("content.upload_file");
        self.store(bytes)
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        self.trace.record("content.fetch");
        lock(&self.state)
            .objects
            .get(cid)
            .cloned()
            .ok_or_else(|| anyhow!("gateway returned 404 for {cid}"))
    }

    async fn verify_resolvable(&self, url: &str) -> Result<()> {
        self.trace.record("content.verify");
        let state = lock(&self.state);
        if state.fail_verification {
            bail!("gateway did not serve {url}");
        }
        let resolvable = url
            .rsplit('/')
            .next()
            .map(|cid| state.objects.contains_key(&Cid(cid.to_owned())))
            .unwrap_or(false);
        if !resolvable {
            bail!("gateway did not serve {url}");
        }
        Ok(())
    }

    async fn unpin(&self, cid: &Cid) -> Result<()> {
        self.trace.record("content.unpin");
        let mut state = lock(&self.state);
        if state.fail_unpin {
            bail!("unpin rejected by memory content store");
        }
        state.objects.remove(cid);
        Ok(())
    }

    fn gateway_url(&self, cid: &Cid) -> String {
        format!("{}/ipfs/{}", self.gateway, cid)
    }
}

fn synthetic_receipt(parts: &[&[u8]], block_number: u64) -> TxReceipt {
    TxReceipt {
        tx_hash: TxHash(format!("0x{}", digest_hex(parts))),
        block_number,
        success: true,
    }
}

#[derive(Default)]
pub struct MemoryProfileRegistry {
    pointers: Mutex<HashMap<String, Cid>>,
    fail_updates: Mutex<bool>,
    trace: CallTrace,
}

impl MemoryProfileRegistry {
    pub fn with_trace(trace: CallTrace) -> Self {
        Self {
            trace,
            ..Self::default()
        }
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *lock(&self.fail_updates) = fail;
    }
}

#[async_trait]
impl ProfileRegistry for MemoryProfileRegistry {
    async fn profile_cid(&self, owner: &WalletAddress) -> Result<Option<Cid>, RegistryError> {
        self.trace.record("profile.get");
        Ok(lock(&self.pointers)
            .get(&owner.as_str().to_ascii_lowercase())
            .cloned())
    }

    async fn update_profile_cid(
        &self,
        owner: &WalletAddress,
        cid: &Cid,
    ) -> Result<TxReceipt, RegistryError> {
        self.trace.record("profile.update");
        if *lock(&self.fail_updates) {
            return Err(RegistryError::Reverted("update rejected".to_owned()));
        }
        let mut pointers = lock(&self.pointers);
        pointers.insert(owner.as_str().to_ascii_lowercase(), cid.clone());
        Ok(synthetic_receipt(
            &[owner.as_str().as_bytes(), cid.as_str().as_bytes()],
            pointers.len() as u64,
        ))
    }
}

#[derive(Default)]
pub struct MemoryJobsRegistry {
    active: Mutex<Vec<Cid>>,
    trace: CallTrace,
}

impl MemoryJobsRegistry {
    pub fn with_trace(trace: CallTrace) -> Self {
        Self {
            trace,
            ..Self::default()
        }
    }

    /// Appends a CID without a transaction, e.g. to seed fixtures.
    pub fn push(&self, cid: Cid) {
        lock(&self.active).push(cid);
    }
}

#[async_trait]
impl JobsRegistry for MemoryJobsRegistry {
    async fn active_jobs(&self) -> Result<Vec<Cid>, RegistryError> {
        self.trace.record("jobs.active");
        Ok(lock(&self.active).clone())
    }

    async fn post_job(&self, poster: &WalletAddress, cid: &Cid) -> Result<TxReceipt, RegistryError> {
        self.trace.record("jobs.post");
        let mut active = lock(&self.active);
        active.push(cid.clone());
        Ok(synthetic_receipt(
            &[poster.as_str().as_bytes(), cid.as_str().as_bytes()],
            active.len() as u64,
        ))
    }
}
