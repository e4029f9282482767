//! Wallet connection lifecycle and chain reconciliation.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ww_api_types::{ChainDescriptor, ChainId, Notice, UserRole, WalletAddress};
use ww_chain_client::{WalletError, WalletProvider};
use ww_storage::SessionStore;

use crate::config::{CoreConfig, bounded};
use crate::notice::Notifier;
use crate::session::{Session, SessionState};
use crate::SyncError;

const MISSING_WALLET_MESSAGE: &str = "No wallet extension detected. Install a wallet to connect.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    AlreadyOnExpected,
    Switched,
    /// The wallet did not know the chain; it was added and then selected.
    Added,
    /// Another reconciliation was already talking to the wallet.
    InFlight,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::AlreadyOnExpected => "already_on_expected",
            ReconcileOutcome::Switched => "switched",
            ReconcileOutcome::Added => "added",
            ReconcileOutcome::InFlight => "in_flight",
        }
    }
}

/// Marks the session as connecting until dropped, including when the
/// connect future itself is dropped mid-request.
struct ConnectingGuard<'a>(&'a WalletSession);

impl<'a> ConnectingGuard<'a> {
    fn enter(session: &'a WalletSession) -> Self {
        session.session().connecting = true;
        Self(session)
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.session().connecting = false;
    }
}

/// Owns the connected account and keeps the wallet on the expected chain.
pub struct WalletSession {
    wallet: Option<Arc<dyn WalletProvider>>,
    store: SessionStore,
    notifier: Arc<dyn Notifier>,
    config: CoreConfig,
    session: Mutex<Session>,
    reconciling: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl WalletSession {
    pub fn new(
        wallet: Option<Arc<dyn WalletProvider>>,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        config: CoreConfig,
    ) -> Self {
        Self {
            wallet,
            store,
            notifier,
            config,
            session: Mutex::new(Session::default()),
            reconciling: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn notify(&self, silent: bool, notice: Notice) {
        if !silent {
            self.notifier.notify(notice);
        }
    }

    fn chain_name(&self) -> &str {
        &self.config.expected_chain.chain_name
    }

    pub fn expected_chain(&self) -> &ChainDescriptor {
        &self.config.expected_chain
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Session {
        self.session().clone()
    }

    pub fn state(&self) -> SessionState {
        self.session().state(self.config.expected_chain.chain_id)
    }

    pub fn require_account(&self) -> Result<WalletAddress, SyncError> {
        self.session().account.clone().ok_or(SyncError::NotConnected)
    }

    pub(crate) fn wallet(&self) -> Result<&Arc<dyn WalletProvider>, SyncError> {
        self.wallet.as_ref().ok_or(SyncError::WalletMissing)
    }

    async fn query_chain(&self, wallet: &dyn WalletProvider) -> Result<ChainId, SyncError> {
        let raw = bounded("wallet", self.config.timeouts.chain_read, wallet.chain_id()).await??;
        ChainId::parse(&raw).map_err(|err| SyncError::Wallet(WalletError::Transport(err.to_string())))
    }

    /// Restores the persisted account and role and reads the live chain.
    ///
    /// A restored account found on a foreign chain is reconciled silently.
    pub async fn init(&self) -> Result<Session, SyncError> {
        let account = self.store.load_account().await.map_err(SyncError::storage)?;
        let role = self.store.load_role().await.map_err(SyncError::storage)?;
        {
            let mut session = self.session();
            session.account = account.clone();
            session.role = role;
        }

        let Some(wallet) = self.wallet.clone() else {
            debug!("no wallet capability; session restored without a chain");
            return Ok(self.snapshot());
        };

        match self.query_chain(wallet.as_ref()).await {
            Ok(chain) => {
                self.session().chain_id = Some(chain);
                if account.is_some() && chain != self.config.expected_chain.chain_id {
                    if let Err(err) = self.reconcile(chain, true).await {
                        warn!("initial chain reconciliation failed: {}", err);
                    }
                }
            }
            Err(err) => warn!("could not read the wallet chain at start-up: {}", err),
        }
        Ok(self.snapshot())
    }

    /// Requests account access, persists the first account and brings the
    /// wallet onto the expected chain with visible feedback.
    pub async fn connect(&self) -> Result<WalletAddress, SyncError> {
        let Some(wallet) = self.wallet.clone() else {
            self.notify(false, Notice::error(MISSING_WALLET_MESSAGE));
            return Err(SyncError::WalletMissing);
        };

        let requested = {
            let _connecting = ConnectingGuard::enter(self);
            bounded("wallet", self.config.timeouts.wallet, wallet.request_accounts()).await
        };

        let accounts = match requested.and_then(|result| result.map_err(SyncError::from)) {
            Ok(accounts) => accounts,
            Err(SyncError::UserCancelled) => {
                self.notify(false, Notice::info("Wallet connection cancelled"));
                return Err(SyncError::UserCancelled);
            }
            Err(err) => {
                warn!("wallet connection failed: {}", err);
                self.notify(false, Notice::error("Failed to connect wallet"));
                return Err(err);
            }
        };
        let Some(account) = accounts.into_iter().next() else {
            self.notify(false, Notice::error("Failed to connect wallet"));
            return Err(SyncError::NotConnected);
        };

        self.store.save_account(&account).await.map_err(SyncError::storage)?;
        self.session().account = Some(account.clone());
        info!("connected {}", account.short());

        match self.query_chain(wallet.as_ref()).await {
            Ok(chain) => {
                self.session().chain_id = Some(chain);
                if let Err(err) = self.reconcile(chain, false).await {
                    warn!("chain reconciliation after connect failed: {}", err);
                }
            }
            Err(err) => warn!("could not read the wallet chain after connect: {}", err),
        }

        if let Ok(chain) = self.query_chain(wallet.as_ref()).await {
            self.session().chain_id = Some(chain);
            if chain == self.config.expected_chain.chain_id {
                let message = format!("Connected to {} successfully!", self.chain_name());
                self.notify(false, Notice::success(message));
            }
        }
        Ok(account)
    }

    /// Brings the wallet from `reported` onto the expected chain.
    ///
    /// With `silent` set no notices are emitted; failures are still returned.
    pub async fn reconcile(&self, reported: ChainId, silent: bool) -> Result<ReconcileOutcome, SyncError> {
        let expected = self.config.expected_chain.chain_id;
        self.session().chain_id = Some(reported);
        if reported == expected {
            return Ok(ReconcileOutcome::AlreadyOnExpected);
        }

        let wallet = match self.wallet() {
            Ok(wallet) => wallet.clone(),
            Err(err) => {
                self.notify(silent, Notice::error(MISSING_WALLET_MESSAGE));
                return Err(err);
            }
        };

        let Ok(_guard) = self.reconciling.try_lock() else {
            debug!("reconciliation already in flight; ignoring chain {}", reported);
            return Ok(ReconcileOutcome::InFlight);
        };

        let outcome = self.switch_or_add(wallet.as_ref(), silent).await?;
        self.session().chain_id = Some(expected);
        info!("wallet now on {} ({})", self.chain_name(), outcome.as_str());
        Ok(outcome)
    }

    async fn switch(&self, wallet: &dyn WalletProvider) -> Result<(), SyncError> {
        let expected = self.config.expected_chain.chain_id;
        bounded("wallet", self.config.timeouts.wallet, wallet.switch_chain(expected))
            .await?
            .map_err(SyncError::from)
    }

    async fn switch_or_add(&self, wallet: &dyn WalletProvider, silent: bool) -> Result<ReconcileOutcome, SyncError> {
        let chain = self.chain_name().to_owned();
        let first_attempt = self.switch(wallet).await;
        let outcome = match first_attempt {
            Ok(()) => {
                self.notify(silent, Notice::success(format!("Switched to {chain}")));
                return Ok(ReconcileOutcome::Switched);
            }
            Err(SyncError::Wallet(WalletError::UnrecognizedChain(_))) => {
                let added = bounded(
                    "wallet",
                    self.config.timeouts.wallet,
                    wallet.add_chain(&self.config.expected_chain),
                )
                .await
                .and_then(|result| result.map_err(SyncError::from));
                if let Err(err) = added {
                    warn!("adding {} to the wallet failed: {}", chain, err);
                    self.notify(
                        silent,
                        Notice::error(format!(
                            "Failed to add {chain} to your wallet. Please add it manually."
                        )),
                    );
                    return Err(err);
                }
                self.switch(wallet).await.map(|()| ReconcileOutcome::Added)
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(outcome) => {
                self.notify(
                    silent,
                    Notice::success(format!("{chain} added and switched successfully")),
                );
                Ok(outcome)
            }
            Err(SyncError::UserCancelled) => {
                self.notify(
                    silent,
                    Notice::info(format!("Please switch to {chain} to use this application")),
                );
                Err(SyncError::UserCancelled)
            }
            Err(err) => {
                warn!("switching to {} failed: {}", chain, err);
                self.notify(silent, Notice::error(format!("Failed to switch to {chain}")));
                Err(err)
            }
        }
    }

    /// Reads the wallet's current chain and reconciles it.
    pub async fn reconcile_current(&self, silent: bool) -> Result<ReconcileOutcome, SyncError> {
        let wallet = match self.wallet() {
            Ok(wallet) => wallet.clone(),
            Err(err) => {
                self.notify(silent, Notice::error(MISSING_WALLET_MESSAGE));
                return Err(err);
            }
        };
        let chain = self.query_chain(wallet.as_ref()).await?;
        self.reconcile(chain, silent).await
    }

    /// Forgets the account, role and chain locally. The wallet is not contacted.
    pub async fn disconnect(&self) -> Result<(), SyncError> {
        {
            let mut session = self.session();
            session.account = None;
            session.role = None;
            session.chain_id = None;
        }
        self.store.clear_account().await.map_err(SyncError::storage)?;
        self.store.save_role(None).await.map_err(SyncError::storage)?;
        self.notify(false, Notice::info("Wallet disconnected"));
        Ok(())
    }

    pub async fn set_role(&self, role: Option<UserRole>) -> Result<(), SyncError> {
        self.store.save_role(role).await.map_err(SyncError::storage)?;
        self.session().role = role;
        Ok(())
    }

    async fn on_chain_changed(&self, raw: &str) {
        let chain = match ChainId::parse(raw) {
            Ok(chain) => chain,
            Err(err) => {
                warn!("ignoring chain change event: {}", err);
                return;
            }
        };
        debug!("wallet reported chain {}", chain);
        if let Err(err) = self.reconcile(chain, true).await {
            warn!("passive chain reconciliation failed: {}", err);
        }
    }

    /// Subscribes to the wallet's chain-change events. Returns `false` when a
    /// listener is already running or there is no wallet.
    pub fn attach_chain_listener(self: &Arc<Self>) -> bool {
        let Some(wallet) = self.wallet.as_ref() else {
            return false;
        };
        let mut listener = self.listener.lock().unwrap_or_else(|p| p.into_inner());
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let mut events = wallet.subscribe_chain_changed();
        let weak: Weak<Self> = Arc::downgrade(self);
        *listener = Some(tokio::spawn(async move {
            loop {
                let raw = match events.recv().await {
                    Ok(raw) => raw,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("missed {} chain change events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.on_chain_changed(&raw).await;
            }
            debug!("chain listener stopped");
        }));
        true
    }

    /// Stops the chain-change listener, if any.
    pub fn detach(&self) {
        let handle = self.listener.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.detach();
    }
}
