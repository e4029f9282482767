mod config;
mod error;
mod jobs;
mod notice;
mod payments;
mod profile;
mod session;
mod units;
mod wallet;

use std::sync::Arc;
use tracing::{info, warn};
use ww_api_types::{Cid, JobDraft, JobListing, Notice, ProfileRecord};
use ww_chain_client::memory::{
    MemoryContentStore, MemoryJobsRegistry, MemoryProfileRegistry,
};
use ww_chain_client::{ContentStore, JobsRegistry, ProfileRegistry, TxReceipt, WalletProvider};
use ww_storage::SessionStore;

pub use config::{CoreConfig, Timeouts};
pub use error::SyncError;
pub use jobs::{JobBoard, PublishedJob, normalise_posting, validate_draft};
pub use notice::{NoticeBuffer, Notifier, TracingNotifier};
pub use payments::send_payment;
pub use profile::{FileAttachment, ProfileSync, PublishedProfile};
pub use session::{Session, SessionState};
pub use units::{format_units, now_rfc3339, parse_units, rfc3339};
pub use wallet::{ReconcileOutcome, WalletSession};

/// The external capabilities a [`WalletCore`] is composed from.
pub struct Backends {
    pub wallet: Option<Arc<dyn WalletProvider>>,
    pub content: Arc<dyn ContentStore>,
    pub profiles: Arc<dyn ProfileRegistry>,
    pub jobs: Arc<dyn JobsRegistry>,
}

impl Backends {
    /// Offline backends: nothing leaves the process.
    pub fn in_memory(wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            wallet,
            content: Arc::new(MemoryContentStore::default()),
            profiles: Arc::new(MemoryProfileRegistry::default()),
            jobs: Arc::new(MemoryJobsRegistry::default()),
        }
    }
}

/// Ties the session, profile and job flows together and reports outcomes
/// through the notifier.
pub struct WalletCore {
    session: Arc<WalletSession>,
    profiles: ProfileSync,
    jobs: JobBoard,
    notifier: Arc<dyn Notifier>,
}

impl WalletCore {
    pub fn new(
        backends: Backends,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        config: CoreConfig,
    ) -> Arc<Self> {
        let timeouts = config.timeouts;
        let session = Arc::new(WalletSession::new(
            backends.wallet,
            store.clone(),
            notifier.clone(),
            config,
        ));
        Arc::new(Self {
            session,
            profiles: ProfileSync::new(backends.content.clone(), backends.profiles, store, timeouts),
            jobs: JobBoard::new(backends.content, backends.jobs, timeouts),
            notifier,
        })
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn profiles(&self) -> &ProfileSync {
        &self.profiles
    }

    pub fn jobs(&self) -> &JobBoard {
        &self.jobs
    }

    /// Restores the persisted session and starts following chain changes.
    pub async fn start(&self) -> Result<Session, SyncError> {
        let session = self.session.init().await?;
        if self.session.attach_chain_listener() {
            info!("following wallet chain changes");
        }
        Ok(session)
    }

    pub fn shutdown(&self) {
        self.session.detach();
    }

    fn report_failure(&self, err: &SyncError, message: &str) {
        match err {
            SyncError::UserCancelled => self.notifier.notify(Notice::info("Request cancelled in wallet")),
            _ => {
                warn!("{}: {}", message, err);
                self.notifier.notify(Notice::error(message));
            }
        }
    }

    /// Publishes the connected account's profile.
    pub async fn publish_profile(
        &self,
        edited: ProfileRecord,
        avatar: Option<FileAttachment>,
    ) -> Result<PublishedProfile, SyncError> {
        let owner = self.session.require_account()?;
        match self.profiles.publish(&owner, edited, avatar).await {
            Ok(published) => {
                self.notifier.notify(Notice::success("Profile updated"));
                Ok(published)
            }
            Err(err) => {
                self.report_failure(&err, "Error saving profile. Please try again.");
                Err(err)
            }
        }
    }

    /// The connected account's registered profile, refreshed from the registry.
    pub async fn my_profile(&self) -> Result<ProfileRecord, SyncError> {
        let owner = self.session.require_account()?;
        self.profiles.refresh_local(&owner).await
    }

    pub async fn profile_by_cid(&self, cid: &Cid) -> Result<ProfileRecord, SyncError> {
        self.profiles.resolve_cid(cid).await
    }

    /// Posts a job as the connected account, attributed to its local profile
    /// when that profile is the account's own.
    pub async fn post_job(
        &self,
        draft: JobDraft,
        logo: Option<FileAttachment>,
    ) -> Result<PublishedJob, SyncError> {
        let poster = self.session.require_account()?;
        let profile = self.profiles.load_local_for(&poster).await?;
        match self.jobs.publish(&poster, profile.as_ref(), draft, logo).await {
            Ok(job) => {
                self.notifier.notify(Notice::success("Job posted successfully!"));
                Ok(job)
            }
            Err(err) => {
                self.report_failure(&err, "Failed to post job");
                Err(err)
            }
        }
    }

    pub async fn discover_jobs(&self) -> Result<Vec<JobListing>, SyncError> {
        self.jobs.discover().await
    }

    pub async fn send_payment(&self, to: &str, amount: &str) -> Result<TxReceipt, SyncError> {
        send_payment(&self.session, to, amount).await
    }
}
