//! Publishing and resolving profile snapshots.
//!
//! A publish always uploads before it registers and registers before it
//! retires the previous snapshot, so the on-chain pointer never references
//! content that was not uploaded first.

use std::sync::Arc;
use tracing::{debug, info, warn};
use ww_api_types::{Cid, ProfileRecord, WalletAddress};
use ww_chain_client::{ContentStore, ProfileRegistry};
use ww_storage::SessionStore;

use crate::config::{Timeouts, bounded};
use crate::units::now_rfc3339;
use crate::SyncError;

/// A file picked by the user, e.g. an avatar or a company logo.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedProfile {
    pub cid: Cid,
    pub profile: ProfileRecord,
}

/// Uploads a file and confirms the gateway serves it. Returns its public URL.
pub(crate) async fn upload_verified(
    content: &dyn ContentStore,
    timeouts: &Timeouts,
    attachment: FileAttachment,
) -> Result<String, SyncError> {
    let cid = bounded(
        "content storage",
        timeouts.storage,
        content.upload_file(&attachment.file_name, attachment.bytes),
    )
    .await?
    .map_err(|err| SyncError::Upload(format!("{err:#}")))?;

    let url = content.gateway_url(&cid);
    bounded("content storage", timeouts.storage, content.verify_resolvable(&url))
        .await?
        .map_err(|err| SyncError::VerificationFailed {
            url: url.clone(),
            reason: format!("{err:#}"),
        })?;
    debug!("verified upload {} at {}", attachment.file_name, url);
    Ok(url)
}

/// Fetches `cid` and parses it as JSON, rejecting HTML error pages.
pub(crate) async fn fetch_json<T: serde::de::DeserializeOwned>(
    content: &dyn ContentStore,
    timeouts: &Timeouts,
    cid: &Cid,
) -> Result<T, SyncError> {
    let failed = |reason: String| SyncError::ResolutionFailed {
        cid: cid.to_string(),
        reason,
    };
    let bytes = bounded("content storage", timeouts.storage, content.fetch(cid))
        .await?
        .map_err(|err| failed(format!("{err:#}")))?;

    let body = String::from_utf8_lossy(&bytes);
    if body.trim_start().starts_with('<') {
        return Err(failed("gateway returned an HTML page".to_owned()));
    }
    serde_json::from_str(&body).map_err(|err| failed(format!("not valid JSON: {err}")))
}

pub struct ProfileSync {
    content: Arc<dyn ContentStore>,
    registry: Arc<dyn ProfileRegistry>,
    store: SessionStore,
    timeouts: Timeouts,
}

impl ProfileSync {
    pub fn new(
        content: Arc<dyn ContentStore>,
        registry: Arc<dyn ProfileRegistry>,
        store: SessionStore,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            content,
            registry,
            store,
            timeouts,
        }
    }

    /// Publishes `edited` as the profile of `owner`.
    ///
    /// Avatar and snapshot failures abort before the registry is updated. A
    /// failed registry update leaves the previous pointer in place. Removing
    /// the superseded snapshot is best-effort and only ever targets the CID
    /// the registry held for `owner`, never one named by the caller.
    pub async fn publish(
        &self,
        owner: &WalletAddress,
        edited: ProfileRecord,
        avatar: Option<FileAttachment>,
    ) -> Result<PublishedProfile, SyncError> {
        let previous = self.registered_cid(owner).await;

        let mut snapshot = edited;
        if let Some(avatar) = avatar {
            snapshot.profile_pic =
                upload_verified(self.content.as_ref(), &self.timeouts, avatar).await?;
        }
        snapshot.wallet = owner.to_string();
        snapshot.last_updated = Some(now_rfc3339());

        let document = serde_json::to_value(&snapshot).map_err(anyhow::Error::from)?;
        let cid = bounded(
            "content storage",
            self.timeouts.storage,
            self.content.upload_json(&document),
        )
        .await?
        .map_err(|err| SyncError::Upload(format!("{err:#}")))?;
        info!("uploaded profile snapshot {} for {}", cid, owner.short());

        let receipt = bounded(
            "profile registry",
            self.timeouts.confirmation,
            self.registry.update_profile_cid(owner, &cid),
        )
        .await??;
        info!(
            "profile pointer for {} now {} (tx {})",
            owner.short(),
            cid,
            receipt.tx_hash.0
        );

        if let Some(previous) = previous.filter(|previous| *previous != cid) {
            match bounded("content storage", self.timeouts.storage, self.content.unpin(&previous)).await {
                Ok(Ok(())) => debug!("unpinned superseded profile {}", previous),
                Ok(Err(err)) => warn!("could not unpin superseded profile {}: {:#}", previous, err),
                Err(err) => warn!("could not unpin superseded profile {}: {}", previous, err),
            }
        }

        snapshot.last_cid = Some(cid.to_string());
        self.store
            .save_profile(&snapshot)
            .await
            .map_err(SyncError::storage)?;
        Ok(PublishedProfile {
            cid,
            profile: snapshot,
        })
    }

    /// The pointer currently registered for `owner`, read before a publish so
    /// only a snapshot the owner actually holds is ever retired.
    async fn registered_cid(&self, owner: &WalletAddress) -> Option<Cid> {
        let registered = bounded(
            "profile registry",
            self.timeouts.chain_read,
            self.registry.profile_cid(owner),
        )
        .await
        .and_then(|result| result.map_err(SyncError::from));
        match registered {
            Ok(cid) => cid,
            Err(err) => {
                warn!("could not read the current profile pointer of {}: {}", owner.short(), err);
                None
            }
        }
    }

    /// Looks up and fetches the profile registered for `owner`.
    pub async fn resolve(&self, owner: &WalletAddress) -> Result<ProfileRecord, SyncError> {
        let registered = bounded(
            "profile registry",
            self.timeouts.chain_read,
            self.registry.profile_cid(owner),
        )
        .await??;
        let Some(registered) = registered else {
            return Err(SyncError::NotRegistered(owner.clone()));
        };
        let cid = Cid::parse(registered.as_str()).ok_or_else(|| SyncError::ResolutionFailed {
            cid: registered.to_string(),
            reason: "registry holds a malformed CID".to_owned(),
        })?;
        self.resolve_cid(&cid).await
    }

    /// Fetches a profile snapshot directly by CID.
    pub async fn resolve_cid(&self, cid: &Cid) -> Result<ProfileRecord, SyncError> {
        let mut profile: ProfileRecord = fetch_json(self.content.as_ref(), &self.timeouts, cid).await?;
        profile.last_cid = Some(cid.to_string());
        Ok(profile)
    }

    /// Resolves the owner's profile and keeps it as the local copy.
    pub async fn refresh_local(&self, owner: &WalletAddress) -> Result<ProfileRecord, SyncError> {
        let profile = self.resolve(owner).await?;
        self.store
            .save_profile(&profile)
            .await
            .map_err(SyncError::storage)?;
        Ok(profile)
    }

    pub async fn load_local(&self) -> Result<Option<ProfileRecord>, SyncError> {
        self.store.load_profile().await.map_err(SyncError::storage)
    }

    /// The locally cached profile, only when it was published by `owner`.
    pub async fn load_local_for(
        &self,
        owner: &WalletAddress,
    ) -> Result<Option<ProfileRecord>, SyncError> {
        Ok(self
            .load_local()
            .await?
            .filter(|profile| profile.wallet.eq_ignore_ascii_case(owner.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_api_types::SocialLinks;
    use ww_chain_client::memory::{CallTrace, MemoryContentStore, MemoryProfileRegistry};

    fn owner() -> WalletAddress {
        WalletAddress("0x08fd000000000000000000000000000000006a19".to_owned())
    }

    struct Harness {
        content: Arc<MemoryContentStore>,
        registry: Arc<MemoryProfileRegistry>,
        store: SessionStore,
        trace: CallTrace,
        sync: ProfileSync,
    }

    fn harness() -> Harness {
        let trace = CallTrace::default();
        let content = Arc::new(MemoryContentStore::with_trace(trace.clone()));
        let registry = Arc::new(MemoryProfileRegistry::with_trace(trace.clone()));
        let store = SessionStore::in_memory();
        let sync = ProfileSync::new(
            content.clone(),
            registry.clone(),
            store.clone(),
            Timeouts::default(),
        );
        Harness {
            content,
            registry,
            store,
            trace,
            sync,
        }
    }

    fn edited() -> ProfileRecord {
        ProfileRecord {
            name: "Ada Lovelace".to_owned(),
            bio: "Analytical engines and smart contracts".to_owned(),
            skills: vec!["Solidity".to_owned(), "Rust".to_owned()],
            social: SocialLinks {
                linkedin: "https://linkedin.com/in/ada".to_owned(),
                twitter: "@ada".to_owned(),
            },
            ..ProfileRecord::default()
        }
    }

    fn avatar() -> FileAttachment {
        FileAttachment {
            file_name: "avatar.png".to_owned(),
            bytes: b"\x89PNG fake image".to_vec(),
        }
    }

    #[tokio::test]
    async fn publish_round_trip_replaces_previous_pointer() {
        let h = harness();
        let first = h.sync.publish(&owner(), edited(), None).await.unwrap();

        let mut second_edit = first.profile.clone();
        second_edit.bio = "Now shipping zk circuits".to_owned();
        let second = h.sync.publish(&owner(), second_edit, Some(avatar())).await.unwrap();
        assert_ne!(first.cid, second.cid);

        let resolved = h.sync.resolve(&owner()).await.unwrap();
        assert_eq!(resolved.name, "Ada Lovelace");
        assert_eq!(resolved.bio, "Now shipping zk circuits");
        assert_eq!(resolved.skills, edited().skills);
        assert_eq!(resolved.social, edited().social);
        assert_eq!(resolved.wallet, owner().to_string());
        assert_eq!(resolved.last_cid.as_deref(), Some(second.cid.as_str()));
        assert!(h.content.verify_resolvable(&resolved.profile_pic).await.is_ok());

        assert_eq!(h.registry.profile_cid(&owner()).await.unwrap(), Some(second.cid.clone()));
        assert!(!h.content.contains(&first.cid));
        assert_eq!(
            h.store.load_profile().await.unwrap().and_then(|p| p.last_cid),
            Some(second.cid.to_string())
        );
    }

    #[tokio::test]
    async fn upload_precedes_registry_update() {
        let h = harness();
        h.sync.publish(&owner(), edited(), Some(avatar())).await.unwrap();
        let entries = h.trace.entries();
        assert_eq!(
            entries,
            vec![
                "profile.get",
                "content.upload_file",
                "content.verify",
                "content.upload_json",
                "profile.update"
            ]
        );
    }

    #[tokio::test]
    async fn failed_upload_never_reaches_the_registry() {
        let h = harness();
        h.content.set_fail_uploads(true);
        let err = h.sync.publish(&owner(), edited(), None).await.unwrap_err();
        assert!(matches!(err, SyncError::Upload(_)));
        assert_eq!(h.trace.position("profile.update"), None);
        assert_eq!(h.trace.entries(), vec!["profile.get", "content.upload_json"]);
    }

    #[tokio::test]
    async fn unverifiable_avatar_aborts_publish() {
        let h = harness();
        h.content.set_fail_verification(true);
        let err = h.sync.publish(&owner(), edited(), Some(avatar())).await.unwrap_err();
        assert!(matches!(err, SyncError::VerificationFailed { .. }));
        assert_eq!(h.trace.position("content.upload_json"), None);
        assert_eq!(h.trace.position("profile.update"), None);
    }

    #[tokio::test]
    async fn failed_registration_keeps_previous_pointer() {
        let h = harness();
        let first = h.sync.publish(&owner(), edited(), None).await.unwrap();

        h.registry.set_fail_updates(true);
        let mut next = first.profile.clone();
        next.name = "Countess".to_owned();
        assert!(h.sync.publish(&owner(), next, None).await.is_err());

        assert_eq!(h.registry.profile_cid(&owner()).await.unwrap(), Some(first.cid.clone()));
        assert!(h.content.contains(&first.cid));
        assert_eq!(h.sync.resolve(&owner()).await.unwrap().name, "Ada Lovelace");
        assert_eq!(h.trace.count("profile.update"), 2);
        assert_eq!(h.trace.count("content.unpin"), 0);
    }

    #[tokio::test]
    async fn unpin_failure_is_not_fatal() {
        let h = harness();
        let first = h.sync.publish(&owner(), edited(), None).await.unwrap();
        h.content.set_fail_unpin(true);

        let mut next = first.profile.clone();
        next.bio = "changed".to_owned();
        let second = h.sync.publish(&owner(), next, None).await.unwrap();
        assert_eq!(h.registry.profile_cid(&owner()).await.unwrap(), Some(second.cid));
        assert_eq!(h.trace.count("content.unpin"), 1);
    }

    #[tokio::test]
    async fn another_owner_on_the_same_store_never_retires_the_first_snapshot() {
        let h = harness();
        let alice = h.sync.publish(&owner(), edited(), None).await.unwrap();

        let bob = WalletAddress("0x976ea74026e726554db657fa54763abd0c3a0aa9".to_owned());
        let bob_profile = ProfileRecord {
            name: "Bob".to_owned(),
            ..ProfileRecord::default()
        };
        h.sync.publish(&bob, bob_profile, None).await.unwrap();

        assert!(h.content.contains(&alice.cid));
        assert_eq!(h.sync.resolve(&owner()).await.unwrap().name, "Ada Lovelace");
        assert_eq!(h.trace.count("content.unpin"), 0);
    }

    #[tokio::test]
    async fn caller_supplied_last_cid_is_never_unpinned() {
        let h = harness();
        let unrelated = h.content.put_raw(br#"{"title":"someone else's job"}"#);
        let mut forged = edited();
        forged.last_cid = Some(unrelated.to_string());

        h.sync.publish(&owner(), forged.clone(), None).await.unwrap();
        assert!(h.content.contains(&unrelated));

        let current = h.registry.profile_cid(&owner()).await.unwrap().unwrap();
        h.sync.publish(&owner(), forged, None).await.unwrap();
        assert!(h.content.contains(&unrelated));
        assert!(!h.content.contains(&current));
        assert_eq!(h.trace.count("content.unpin"), 1);
    }

    #[tokio::test]
    async fn local_profile_belongs_to_its_publisher() {
        let h = harness();
        h.sync.publish(&owner(), edited(), None).await.unwrap();
        let upper = WalletAddress(owner().as_str().to_ascii_uppercase().replacen("0X", "0x", 1));
        assert!(h.sync.load_local_for(&upper).await.unwrap().is_some());

        let bob = WalletAddress("0x976ea74026e726554db657fa54763abd0c3a0aa9".to_owned());
        assert_eq!(h.sync.load_local_for(&bob).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_address_is_not_registered() {
        let h = harness();
        let err = h.sync.resolve(&owner()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotRegistered(address) if address == owner()));
    }

    #[tokio::test]
    async fn unreadable_snapshots_are_resolution_failures() {
        let h = harness();
        let html = h.content.put_raw(b"<!DOCTYPE html><html>gateway error</html>");
        h.registry.update_profile_cid(&owner(), &html).await.unwrap();
        assert!(matches!(
            h.sync.resolve(&owner()).await,
            Err(SyncError::ResolutionFailed { .. })
        ));

        let garbage = h.content.put_raw(b"{ not json");
        assert!(matches!(
            h.sync.resolve_cid(&garbage).await,
            Err(SyncError::ResolutionFailed { .. })
        ));

        let missing = Cid("bafymissing".to_owned());
        assert!(matches!(
            h.sync.resolve_cid(&missing).await,
            Err(SyncError::ResolutionFailed { .. })
        ));
    }
}
