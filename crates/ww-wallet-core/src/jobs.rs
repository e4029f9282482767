use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use ww_api_types::{
    Budget, ClientBlock, Cid, JobDraft, JobListing, JobPosting, ProfileRecord, WalletAddress,
};
use ww_chain_client::{ContentStore, JobsRegistry, TxHash};

use crate::config::{Timeouts, bounded};
use crate::profile::{FileAttachment, fetch_json, upload_verified};
use crate::units::now_rfc3339;
use crate::SyncError;

const DEFAULT_CURRENCY: &str = "USDC";
const UNKNOWN_CLIENT: &str = "Unknown Client";
const IDENTICON_URL: &str = "https://api.dicebear.com/7.x/identicon/svg?seed=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedJob {
    pub cid: Cid,
    pub tx_hash: TxHash,
    pub posting: JobPosting,
}

pub fn validate_draft(draft: &JobDraft) -> Result<(), SyncError> {
    if draft.title.trim().is_empty() {
        return Err(SyncError::InvalidInput("job title is required".to_owned()));
    }
    if draft.budget_min > draft.budget_max {
        return Err(SyncError::InvalidInput(format!(
            "minimum budget {} exceeds maximum {}",
            draft.budget_min, draft.budget_max
        )));
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Fills the display fields older or hand-written postings may lack.
pub fn normalise_posting(mut posting: JobPosting) -> JobPosting {
    let poster_profile = posting.poster_profile.clone().unwrap_or_default();
    let client = posting.client.take().unwrap_or_default();

    let id = non_empty(&client.id).unwrap_or(&poster_profile).to_owned();
    let name = non_empty(&client.name)
        .or_else(|| non_empty(&posting.draft.company_name))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_owned();
    let avatar = match non_empty(&client.avatar) {
        Some(avatar) => avatar.to_owned(),
        None => {
            let seed = non_empty(&poster_profile).unwrap_or("web3work");
            format!("{IDENTICON_URL}{seed}")
        }
    };

    posting.client = Some(ClientBlock { id, name, avatar });
    if posting.budget.is_none() {
        posting.budget = Some(Budget::default());
    }
    posting
}

/// Job publication into, and discovery from, the shared active-jobs set.
pub struct JobBoard {
    content: Arc<dyn ContentStore>,
    registry: Arc<dyn JobsRegistry>,
    timeouts: Timeouts,
}

impl JobBoard {
    pub fn new(
        content: Arc<dyn ContentStore>,
        registry: Arc<dyn JobsRegistry>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            content,
            registry,
            timeouts,
        }
    }

    /// Uploads the posting and then appends its CID to the active set.
    pub async fn publish(
        &self,
        poster: &WalletAddress,
        poster_profile: Option<&ProfileRecord>,
        mut draft: JobDraft,
        logo: Option<FileAttachment>,
    ) -> Result<PublishedJob, SyncError> {
        validate_draft(&draft)?;
        let skills = std::mem::take(&mut draft.skills);
        for skill in &skills {
            draft.add_skill(skill);
        }

        let avatar = match logo {
            Some(logo) => upload_verified(self.content.as_ref(), &self.timeouts, logo).await?,
            None => poster_profile
                .map(|profile| profile.profile_pic.clone())
                .unwrap_or_default(),
        };
        let profile_cid = poster_profile.and_then(|profile| profile.last_cid.clone());

        let posting = JobPosting {
            client: Some(ClientBlock {
                id: profile_cid.clone().unwrap_or_default(),
                name: draft.company_name.clone(),
                avatar,
            }),
            budget: Some(Budget {
                min: draft.budget_min,
                max: draft.budget_max,
                currency: DEFAULT_CURRENCY.to_owned(),
            }),
            poster: poster.to_string(),
            poster_profile: profile_cid,
            posted_at: now_rfc3339(),
            draft,
        };

        let document = serde_json::to_value(&posting).map_err(anyhow::Error::from)?;
        let cid = bounded(
            "content storage",
            self.timeouts.storage,
            self.content.upload_json(&document),
        )
        .await?
        .map_err(|err| SyncError::Upload(format!("{err:#}")))?;

        let receipt = bounded(
            "jobs registry",
            self.timeouts.confirmation,
            self.registry.post_job(poster, &cid),
        )
        .await??;
        info!("job {} registered by {}", cid, poster.short());

        Ok(PublishedJob {
            cid,
            tx_hash: receipt.tx_hash,
            posting,
        })
    }

    /// Resolves every active job concurrently and returns those that loaded,
    /// in registry order. A broken entry is logged and skipped.
    pub async fn discover(&self) -> Result<Vec<JobListing>, SyncError> {
        let active = bounded(
            "jobs registry",
            self.timeouts.chain_read,
            self.registry.active_jobs(),
        )
        .await??;

        let mut pending = JoinSet::new();
        for (index, raw) in active.into_iter().enumerate() {
            let Some(cid) = Cid::parse(raw.as_str()) else {
                warn!("skipping malformed job entry {:?}", raw.as_str());
                continue;
            };
            let content = self.content.clone();
            let timeouts = self.timeouts;
            pending.spawn(async move {
                let result = fetch_json::<JobPosting>(content.as_ref(), &timeouts, &cid).await;
                (index, cid, result)
            });
        }

        let mut resolved = Vec::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((index, cid, Ok(posting))) => resolved.push((
                    index,
                    JobListing {
                        id: cid,
                        posting: normalise_posting(posting),
                    },
                )),
                Ok((_, cid, Err(err))) => warn!("skipping job {}: {}", cid, err),
                Err(err) => warn!("job resolution task failed: {}", err),
            }
        }
        resolved.sort_by_key(|(index, _)| *index);
        Ok(resolved.into_iter().map(|(_, listing)| listing).collect())
    }
}
