use std::future::Future;
use std::time::Duration;
use ww_api_types::ChainDescriptor;

use crate::SyncError;

/// Upper bounds for each kind of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Anything that may show a wallet prompt.
    pub wallet: Duration,
    pub chain_read: Duration,
    pub storage: Duration,
    pub confirmation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wallet: Duration::from_secs(120),
            chain_read: Duration::from_secs(30),
            storage: Duration::from_secs(60),
            confirmation: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub expected_chain: ChainDescriptor,
    pub timeouts: Timeouts,
    pub receipt_poll_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            expected_chain: ChainDescriptor::mantle_sepolia(),
            timeouts: Timeouts::default(),
            receipt_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Runs `fut` with a deadline; expiry becomes [`SyncError::Unresponsive`].
pub(crate) async fn bounded<F: Future>(
    service: &'static str,
    limit: Duration,
    fut: F,
) -> Result<F::Output, SyncError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SyncError::Unresponsive {
            service,
            timeout: limit,
        })
}
