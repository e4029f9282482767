use async_trait::async_trait;
use thiserror::Error;
use ww_api_types::{Cid, WalletAddress};

use crate::{TxReceipt, WalletError};

/// Revert reason the profile registry uses for addresses without a pointer.
pub const PROFILE_NOT_REGISTERED_REASON: &str = "Profile not registered";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("contract reverted: {0}")]
    Reverted(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("unexpected contract response: {0}")]
    Decode(String),
    #[error("transaction {0} failed on chain")]
    TransactionFailed(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Single-owner pointer registry: one current profile CID per address.
#[async_trait]
pub trait ProfileRegistry: Send + Sync {
    /// `Ok(None)` when the address has never registered a profile.
    async fn profile_cid(&self, owner: &WalletAddress) -> Result<Option<Cid>, RegistryError>;
    /// Submits the new pointer signed by `owner` and waits for it to be mined.
    async fn update_profile_cid(
        &self,
        owner: &WalletAddress,
        cid: &Cid,
    ) -> Result<TxReceipt, RegistryError>;
}

/// Multi-writer append-only set of active job CIDs.
#[async_trait]
pub trait JobsRegistry: Send + Sync {
    async fn active_jobs(&self) -> Result<Vec<Cid>, RegistryError>;
    async fn post_job(&self, poster: &WalletAddress, cid: &Cid) -> Result<TxReceipt, RegistryError>;
}
