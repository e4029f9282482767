use std::time::Duration;
use thiserror::Error;
use ww_api_types::WalletAddress;
use ww_chain_client::{RegistryError, WalletError};

/// Every failure a flow in this crate reports to its caller.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no wallet extension detected")]
    WalletMissing,
    #[error("wallet is not connected")]
    NotConnected,
    #[error("request cancelled in the wallet")]
    UserCancelled,
    #[error("no profile registered for {0}")]
    NotRegistered(WalletAddress),
    #[error("could not resolve {cid}: {reason}")]
    ResolutionFailed { cid: String, reason: String },
    #[error("uploaded asset is not resolvable at {url}: {reason}")]
    VerificationFailed { url: String, reason: String },
    #[error("{service} did not respond within {}s", .timeout.as_secs())]
    Unresponsive {
        service: &'static str,
        timeout: Duration,
    },
    #[error("upload failed: {0}")]
    Upload(String),
    #[error(transparent)]
    Registry(RegistryError),
    #[error(transparent)]
    Wallet(WalletError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("local storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::WalletMissing => "WALLET_MISSING",
            SyncError::NotConnected => "NOT_CONNECTED",
            SyncError::UserCancelled => "USER_CANCELLED",
            SyncError::NotRegistered(_) => "PROFILE_NOT_FOUND",
            SyncError::ResolutionFailed { .. } => "RESOLUTION_FAILED",
            SyncError::VerificationFailed { .. } => "VERIFICATION_FAILED",
            SyncError::Unresponsive { .. } => "UNRESPONSIVE",
            SyncError::Upload(_) => "UPLOAD_FAILED",
            SyncError::Registry(_) => "REGISTRY_ERROR",
            SyncError::Wallet(_) => "WALLET_ERROR",
            SyncError::InvalidInput(_) => "INVALID_INPUT",
            SyncError::Storage(_) => "STORAGE_ERROR",
            SyncError::Other(_) => "INTERNAL",
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        SyncError::Storage(format!("{err:#}"))
    }
}

impl From<WalletError> for SyncError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::UserRejected => SyncError::UserCancelled,
            other => SyncError::Wallet(other),
        }
    }
}

impl From<RegistryError> for SyncError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Wallet(wallet) => wallet.into(),
            other => SyncError::Registry(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rejection_is_a_cancellation_everywhere() {
        assert!(matches!(
            SyncError::from(WalletError::UserRejected),
            SyncError::UserCancelled
        ));
        assert!(matches!(
            SyncError::from(RegistryError::Wallet(WalletError::UserRejected)),
            SyncError::UserCancelled
        ));
        assert!(matches!(
            SyncError::from(RegistryError::Reverted("nope".to_owned())),
            SyncError::Registry(_)
        ));
    }

    #[test]
    fn unresponsive_message_names_the_service() {
        let err = SyncError::Unresponsive {
            service: "wallet",
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "wallet did not respond within 120s");
        assert_eq!(err.code(), "UNRESPONSIVE");
    }
}
