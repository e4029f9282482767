use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;
use ww_api_types::{ChainDescriptor, ChainId, WalletAddress};

/// EIP-1193 code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-3326 code for a chain the wallet has not been told about.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("chain {0} has not been added to the wallet")]
    UnrecognizedChain(String),
    #[error("wallet error {code}: {message}")]
    Provider { code: i64, message: String },
    #[error("wallet transport error: {0}")]
    Transport(String),
}

impl WalletError {
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        match code {
            USER_REJECTED_CODE => WalletError::UserRejected,
            UNRECOGNIZED_CHAIN_CODE => WalletError::UnrecognizedChain(message.into()),
            _ => WalletError::Provider {
                code,
                message: message.into(),
            },
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            WalletError::UserRejected => Some(USER_REJECTED_CODE),
            WalletError::UnrecognizedChain(_) => Some(UNRECOGNIZED_CHAIN_CODE),
            WalletError::Provider { code, .. } => Some(*code),
            WalletError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: WalletAddress,
    pub value: u128,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
}

/// The user's wallet as an EIP-1193 style request/event capability.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<WalletAddress>, WalletError>;
    /// Chain id exactly as the wallet reports it (hex string).
    async fn chain_id(&self) -> Result<String, WalletError>;
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError>;
    async fn add_chain(&self, descriptor: &ChainDescriptor) -> Result<(), WalletError>;
    async fn send_transaction(
        &self,
        from: &WalletAddress,
        tx: TransactionRequest,
    ) -> Result<TxHash, WalletError>;
    async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, WalletError>;
    /// Each message is the new chain id as reported by the wallet.
    fn subscribe_chain_changed(&self) -> broadcast::Receiver<String>;
}

/// Polls until the transaction is mined. Callers bound the wait with a timeout.
pub async fn wait_for_receipt(
    wallet: &dyn WalletProvider,
    tx_hash: &TxHash,
    poll_interval: Duration,
) -> Result<TxReceipt, WalletError> {
    loop {
        if let Some(receipt) = wallet.transaction_receipt(tx_hash).await? {
            return Ok(receipt);
        }
        debug!("transaction {} not mined yet", tx_hash.0);
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_distinguished_codes() {
        assert_eq!(WalletError::from_code(4001, "nope"), WalletError::UserRejected);
        assert_eq!(
            WalletError::from_code(4902, "0x138b"),
            WalletError::UnrecognizedChain("0x138b".to_owned())
        );
        assert_eq!(WalletError::from_code(-32603, "internal").code(), Some(-32603));
        assert_eq!(WalletError::Transport("down".to_owned()).code(), None);
    }
}
