use serde::Serialize;
use ww_api_types::{ChainId, UserRole, WalletAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    WrongChain,
    ExpectedChain,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::WrongChain => "wrong_chain",
            SessionState::ExpectedChain => "expected_chain",
        }
    }
}

/// Snapshot of who is connected and where.
///
/// `account` and `role` mirror persisted values; `chain_id` is whatever the
/// wallet last reported and is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub account: Option<WalletAddress>,
    pub chain_id: Option<ChainId>,
    pub role: Option<UserRole>,
    pub(crate) connecting: bool,
}

impl Session {
    pub fn state(&self, expected: ChainId) -> SessionState {
        match (&self.account, self.chain_id) {
            (None, _) if self.connecting => SessionState::Connecting,
            (None, _) => SessionState::Disconnected,
            (Some(_), Some(chain)) if chain == expected => SessionState::ExpectedChain,
            (Some(_), _) => SessionState::WrongChain,
        }
    }
}
