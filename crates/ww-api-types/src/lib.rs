use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

mod job;
mod profile;

pub use job::{Budget, ClientBlock, JobDraft, JobListing, JobLocation, JobPosting};
pub use profile::{PortfolioItem, ProfileRecord, Reputation, ReputationEntry, Review, SocialLinks};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Addresses are compared case-insensitively; wallets mix checksum and lower-case forms.
    pub fn same_as(&self, other: &WalletAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// `0x1234...abcd` form used in status lines.
    pub fn short(&self) -> String {
        let value = self.0.as_str();
        if value.len() <= 10 || !value.is_ascii() {
            return value.to_owned();
        }
        format!("{}...{}", &value[..6], &value[value.len() - 4..])
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid chain id: {0:?}")]
pub struct ChainIdError(pub String);

/// Numeric EIP-155 chain id.
///
/// Wallets report chain ids as `0x`-prefixed hex strings while configuration and
/// RPC metadata use decimals. Everything inside the workspace compares `ChainId`
/// values; conversion happens at the wallet boundary through [`ChainId::parse`]
/// and [`ChainId::to_hex`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn parse(raw: &str) -> Result<Self, ChainIdError> {
        let trimmed = raw.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed.map(ChainId).map_err(|_| ChainIdError(raw.to_owned()))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content identifier of an object in content-addressed storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cid(pub String);

impl Cid {
    /// Accepts a bare CID or an `ipfs://` URI. Empty values and HTML error
    /// pages echoed back by a misconfigured gateway are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix("ipfs://").unwrap_or(trimmed);
        if bare.is_empty() || bare.starts_with('<') || bare.contains(char::is_whitespace) {
            return None;
        }
        Some(Self(bare.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Freelancer,
    Client,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Freelancer => "freelancer",
            UserRole::Client => "client",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "freelancer" => Ok(UserRole::Freelancer),
            "client" => Ok(UserRole::Client),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to add a network it does not know yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainDescriptor {
    pub slug: String,
    pub chain_id: ChainId,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    pub block_explorer_urls: Vec<String>,
}

/// Parameters of `wallet_addEthereumChain` (EIP-3085).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    pub fn mantle_sepolia() -> Self {
        Self {
            slug: "mantle-sepolia".to_owned(),
            chain_id: ChainId(5003),
            chain_name: "Mantle Sepolia".to_owned(),
            rpc_urls: vec!["https://rpc.sepolia.mantle.xyz".to_owned()],
            native_currency: NativeCurrency {
                name: "Mantle".to_owned(),
                symbol: "MNT".to_owned(),
                decimals: 18,
            },
            block_explorer_urls: vec!["https://explorer.sepolia.mantle.xyz".to_owned()],
        }
    }

    pub fn mantle() -> Self {
        Self {
            slug: "mantle".to_owned(),
            chain_id: ChainId(5000),
            chain_name: "Mantle".to_owned(),
            rpc_urls: vec!["https://rpc.mantle.xyz".to_owned()],
            native_currency: NativeCurrency {
                name: "Mantle".to_owned(),
                symbol: "MNT".to_owned(),
                decimals: 18,
            },
            block_explorer_urls: vec!["https://explorer.mantle.xyz".to_owned()],
        }
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_urls.first().map(String::as_str)
    }

    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: self.chain_id.to_hex(),
            chain_name: self.chain_name.clone(),
            rpc_urls: self.rpc_urls.clone(),
            native_currency: self.native_currency.clone(),
            block_explorer_urls: self.block_explorer_urls.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-facing advisory message (rendered as a toast by the UI).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub at_epoch_ms: u128,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            at_epoch_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis())
                .unwrap_or_default(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

// ── HTTP request / response bodies ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub state: String,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub chain_id_hex: Option<String>,
    pub role: Option<UserRole>,
    pub expected_chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub outcome: String,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRoleRequest {
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticesResponse {
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpload {
    pub file_name: String,
    pub content_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishProfileRequest {
    pub profile: ProfileRecord,
    pub avatar: Option<FileUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishProfileResponse {
    pub cid: String,
    pub profile: ProfileRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostJobRequest {
    pub draft: JobDraft,
    pub logo: Option<FileUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostJobResponse {
    pub cid: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateJobRequest {
    pub prompt: Option<String>,
    #[serde(default)]
    pub draft: JobDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateJobResponse {
    pub draft: JobDraft,
    pub markdown: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub to: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub tx_hash: String,
    pub block_number: u64,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfigResponse {
    pub chain_slug: String,
    pub chain_id: u64,
    pub chain_id_hex: String,
    pub chain_name: String,
    pub rpc_url: Option<String>,
    pub block_explorer_url: Option<String>,
    pub currency_symbol: String,
    pub currency_decimals: u8,
    pub profiles_contract: Option<String>,
    pub jobs_contract: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_accepts_hex_and_decimal() {
        assert_eq!(ChainId::parse("0x138b"), Ok(ChainId(5003)));
        assert_eq!(ChainId::parse("0X138B"), Ok(ChainId(5003)));
        assert_eq!(ChainId::parse("5003"), Ok(ChainId(5003)));
        assert_eq!(ChainId(5003).to_hex(), "0x138b");
        assert!(ChainId::parse("0x").is_err());
        assert!(ChainId::parse("mantle").is_err());
    }

    #[test]
    fn cid_parse_strips_scheme_and_rejects_html() {
        assert_eq!(
            Cid::parse("ipfs://bafyabc").map(|cid| cid.0),
            Some("bafyabc".to_owned())
        );
        assert!(Cid::parse("   ").is_none());
        assert!(Cid::parse("<!DOCTYPE html>").is_none());
    }

    #[test]
    fn add_chain_params_use_hex_chain_id() {
        let params = ChainDescriptor::mantle_sepolia().add_chain_params();
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["chainId"], "0x138b");
        assert_eq!(json["nativeCurrency"]["symbol"], "MNT");
        assert_eq!(json["rpcUrls"][0], "https://rpc.sepolia.mantle.xyz");
    }

    #[test]
    fn address_short_form_and_comparison() {
        let address = WalletAddress("0x08fd1234567890abcdef1234567890abcdef6a19".to_owned());
        assert_eq!(address.short(), "0x08fd...6a19");
        assert!(address.same_as(&WalletAddress(
            "0x08FD1234567890ABCDEF1234567890ABCDEF6A19".to_owned()
        )));
    }

    #[test]
    fn role_round_trips_through_its_string_form() {
        assert_eq!("client".parse::<UserRole>(), Ok(UserRole::Client));
        assert_eq!(UserRole::Freelancer.as_str(), "freelancer");
        assert!("admin".parse::<UserRole>().is_err());
    }
}
