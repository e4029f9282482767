use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use ww_api_types::{Cid, WalletAddress};
use ww_chain_client::{
    JobsRegistry, PROFILE_NOT_REGISTERED_REASON, ProfileRegistry, RegistryError, TransactionRequest,
    TxReceipt, WalletProvider, wait_for_receipt,
};
use ww_crypto::parse_address;

use crate::abi::{
    decode_revert_reason, decode_string, decode_string_array, encode_address_call, encode_call,
    encode_string_call,
};
use crate::rpc::{JsonRpcClient, RpcError};

const GET_PROFILE_CID: &str = "getProfileCID(address)";
const UPDATE_PROFILE_CID: &str = "updateProfileCID(string)";
const GET_ACTIVE_JOBS: &str = "getActiveJobs()";
const POST_JOB: &str = "postJob(string)";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

fn into_registry_error(err: RpcError) -> RegistryError {
    if let Some(reason) = err.revert_data().as_deref().and_then(decode_revert_reason) {
        return RegistryError::Reverted(reason);
    }
    match err {
        RpcError::Rpc { message, .. } if message.contains("execution reverted") => {
            let reason = message
                .split_once(':')
                .map(|(_, reason)| reason.trim().to_owned())
                .unwrap_or_default();
            RegistryError::Reverted(reason)
        }
        RpcError::Rpc { code, message, .. } => RegistryError::Rpc { code, message },
        RpcError::Transport(message) => RegistryError::Transport(message),
        RpcError::Decode(message) => RegistryError::Decode(message),
    }
}

/// Read-only `eth_call` and wallet-signed writes against one contract.
struct ContractClient {
    rpc: Arc<JsonRpcClient>,
    address: WalletAddress,
    wallet: Arc<dyn WalletProvider>,
    poll_interval: Duration,
}

impl ContractClient {
    fn new(
        rpc: Arc<JsonRpcClient>,
        address: WalletAddress,
        wallet: Arc<dyn WalletProvider>,
    ) -> anyhow::Result<Self> {
        parse_address(address.as_str())?;
        Ok(Self {
            rpc,
            address,
            wallet,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, RegistryError> {
        let params = json!([
            { "to": self.address.as_str(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let raw: String = self
            .rpc
            .call("eth_call", params)
            .await
            .map_err(into_registry_error)?;
        hex::decode(raw.trim_start_matches("0x"))
            .map_err(|err| RegistryError::Decode(format!("eth_call result: {err}")))
    }

    async fn transact(&self, from: &WalletAddress, data: Vec<u8>) -> Result<TxReceipt, RegistryError> {
        let tx_hash = self
            .wallet
            .send_transaction(
                from,
                TransactionRequest {
                    to: self.address.clone(),
                    value: 0,
                    data,
                },
            )
            .await?;
        debug!("submitted {} to {}", tx_hash.0, self.address);

        let receipt = wait_for_receipt(self.wallet.as_ref(), &tx_hash, self.poll_interval).await?;
        if !receipt.success {
            return Err(RegistryError::TransactionFailed(receipt.tx_hash.0));
        }
        Ok(receipt)
    }
}

pub struct EvmProfileRegistry {
    contract: ContractClient,
}

impl EvmProfileRegistry {
    pub fn new(
        rpc: Arc<JsonRpcClient>,
        address: WalletAddress,
        wallet: Arc<dyn WalletProvider>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            contract: ContractClient::new(rpc, address, wallet)?,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.contract.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl ProfileRegistry for EvmProfileRegistry {
    async fn profile_cid(&self, owner: &WalletAddress) -> Result<Option<Cid>, RegistryError> {
        let owner_bytes = parse_address(owner.as_str())
            .map_err(|err| RegistryError::Decode(err.to_string()))?;
        let result = self
            .contract
            .call(encode_address_call(GET_PROFILE_CID, &owner_bytes))
            .await;

        let data = match result {
            Ok(data) => data,
            Err(RegistryError::Reverted(reason)) if reason.contains(PROFILE_NOT_REGISTERED_REASON) => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let raw = decode_string(&data).map_err(|err| RegistryError::Decode(err.to_string()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(Cid(raw)))
    }

    async fn update_profile_cid(
        &self,
        owner: &WalletAddress,
        cid: &Cid,
    ) -> Result<TxReceipt, RegistryError> {
        let receipt = self
            .contract
            .transact(owner, encode_string_call(UPDATE_PROFILE_CID, cid.as_str()))
            .await?;
        info!(
            "profile pointer for {} set to {} in block {}",
            owner.short(),
            cid,
            receipt.block_number
        );
        Ok(receipt)
    }
}

pub struct EvmJobsRegistry {
    contract: ContractClient,
}

impl EvmJobsRegistry {
    pub fn new(
        rpc: Arc<JsonRpcClient>,
        address: WalletAddress,
        wallet: Arc<dyn WalletProvider>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            contract: ContractClient::new(rpc, address, wallet)?,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.contract.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl JobsRegistry for EvmJobsRegistry {
    async fn active_jobs(&self) -> Result<Vec<Cid>, RegistryError> {
        let data = self.contract.call(encode_call(GET_ACTIVE_JOBS)).await?;
        let entries =
            decode_string_array(&data).map_err(|err| RegistryError::Decode(err.to_string()))?;
        Ok(entries.into_iter().map(Cid).collect())
    }

    async fn post_job(&self, poster: &WalletAddress, cid: &Cid) -> Result<TxReceipt, RegistryError> {
        let receipt = self
            .contract
            .transact(poster, encode_string_call(POST_JOB, cid.as_str()))
            .await?;
        info!("job {} posted by {} in block {}", cid, poster.short(), receipt.block_number);
        Ok(receipt)
    }
}
