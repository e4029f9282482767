use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};
use ww_api_types::{ChainDescriptor, ChainId, WalletAddress};
use ww_chain_client::{TransactionRequest, TxHash, TxReceipt, WalletError, WalletProvider};
use ww_crypto::{LegacyTransaction, Secp256k1Signer, Signer, parse_address};

use crate::rpc::{JsonRpcClient, RpcError, parse_quantity, to_quantity};

/// EIP-1193 code for a request from an account the wallet does not control.
const UNAUTHORIZED_CODE: i64 = 4100;

fn wallet_error(err: RpcError) -> WalletError {
    match err {
        RpcError::Rpc { code, message, .. } => WalletError::from_code(code, message),
        RpcError::Transport(message) | RpcError::Decode(message) => WalletError::Transport(message),
    }
}

struct LocalState {
    active: ChainId,
    chains: HashMap<ChainId, Arc<JsonRpcClient>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

/// Server-side wallet that signs with a private key it holds.
///
/// Each known chain keeps its own JSON-RPC endpoint; switching only changes
/// which endpoint subsequent requests go to.
pub struct LocalKeyWallet {
    signer: Secp256k1Signer,
    address: WalletAddress,
    state: Mutex<LocalState>,
    events: broadcast::Sender<String>,
}

impl LocalKeyWallet {
    pub fn new(signer: Secp256k1Signer, chain: ChainId, rpc: Arc<JsonRpcClient>) -> Self {
        let address = WalletAddress(signer.address());
        let (events, _) = broadcast::channel(16);
        Self {
            signer,
            address,
            state: Mutex::new(LocalState {
                active: chain,
                chains: HashMap::from([(chain, rpc)]),
            }),
            events,
        }
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn active(&self) -> Result<(ChainId, Arc<JsonRpcClient>), WalletError> {
        let state = self.state();
        let rpc = state
            .chains
            .get(&state.active)
            .cloned()
            .ok_or_else(|| WalletError::UnrecognizedChain(state.active.to_hex()))?;
        Ok((state.active, rpc))
    }

    async fn quantity(rpc: &JsonRpcClient, method: &str, params: Value) -> Result<u128, WalletError> {
        let raw: String = rpc.call(method, params).await.map_err(wallet_error)?;
        parse_quantity(&raw).map_err(wallet_error)
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    async fn request_accounts(&self) -> Result<Vec<WalletAddress>, WalletError> {
        Ok(vec![self.address.clone()])
    }

    async fn chain_id(&self) -> Result<String, WalletError> {
        Ok(self.state().active.to_hex())
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError> {
        {
            let mut state = self.state();
            if !state.chains.contains_key(&chain_id) {
                return Err(WalletError::UnrecognizedChain(chain_id.to_hex()));
            }
            state.active = chain_id;
        }
        info!("local wallet switched to chain {}", chain_id);
        let _ = self.events.send(chain_id.to_hex());
        Ok(())
    }

    async fn add_chain(&self, descriptor: &ChainDescriptor) -> Result<(), WalletError> {
        let rpc_url = descriptor.rpc_url().ok_or_else(|| WalletError::Provider {
            code: -32602,
            message: format!("{} has no RPC endpoint", descriptor.chain_name),
        })?;
        self.state()
            .chains
            .entry(descriptor.chain_id)
            .or_insert_with(|| Arc::new(JsonRpcClient::new(rpc_url)));
        debug!("local wallet learned chain {} via {}", descriptor.chain_id, rpc_url);
        Ok(())
    }

    async fn send_transaction(
        &self,
        from: &WalletAddress,
        tx: TransactionRequest,
    ) -> Result<TxHash, WalletError> {
        if !from.same_as(&self.address) {
            return Err(WalletError::Provider {
                code: UNAUTHORIZED_CODE,
                message: format!("account {from} is not managed by this wallet"),
            });
        }
        let to = parse_address(tx.to.as_str()).map_err(|err| WalletError::Provider {
            code: -32602,
            message: err.to_string(),
        })?;
        let (chain, rpc) = self.active()?;

        let nonce = Self::quantity(
            &rpc,
            "eth_getTransactionCount",
            json!([self.address.as_str(), "pending"]),
        )
        .await?;
        let gas_price = Self::quantity(&rpc, "eth_gasPrice", json!([])).await?;
        let estimate = Self::quantity(
            &rpc,
            "eth_estimateGas",
            json!([{
                "from": self.address.as_str(),
                "to": tx.to.as_str(),
                "value": to_quantity(tx.value),
                "data": format!("0x{}", hex::encode(&tx.data)),
            }]),
        )
        .await?;

        let unsigned = LegacyTransaction {
            nonce: u64::try_from(nonce).map_err(|err| WalletError::Transport(err.to_string()))?,
            gas_price,
            gas_limit: u64::try_from(estimate + estimate / 5)
                .map_err(|err| WalletError::Transport(err.to_string()))?,
            to: Some(to),
            value: tx.value,
            data: tx.data,
            chain_id: chain.0,
        };
        let raw = unsigned
            .sign(&self.signer)
            .map_err(|err| WalletError::Provider {
                code: -32603,
                message: err.to_string(),
            })?;

        let tx_hash: String = rpc
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await
            .map_err(wallet_error)?;
        info!("sent transaction {} (nonce {}) on chain {}", tx_hash, nonce, chain);
        Ok(TxHash(tx_hash))
    }

    async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, WalletError> {
        let (_, rpc) = self.active()?;
        let receipt: Option<RawReceipt> = rpc
            .call("eth_getTransactionReceipt", json!([tx_hash.0]))
            .await
            .map_err(wallet_error)?;
        receipt.map(into_receipt).transpose()
    }

    fn subscribe_chain_changed(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }
}

fn into_receipt(raw: RawReceipt) -> Result<TxReceipt, WalletError> {
    let block_number = match raw.block_number.as_deref() {
        Some(block) => parse_quantity(block).map_err(wallet_error)?,
        None => 0,
    };
    Ok(TxReceipt {
        tx_hash: TxHash(raw.transaction_hash),
        block_number: u64::try_from(block_number).map_err(|err| WalletError::Transport(err.to_string()))?,
        success: raw.status.as_deref() == Some("0x1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> LocalKeyWallet {
        let signer = Secp256k1Signer::from_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        LocalKeyWallet::new(
            signer,
            ChainId(5003),
            Arc::new(JsonRpcClient::new("http://127.0.0.1:9")),
        )
    }

    #[tokio::test]
    async fn reports_its_own_account() {
        let wallet = wallet();
        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts[0].as_str(), "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F");
        assert_eq!(wallet.chain_id().await.unwrap(), "0x138b");
    }

    #[tokio::test]
    async fn unknown_chains_must_be_added_first() {
        let wallet = wallet();
        let mut events = wallet.subscribe_chain_changed();

        let err = wallet.switch_chain(ChainId(5000)).await.unwrap_err();
        assert_eq!(err, WalletError::UnrecognizedChain("0x1388".to_owned()));

        wallet.add_chain(&ChainDescriptor::mantle()).await.unwrap();
        wallet.switch_chain(ChainId(5000)).await.unwrap();
        assert_eq!(wallet.chain_id().await.unwrap(), "0x1388");
        assert_eq!(events.recv().await.unwrap(), "0x1388");
    }

    #[tokio::test]
    async fn refuses_foreign_senders() {
        let wallet = wallet();
        let err = wallet
            .send_transaction(
                &WalletAddress("0x1111111111111111111111111111111111111111".to_owned()),
                TransactionRequest {
                    to: WalletAddress("0x2222222222222222222222222222222222222222".to_owned()),
                    value: 1,
                    data: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(UNAUTHORIZED_CODE));
    }

    #[test]
    fn receipts_parse_status() {
        let receipt = into_receipt(RawReceipt {
            transaction_hash: "0xabc".to_owned(),
            block_number: Some("0x10".to_owned()),
            status: Some("0x0".to_owned()),
        })
        .unwrap();
        assert_eq!(receipt.block_number, 16);
        assert!(!receipt.success);
    }
}
