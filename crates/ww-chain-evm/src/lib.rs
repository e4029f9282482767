//! JSON-RPC backed implementations of the registry and wallet capabilities
//! for EVM chains (Mantle Sepolia by default).

pub mod abi;
mod local_wallet;
mod registry;
mod rpc;

pub use local_wallet::LocalKeyWallet;
pub use registry::{EvmJobsRegistry, EvmProfileRegistry};
pub use rpc::{JsonRpcClient, RpcError, parse_quantity, to_quantity};

pub const MANTLE_SEPOLIA: &str = "mantle-sepolia";

/// Builds a client for `rpc_url`, or for the `WW_RPC_URL` environment
/// variable, or for the network's first advertised endpoint.
pub fn rpc_client(
    rpc_url: Option<String>,
    network: &ww_api_types::ChainDescriptor,
) -> anyhow::Result<JsonRpcClient> {
    let endpoint = rpc_url
        .or_else(|| std::env::var("WW_RPC_URL").ok())
        .or_else(|| network.rpc_url().map(str::to_owned))
        .ok_or_else(|| anyhow::anyhow!("no RPC endpoint configured for {}", network.slug))?;
    Ok(JsonRpcClient::new(endpoint.trim_end_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_api_types::ChainDescriptor;

    #[test]
    fn explicit_endpoint_wins() {
        let client = rpc_client(
            Some("http://localhost:8545/".to_owned()),
            &ChainDescriptor::mantle_sepolia(),
        )
        .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8545");
        assert_eq!(ChainDescriptor::mantle_sepolia().slug, MANTLE_SEPOLIA);
    }
}
