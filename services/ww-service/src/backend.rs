use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::info;
use ww_api_types::WalletAddress;
use ww_chain_client::WalletProvider;
use ww_chain_client::memory::MemoryWallet;
use ww_chain_evm::{EvmJobsRegistry, EvmProfileRegistry, LocalKeyWallet, rpc_client};
use ww_crypto::{Secp256k1Signer, Signer, is_valid_address};
use ww_pinata::PinataClient;
use ww_storage::{RocksDbStore, SessionStore};
use ww_wallet_core::Backends;

use crate::config::{BackendKind, ServiceConfig};

pub(crate) fn build_backends(config: &ServiceConfig) -> Result<Backends> {
    match config.backend {
        BackendKind::Memory => Ok(memory_backends(config)),
        BackendKind::Evm => evm_backends(config),
    }
}

fn memory_backends(config: &ServiceConfig) -> Backends {
    let signer = config
        .private_key
        .as_deref()
        .and_then(|key| Secp256k1Signer::from_hex(key).ok())
        .unwrap_or_else(Secp256k1Signer::new_random);
    let account = WalletAddress(signer.address());
    info!("offline backends, demo account {}", account);
    let wallet: Arc<dyn WalletProvider> = Arc::new(MemoryWallet::new(account, config.network.chain_id));
    Backends::in_memory(Some(wallet))
}

fn contract_address(name: &str, value: &Option<String>) -> Result<WalletAddress> {
    let value = value.as_deref().ok_or_else(|| anyhow!("{name} is not set"))?;
    if !is_valid_address(value) {
        return Err(anyhow!("{name} is not a valid address: {value}"));
    }
    Ok(WalletAddress(value.to_owned()))
}

fn evm_backends(config: &ServiceConfig) -> Result<Backends> {
    let key = config
        .private_key
        .as_deref()
        .ok_or_else(|| anyhow!("WW_PRIVATE_KEY is not set"))?;
    let signer = Secp256k1Signer::from_hex(key).context("WW_PRIVATE_KEY")?;
    let rpc = Arc::new(rpc_client(config.rpc_url.clone(), &config.network)?);
    info!("{} via {}", config.network.chain_name, rpc.endpoint());

    let local = LocalKeyWallet::new(signer, config.network.chain_id, rpc.clone());
    info!("signing as {}", local.address());
    let wallet: Arc<dyn WalletProvider> = Arc::new(local);

    let profiles = EvmProfileRegistry::new(
        rpc.clone(),
        contract_address("WW_PROFILES_CONTRACT", &config.profiles_contract)?,
        wallet.clone(),
    )?;
    let jobs = EvmJobsRegistry::new(
        rpc,
        contract_address("WW_JOBS_CONTRACT", &config.jobs_contract)?,
        wallet.clone(),
    )?;

    Ok(Backends {
        wallet: Some(wallet),
        content: Arc::new(PinataClient::new(None, None)),
        profiles: Arc::new(profiles),
        jobs: Arc::new(jobs),
    })
}

pub(crate) fn build_store(config: &ServiceConfig) -> Result<SessionStore> {
    match config.store_path.as_deref() {
        Some(path) => {
            let store = RocksDbStore::open_default(path)
                .with_context(|| format!("opening session store at {path}"))?;
            info!("session store at {}", path);
            Ok(SessionStore::new(Arc::new(store)))
        }
        None => Ok(SessionStore::in_memory()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_api_types::UserRole;

    fn offline() -> ServiceConfig {
        ServiceConfig::from_lookup(|_| None).unwrap()
    }

    #[tokio::test]
    async fn offline_wallet_reports_the_expected_chain() {
        let backends = build_backends(&offline()).unwrap();
        let wallet = backends.wallet.unwrap();
        let chain = wallet.chain_id().await.unwrap();
        assert_eq!(chain, "0x138b");
        assert_eq!(wallet.request_accounts().await.unwrap().len(), 1);
    }

    #[test]
    fn evm_backends_reject_bad_contract_addresses() {
        let mut config = offline();
        config.backend = BackendKind::Evm;
        config.private_key =
            Some("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_owned());
        config.profiles_contract = Some("not-an-address".to_owned());
        config.jobs_contract = Some("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".to_owned());
        config.rpc_url = Some("http://127.0.0.1:8545".to_owned());
        let err = build_backends(&config).err().unwrap();
        assert!(err.to_string().contains("WW_PROFILES_CONTRACT"));
    }

    #[tokio::test]
    async fn store_path_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline();
        config.store_path = Some(dir.path().join("session").to_string_lossy().into_owned());

        let store = build_store(&config).unwrap();
        store.save_role(Some(UserRole::Client)).await.unwrap();
        drop(store);

        let reopened = build_store(&config).unwrap();
        assert_eq!(reopened.load_role().await.unwrap(), Some(UserRole::Client));
    }
}
