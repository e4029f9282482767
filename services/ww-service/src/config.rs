use anyhow::{Context, Result, anyhow, bail};
use std::net::SocketAddr;
use std::time::Duration;
use ww_api_types::ChainDescriptor;
use ww_chain_client::NetworkRegistry;
use ww_chain_evm::MANTLE_SEPOLIA;
use ww_wallet_core::Timeouts;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendKind {
    /// JSON-RPC registries, Pinata storage and a local-key wallet.
    Evm,
    /// Everything in process; nothing leaves the machine.
    Memory,
}

#[derive(Debug, Clone)]
pub(crate) struct ServiceConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) backend: BackendKind,
    pub(crate) network: ChainDescriptor,
    pub(crate) rpc_url: Option<String>,
    pub(crate) profiles_contract: Option<String>,
    pub(crate) jobs_contract: Option<String>,
    pub(crate) private_key: Option<String>,
    pub(crate) store_path: Option<String>,
    pub(crate) timeouts: Timeouts,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty());

        let bind_addr = get("WW_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
            .parse::<SocketAddr>()
            .context("WW_BIND_ADDR must be host:port")?;

        let private_key = get("WW_PRIVATE_KEY");
        let backend = match get("WW_BACKEND").as_deref() {
            Some("evm") => BackendKind::Evm,
            Some("memory") => BackendKind::Memory,
            Some(other) => bail!("unknown WW_BACKEND {other:?}; expected evm or memory"),
            None if private_key.is_some() => BackendKind::Evm,
            None => BackendKind::Memory,
        };

        let slug = get("WW_NETWORK").unwrap_or_else(|| MANTLE_SEPOLIA.to_owned());
        let network = NetworkRegistry::with_defaults()
            .by_slug(&slug)
            .ok_or_else(|| anyhow!("unknown network {slug:?}"))?;

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            wallet: seconds(&get, "WW_WALLET_TIMEOUT_SECS", defaults.wallet)?,
            chain_read: seconds(&get, "WW_CHAIN_TIMEOUT_SECS", defaults.chain_read)?,
            storage: seconds(&get, "WW_STORAGE_TIMEOUT_SECS", defaults.storage)?,
            confirmation: seconds(&get, "WW_CONFIRMATION_TIMEOUT_SECS", defaults.confirmation)?,
        };

        let config = Self {
            bind_addr,
            backend,
            network,
            rpc_url: get("WW_RPC_URL"),
            profiles_contract: get("WW_PROFILES_CONTRACT"),
            jobs_contract: get("WW_JOBS_CONTRACT"),
            private_key,
            store_path: get("WW_STORE_PATH"),
            timeouts,
        };
        if config.backend == BackendKind::Evm {
            config.require_evm()?;
        }
        Ok(config)
    }

    fn require_evm(&self) -> Result<()> {
        for (name, value) in [
            ("WW_PRIVATE_KEY", &self.private_key),
            ("WW_PROFILES_CONTRACT", &self.profiles_contract),
            ("WW_JOBS_CONTRACT", &self.jobs_contract),
        ] {
            if value.is_none() {
                bail!("{name} is required for the evm backend");
            }
        }
        Ok(())
    }
}

fn seconds(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match get(key) {
        Some(raw) => {
            let secs = raw
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds"))?;
            if secs == 0 {
                bail!("{key} must be greater than zero");
            }
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}
