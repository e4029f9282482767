//! Capabilities the marketplace client consumes but does not own: the user's
//! wallet, content-addressed storage, and the two on-chain registries.

mod content;
pub mod memory;
mod registry;
mod wallet;

pub use content::ContentStore;
pub use registry::{JobsRegistry, PROFILE_NOT_REGISTERED_REASON, ProfileRegistry, RegistryError};
pub use wallet::{
    TransactionRequest, TxHash, TxReceipt, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE, WalletError,
    WalletProvider, wait_for_receipt,
};

use std::collections::HashMap;
use ww_api_types::{ChainDescriptor, ChainId};

/// Networks the client knows how to describe to a wallet, keyed by slug.
#[derive(Default)]
pub struct NetworkRegistry {
    networks: HashMap<String, ChainDescriptor>,
}

impl NetworkRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(ChainDescriptor::mantle_sepolia());
        registry.register(ChainDescriptor::mantle());
        registry
    }

    pub fn register(&mut self, descriptor: ChainDescriptor) {
        self.networks.insert(descriptor.slug.clone(), descriptor);
    }

    pub fn by_slug(&self, slug: &str) -> Option<ChainDescriptor> {
        self.networks.get(slug).cloned()
    }

    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<ChainDescriptor> {
        self.networks
            .values()
            .find(|descriptor| descriptor.chain_id == chain_id)
            .cloned()
    }
}
