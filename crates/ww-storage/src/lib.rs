use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{DB, Options};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use ww_api_types::{ProfileRecord, UserRole, WalletAddress};

pub const WALLET_ACCOUNT_KEY: &str = "walletAccount";
pub const USER_ROLE_KEY: &str = "userRole";
pub const PROFILE_DATA_KEY: &str = "profileData";

/// Durable string key-value storage for client state that survives restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct NoopStore;

#[async_trait]
impl KeyValueStore for NoopStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.remove(key);
        Ok(())
    }
}

pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    pub fn open_default(path: &str) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn key_for(key: &str) -> String {
        format!("local:{key}")
    }
}

#[async_trait]
impl KeyValueStore for RocksDbStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.db.get(Self::key_for(key).as_bytes())?;
        match value {
            Some(raw) => Ok(Some(String::from_utf8(raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.put(Self::key_for(key).as_bytes(), value.as_bytes())?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db.delete(Self::key_for(key).as_bytes())?;
        Ok(())
    }
}

/// Typed view over the persisted session keys.
///
/// Only the account, the declared role and the last profile snapshot are
/// persisted. The chain id is live wallet state and is never written here.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::default()))
    }

    pub async fn load_account(&self) -> Result<Option<WalletAddress>> {
        let value = self.backend.get(WALLET_ACCOUNT_KEY).await?;
        Ok(value
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .map(WalletAddress))
    }

    pub async fn save_account(&self, account: &WalletAddress) -> Result<()> {
        self.backend.set(WALLET_ACCOUNT_KEY, account.as_str()).await
    }

    pub async fn clear_account(&self) -> Result<()> {
        self.backend.remove(WALLET_ACCOUNT_KEY).await
    }

    pub async fn load_role(&self) -> Result<Option<UserRole>> {
        let Some(raw) = self.backend.get(USER_ROLE_KEY).await? else {
            return Ok(None);
        };
        match raw.parse::<UserRole>() {
            Ok(role) => Ok(Some(role)),
            Err(err) => {
                warn!("ignoring persisted role: {}", err);
                Ok(None)
            }
        }
    }

    pub async fn save_role(&self, role: Option<UserRole>) -> Result<()> {
        match role {
            Some(role) => self.backend.set(USER_ROLE_KEY, role.as_str()).await,
            None => self.backend.remove(USER_ROLE_KEY).await,
        }
    }

    pub async fn load_profile(&self) -> Result<Option<ProfileRecord>> {
        let Some(raw) = self.backend.get(PROFILE_DATA_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<ProfileRecord>(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(err) => {
                warn!("ignoring unreadable persisted profile: {}", err);
                Ok(None)
            }
        }
    }

    pub async fn save_profile(&self, profile: &ProfileRecord) -> Result<()> {
        let raw = serde_json::to_string(profile)?;
        self.backend.set(PROFILE_DATA_KEY, &raw).await
    }
}
