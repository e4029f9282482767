use anyhow::Result;
use async_trait::async_trait;
use ww_api_types::Cid;

/// Content-addressed storage with a public HTTP gateway.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upload_json(&self, value: &serde_json::Value) -> Result<Cid>;
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<Cid>;
    /// Fetches the object through the gateway. Transport failures and
    /// non-success statuses are errors; the body is returned unparsed.
    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>>;
    /// Confirms a gateway URL currently serves content.
    async fn verify_resolvable(&self, url: &str) -> Result<()>;
    /// Asks the provider to stop pinning an object.
    async fn unpin(&self, cid: &Cid) -> Result<()>;
    fn gateway_url(&self, cid: &Cid) -> String;
}
