use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use ww_api_types::Cid;
use ww_chain_client::ContentStore;

pub const DEFAULT_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY: &str = "gateway.pinata.cloud";

/// Turns a bare CID, an `ipfs://` URI or another gateway's URL into a URL on
/// `gateway`.
pub fn convert_ipfs_url(gateway: &str, input: &str) -> String {
    let trimmed = input.trim();
    let cid = match trimmed.split_once("/ipfs/") {
        Some((_, cid)) => cid,
        None => trimmed.strip_prefix("ipfs://").unwrap_or(trimmed),
    };
    format!("{}/ipfs/{}", gateway_base(gateway), cid)
}

fn gateway_base(gateway: &str) -> String {
    let gateway = gateway.trim().trim_end_matches('/');
    if gateway.starts_with("http://") || gateway.starts_with("https://") {
        gateway.to_owned()
    } else {
        format!("https://{gateway}")
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata pinning API plus a dedicated gateway.
///
/// Reads `PINATA_JWT`, `PINATA_GATEWAY` and `PINATA_API_URL` from the
/// environment when explicit values are not given.
pub struct PinataClient {
    api_url: String,
    gateway: String,
    jwt: Option<String>,
    http: reqwest::Client,
}

impl Default for PinataClient {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl PinataClient {
    pub fn new(jwt: Option<String>, gateway: Option<String>) -> Self {
        let jwt = jwt
            .or_else(|| std::env::var("PINATA_JWT").ok())
            .filter(|jwt| !jwt.trim().is_empty());
        let gateway = gateway
            .or_else(|| std::env::var("PINATA_GATEWAY").ok())
            .unwrap_or_else(|| DEFAULT_GATEWAY.to_owned());
        let api_url = std::env::var("PINATA_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned());
        Self {
            api_url: api_url.trim_end_matches('/').to_owned(),
            gateway: gateway_base(&gateway),
            jwt,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn jwt(&self) -> Result<&str> {
        self.jwt
            .as_deref()
            .ok_or_else(|| anyhow!("PINATA_JWT is not configured"))
    }

    async fn pin(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Cid> {
        let response = request
            .bearer_auth(self.jwt()?)
            .send()
            .await
            .with_context(|| format!("pinata {what} transport"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("pinata {what} HTTP {status}: {text}");
        }

        let body: PinResponse = response
            .json()
            .await
            .with_context(|| format!("pinata {what} parse"))?;
        let cid = Cid::parse(&body.ipfs_hash)
            .ok_or_else(|| anyhow!("pinata {what} returned an empty CID"))?;
        info!("pinned {} ({})", cid, what);
        Ok(cid)
    }
}

#[async_trait]
impl ContentStore for PinataClient {
    async fn upload_json(&self, value: &Value) -> Result<Cid> {
        let url = format!("{}/pinning/pinJSONToIPFS", self.api_url);
        let body = json!({ "pinataContent": value });
        self.pin(self.http.post(url).json(&body), "pinJSONToIPFS").await
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<Cid> {
        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_owned()));
        self.pin(self.http.post(url).multipart(form), "pinFileToIPFS").await
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        let url = self.gateway_url(cid);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("gateway fetch {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("gateway HTTP {status} for {cid}");
        }
        let bytes = response.bytes().await.context("gateway fetch body")?;
        Ok(bytes.to_vec())
    }

    async fn verify_resolvable(&self, url: &str) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("gateway verify {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("gateway HTTP {status} for {url}");
        }
        debug!("verified {}", url);
        Ok(())
    }

    async fn unpin(&self, cid: &Cid) -> Result<()> {
        let url = format!("{}/pinning/unpin/{}", self.api_url, cid);
        let response = self
            .http
            .delete(url)
            .bearer_auth(self.jwt()?)
            .send()
            .await
            .context("pinata unpin transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("pinata unpin HTTP {status}: {text}");
        }
        info!("unpinned {}", cid);
        Ok(())
    }

    fn gateway_url(&self, cid: &Cid) -> String {
        convert_ipfs_url(&self.gateway, cid.as_str())
    }
}
