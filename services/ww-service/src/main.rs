mod backend;
mod chain_config;
mod config;
mod jobs;
mod payments;
mod profile;
mod session;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post, put},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use ww_ai_assist::{GroqClient, TextGenerator};
use ww_api_types::FileUpload;
use ww_wallet_core::{CoreConfig, FileAttachment, NoticeBuffer, SyncError, WalletCore};

use crate::config::ServiceConfig;

const SERVICE_NAME: &str = "ww-service";

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
    code: &'static str,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

pub(crate) struct AppState {
    pub(crate) core: Arc<WalletCore>,
    pub(crate) notices: Arc<NoticeBuffer>,
    pub(crate) generator: Arc<dyn TextGenerator>,
    pub(crate) config: ServiceConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;
    let backends = backend::build_backends(&config)?;
    let store = backend::build_store(&config)?;
    let notices = Arc::new(NoticeBuffer::default());
    let core = WalletCore::new(
        backends,
        store,
        notices.clone(),
        CoreConfig {
            expected_chain: config.network.clone(),
            timeouts: config.timeouts,
            ..CoreConfig::default()
        },
    );
    match core.start().await {
        Ok(session) => info!(
            "session restored: {}",
            session.state(config.network.chain_id).as_str()
        ),
        Err(err) => warn!("could not restore the session: {}", err),
    }

    let groq = GroqClient::default();
    if !groq.is_configured() {
        warn!("GROQ_API_KEY is not set; /jobs/generate will fail");
    }

    let addr = config.bind_addr;
    let state = Arc::new(AppState {
        core: core.clone(),
        notices,
        generator: Arc::new(groq),
        config,
    });

    let app = build_router(state);
    info!("{} listening on {}", SERVICE_NAME, addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {}", err);
            }
        })
        .await?;

    core.shutdown();
    info!("{} stopped", SERVICE_NAME);
    Ok(())
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/chain/config", get(chain_config::chain_config))
        .route("/session", get(session::get_session))
        .route("/session/connect", post(session::connect))
        .route("/session/disconnect", post(session::disconnect))
        .route("/session/reconcile", post(session::reconcile))
        .route("/session/role", put(session::set_role))
        .route("/notices", get(session::notices))
        .route("/profile", get(profile::my_profile))
        .route("/profile/publish", post(profile::publish))
        .route("/profile/cid/{cid}", get(profile::by_cid))
        .route("/profile/{address}", get(profile::by_address))
        .route("/jobs", get(jobs::list).post(jobs::post))
        .route("/jobs/generate", post(jobs::generate))
        .route("/payments", post(payments::pay))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_NAME,
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn error_response(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code,
        }),
    )
}

pub(crate) fn bad_request(message: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
}

pub(crate) fn upstream_error(err: impl std::fmt::Display) -> ApiError {
    error_response(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
}

pub(crate) fn sync_error(err: SyncError) -> ApiError {
    let status = match &err {
        SyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SyncError::NotConnected => StatusCode::UNAUTHORIZED,
        SyncError::NotRegistered(_) => StatusCode::NOT_FOUND,
        SyncError::UserCancelled => StatusCode::CONFLICT,
        SyncError::WalletMissing => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::Unresponsive { .. } => StatusCode::GATEWAY_TIMEOUT,
        SyncError::ResolutionFailed { .. }
        | SyncError::VerificationFailed { .. }
        | SyncError::Upload(_)
        | SyncError::Registry(_)
        | SyncError::Wallet(_) => StatusCode::BAD_GATEWAY,
        SyncError::Storage(_) | SyncError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("request failed: {}", err);
    }
    error_response(status, err.code(), err.to_string())
}

pub(crate) fn decode_upload(upload: Option<FileUpload>) -> Result<Option<FileAttachment>, ApiError> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    if upload.file_name.trim().is_empty() {
        return Err(bad_request("file_name is required"));
    }
    let bytes = STANDARD
        .decode(upload.content_base64.as_bytes())
        .map_err(|_| bad_request("content_base64 must be valid base64"))?;
    if bytes.is_empty() {
        return Err(bad_request("uploaded file is empty"));
    }
    Ok(Some(FileAttachment {
        file_name: upload.file_name,
        bytes,
    }))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;
    use ww_api_types::{ChainId, WalletAddress};
    use ww_chain_client::memory::MemoryWallet;
    use ww_storage::SessionStore;
    use ww_wallet_core::Backends;

    pub(crate) const ACCOUNT: &str = "0x15d34aaf54267db7d7c367839aaf71a00a2c6a65";

    pub(crate) struct CannedGenerator(pub(crate) String);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    pub(crate) fn app_on(chain: ChainId) -> (Router, Arc<MemoryWallet>) {
        let wallet = Arc::new(MemoryWallet::new(WalletAddress(ACCOUNT.to_owned()), chain));
        let config = ServiceConfig::from_lookup(|_| None).unwrap_or_else(|err| panic!("{err}"));
        let notices = Arc::new(NoticeBuffer::default());
        let core = WalletCore::new(
            Backends::in_memory(Some(wallet.clone())),
            SessionStore::in_memory(),
            notices.clone(),
            CoreConfig {
                receipt_poll_interval: Duration::from_millis(1),
                ..CoreConfig::default()
            },
        );
        let state = Arc::new(AppState {
            core,
            notices,
            generator: Arc::new(CannedGenerator(
                "**Title:** Solidity Auditor\n**Skills:** Solidity, Foundry\n**Budget:** $1,000-$3,000".to_owned(),
            )),
            config,
        });
        (build_router(state), wallet)
    }

    pub(crate) fn app() -> Router {
        app_on(ChainId(5003)).0
    }

    pub(crate) async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
