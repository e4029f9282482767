use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::warn;
use ww_ai_assist::generate_job;
use ww_api_types::{
    GenerateJobRequest, GenerateJobResponse, JobsResponse, PostJobRequest, PostJobResponse,
};

use crate::{ApiResult, AppState, decode_upload, sync_error, upstream_error};

pub(crate) async fn list(State(state): State<Arc<AppState>>) -> ApiResult<JobsResponse> {
    let jobs = state.core.discover_jobs().await.map_err(sync_error)?;
    Ok(Json(JobsResponse { jobs }))
}

pub(crate) async fn post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostJobRequest>,
) -> ApiResult<PostJobResponse> {
    let logo = decode_upload(request.logo)?;
    let job = state
        .core
        .post_job(request.draft, logo)
        .await
        .map_err(sync_error)?;
    Ok(Json(PostJobResponse {
        cid: job.cid.to_string(),
        tx_hash: job.tx_hash.0,
    }))
}

/// Drafts listing copy with the text generator, seeded by the local profile's skills.
pub(crate) async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateJobRequest>,
) -> ApiResult<GenerateJobResponse> {
    let skills = match state.core.profiles().load_local().await {
        Ok(profile) => profile.map(|profile| profile.skills).unwrap_or_default(),
        Err(err) => {
            warn!("generating without profile skills: {}", err);
            Vec::new()
        }
    };
    let (draft, markdown) = generate_job(
        state.generator.as_ref(),
        &request.draft,
        &skills,
        request.prompt.as_deref(),
    )
    .await
    .map_err(upstream_error)?;
    Ok(Json(GenerateJobResponse { draft, markdown }))
}
