use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use ww_api_types::{Cid, ProfileRecord, PublishProfileRequest, PublishProfileResponse, WalletAddress};
use ww_crypto::is_valid_address;

use crate::{ApiResult, AppState, bad_request, decode_upload, sync_error};

/// The connected account's profile. 404 `PROFILE_NOT_FOUND` sends the UI to
/// registration.
pub(crate) async fn my_profile(State(state): State<Arc<AppState>>) -> ApiResult<ProfileRecord> {
    let profile = state.core.my_profile().await.map_err(sync_error)?;
    Ok(Json(profile))
}

pub(crate) async fn by_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<ProfileRecord> {
    if !is_valid_address(&address) {
        return Err(bad_request("address must be a 0x-prefixed 20-byte hex string"));
    }
    let profile = state
        .core
        .profiles()
        .resolve(&WalletAddress(address))
        .await
        .map_err(sync_error)?;
    Ok(Json(profile))
}

pub(crate) async fn by_cid(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
) -> ApiResult<ProfileRecord> {
    let cid = Cid::parse(&cid).ok_or_else(|| bad_request("malformed CID"))?;
    let profile = state.core.profile_by_cid(&cid).await.map_err(sync_error)?;
    Ok(Json(profile))
}

pub(crate) async fn publish(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishProfileRequest>,
) -> ApiResult<PublishProfileResponse> {
    let avatar = decode_upload(request.avatar)?;
    let published = state
        .core
        .publish_profile(request.profile, avatar)
        .await
        .map_err(sync_error)?;
    Ok(Json(PublishProfileResponse {
        cid: published.cid.to_string(),
        profile: published.profile,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::json;

    #[tokio::test]
    async fn unregistered_profiles_route_to_registration() {
        let app = app();
        let (status, _) = call(&app, "GET", "/profile", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        call(&app, "POST", "/session/connect", None).await;
        let (status, body) = call(&app, "GET", "/profile", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PROFILE_NOT_FOUND");
    }

    #[tokio::test]
    async fn publish_with_avatar_then_resolve() {
        let app = app();
        call(&app, "POST", "/session/connect", None).await;
        let request = json!({
            "profile": { "name": "Grace", "bio": "Compilers", "skills": ["Rust"] },
            "avatar": { "file_name": "me.png", "content_base64": STANDARD.encode(b"png bytes") },
        });
        let (status, body) = call(&app, "POST", "/profile/publish", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        let cid = body["cid"].as_str().unwrap().to_owned();
        assert_eq!(body["profile"]["lastCID"], cid.as_str());
        assert_eq!(body["profile"]["wallet"], ACCOUNT);
        assert!(body["profile"]["profilePic"].as_str().unwrap().contains("/ipfs/"));

        let (status, mine) = call(&app, "GET", "/profile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["name"], "Grace");

        let (_, public) = call(&app, "GET", &format!("/profile/{ACCOUNT}"), None).await;
        assert_eq!(public["bio"], "Compilers");

        let (_, by_cid) = call(&app, "GET", &format!("/profile/cid/{cid}"), None).await;
        assert_eq!(by_cid["skills"], json!(["Rust"]));
    }

    #[tokio::test]
    async fn rejects_malformed_lookups() {
        let app = app();
        let (status, _) = call(&app, "GET", "/profile/0x1234", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        call(&app, "POST", "/session/connect", None).await;
        let request = json!({
            "profile": { "name": "Grace" },
            "avatar": { "file_name": "me.png", "content_base64": "not base64!" },
        });
        let (status, _) = call(&app, "POST", "/profile/publish", Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
