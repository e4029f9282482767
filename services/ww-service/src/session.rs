use axum::{Json, extract::State};
use std::sync::Arc;
use ww_api_types::{NoticesResponse, ReconcileResponse, SessionResponse, SetRoleRequest};

use crate::{ApiResult, AppState, sync_error};

fn session_response(state: &AppState) -> SessionResponse {
    let session = state.core.session();
    let snapshot = session.snapshot();
    let expected = session.expected_chain().chain_id;
    SessionResponse {
        state: snapshot.state(expected).as_str().to_owned(),
        account: snapshot.account.map(|account| account.to_string()),
        chain_id: snapshot.chain_id.map(|chain| chain.0),
        chain_id_hex: snapshot.chain_id.map(|chain| chain.to_hex()),
        role: snapshot.role,
        expected_chain_id: expected.0,
    }
}

pub(crate) async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(session_response(&state))
}

pub(crate) async fn connect(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    state.core.session().connect().await.map_err(sync_error)?;
    Ok(Json(session_response(&state)))
}

pub(crate) async fn disconnect(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    state.core.session().disconnect().await.map_err(sync_error)?;
    Ok(Json(session_response(&state)))
}

/// Interactive reconciliation, e.g. from a "switch network" button.
pub(crate) async fn reconcile(State(state): State<Arc<AppState>>) -> ApiResult<ReconcileResponse> {
    let outcome = state
        .core
        .session()
        .reconcile_current(false)
        .await
        .map_err(sync_error)?;
    Ok(Json(ReconcileResponse {
        outcome: outcome.as_str().to_owned(),
        chain_id: state.core.session().snapshot().chain_id.map(|chain| chain.0),
    }))
}

pub(crate) async fn set_role(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetRoleRequest>,
) -> ApiResult<SessionResponse> {
    state
        .core
        .session()
        .set_role(request.role)
        .await
        .map_err(sync_error)?;
    Ok(Json(session_response(&state)))
}

pub(crate) async fn notices(State(state): State<Arc<AppState>>) -> Json<NoticesResponse> {
    Json(NoticesResponse {
        notices: state.notices.drain(),
    })
}
