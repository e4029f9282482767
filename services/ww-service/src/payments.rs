use axum::{Json, extract::State};
use std::sync::Arc;
use ww_api_types::{PaymentRequest, PaymentResponse};

use crate::{ApiResult, AppState, sync_error};

pub(crate) async fn pay(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult<PaymentResponse> {
    let receipt = state
        .core
        .send_payment(&request.to, &request.amount)
        .await
        .map_err(sync_error)?;
    Ok(Json(PaymentResponse {
        tx_hash: receipt.tx_hash.0,
        block_number: receipt.block_number,
        confirmed: receipt.success,
    }))
}
