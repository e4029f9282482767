use axum::{Json, extract::State};
use std::sync::Arc;
use ww_api_types::ChainConfigResponse;

use crate::AppState;

/// The network and contracts the service expects wallets to be on, so the UI
/// can describe the chain and link to the explorer.
pub(crate) async fn chain_config(State(state): State<Arc<AppState>>) -> Json<ChainConfigResponse> {
    let config = &state.config;
    let network = &config.network;
    Json(ChainConfigResponse {
        chain_slug: network.slug.clone(),
        chain_id: network.chain_id.0,
        chain_id_hex: network.chain_id.to_hex(),
        chain_name: network.chain_name.clone(),
        rpc_url: config
            .rpc_url
            .clone()
            .or_else(|| network.rpc_url().map(str::to_owned)),
        block_explorer_url: network.block_explorer_urls.first().cloned(),
        currency_symbol: network.native_currency.symbol.clone(),
        currency_decimals: network.native_currency.decimals,
        profiles_contract: config.profiles_contract.clone(),
        jobs_contract: config.jobs_contract.clone(),
    })
}
