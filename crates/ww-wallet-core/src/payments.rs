use tracing::info;
use ww_api_types::WalletAddress;
use ww_chain_client::{TransactionRequest, TxReceipt, wait_for_receipt};
use ww_crypto::is_valid_address;

use crate::config::bounded;
use crate::session::SessionState;
use crate::units::{format_units, parse_units};
use crate::wallet::WalletSession;
use crate::SyncError;

/// Sends `amount` of the native currency from the connected account to `to`
/// and waits for the transaction to be mined.
pub async fn send_payment(
    session: &WalletSession,
    to: &str,
    amount: &str,
) -> Result<TxReceipt, SyncError> {
    let from = session.require_account()?;
    let wallet = session.wallet()?.clone();
    let chain = session.expected_chain();

    let to = to.trim();
    if !is_valid_address(to) {
        return Err(SyncError::InvalidInput(format!("invalid recipient address: {to}")));
    }
    let decimals = chain.native_currency.decimals;
    let value = parse_units(amount, decimals)?;
    if value == 0 {
        return Err(SyncError::InvalidInput("amount must be greater than zero".to_owned()));
    }
    if session.state() != SessionState::ExpectedChain {
        return Err(SyncError::InvalidInput(format!(
            "switch the wallet to {} before sending",
            chain.chain_name
        )));
    }

    let timeouts = session.config().timeouts;
    let tx_hash = bounded(
        "wallet",
        timeouts.wallet,
        wallet.send_transaction(
            &from,
            TransactionRequest {
                to: WalletAddress(to.to_owned()),
                value,
                data: Vec::new(),
            },
        ),
    )
    .await??;
    info!(
        "sent {} {} to {} in {}",
        format_units(value, decimals, 4),
        chain.native_currency.symbol,
        to,
        tx_hash.0
    );

    let receipt = bounded(
        "transaction confirmation",
        timeouts.confirmation,
        wait_for_receipt(wallet.as_ref(), &tx_hash, session.config().receipt_poll_interval),
    )
    .await??;
    Ok(receipt)
}
