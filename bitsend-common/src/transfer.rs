//! Transfer operations
//!
//! Entry points that wire the pipeline together:
//!
//! - [`send_transaction`]: validate → derive identity → fetch UTXOs → select →
//!   two-pass fee → change policy → assemble → broadcast
//! - [`get_wallet_balance`]: derived balance of the identity's address
//! - [`get_address_history`]: paged history with net amounts
//! - [`create_wallet`]: fresh P2WPKH identity
//!
//! Every step produces a new value; nothing is mutated across passes. Nothing is
//! submitted unless a fully signed, balanced transaction exists.
//!
//! # Security Considerations
//!
//! - WIF secrets are only handled through [`SensitiveString`] and never logged
//! - A `DataSourceFailure` raised during broadcast is ambiguous: the transaction
//!   may have been accepted. Callers must check the txid before resubmitting.

use crate::assembler::TransactionAssembler;
use crate::change::plan_outputs;
use crate::config::FeeConfig;
use crate::error::{TransferError, TransferResult};
use crate::fee_estimation::FeeEstimator;
use crate::funding_source::FundingSource;
use crate::history::{AddressHistory, HistoryAggregator};
use crate::logging::{EventLogger, LogContext};
use crate::math::is_dust_amount;
use crate::signing::Identity;
use crate::types::{NewWallet, SensitiveString, TransferOutcome, TransferRequest, WalletBalance};
use crate::utxo_selection::GreedySelector;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, Txid};
use serde_json::json;
use std::str::FromStr;

/// Details of a broadcast transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub txid: Txid,
    pub sender_address: String,
    pub recipient_address: String,
    pub sent_amount: u64,
    pub fee_sats: u64,
    pub change_sats: u64,
    pub virtual_size: usize,
    pub input_count: usize,
}

impl From<&TransferReceipt> for TransferOutcome {
    fn from(receipt: &TransferReceipt) -> Self {
        TransferOutcome::succeeded(
            receipt.txid.to_string(),
            receipt.sender_address.clone(),
            receipt.recipient_address.clone(),
            receipt.sent_amount,
            receipt.fee_sats,
        )
    }
}

/// Send `request.amount_sats` to the recipient, within the default fee limits
pub fn send_transaction(
    request: &TransferRequest,
    source: &dyn FundingSource,
    logger: &dyn EventLogger,
) -> TransferOutcome {
    send_transaction_with_limits(request, &FeeConfig::default(), source, logger)
}

/// Send a transfer, rejecting fee rates above `fees.max_fee_rate`
pub fn send_transaction_with_limits(
    request: &TransferRequest,
    fees: &FeeConfig,
    source: &dyn FundingSource,
    logger: &dyn EventLogger,
) -> TransferOutcome {
    match try_send_transaction(request, fees, source, logger) {
        Ok(receipt) => TransferOutcome::from(&receipt),
        Err(err) => {
            logger.error(
                LogContext::Transaction,
                "transfer failed",
                Some(json!({
                    "category": err.category().as_str(),
                    "ambiguous": err.is_ambiguous_broadcast(),
                })),
            );
            TransferOutcome::failed(&err)
        }
    }
}

/// Run the transfer pipeline, returning the typed error on failure
pub fn try_send_transaction(
    request: &TransferRequest,
    fees: &FeeConfig,
    source: &dyn FundingSource,
    logger: &dyn EventLogger,
) -> TransferResult<TransferReceipt> {
    let recipient = validate_request(request, fees, logger)?;
    let identity = Identity::from_wif(&request.wif, request.network)?;
    let sender = identity.address().to_string();
    let amount = request.amount_sats;

    let utxos = source.fetch_spendable(&sender)?;
    logger.info(
        LogContext::Network,
        "fetched spendable outputs",
        Some(json!({ "sender": sender, "count": utxos.len() })),
    );

    let selection = GreedySelector::new(request.fee_rate).select(&utxos, amount, logger)?;

    let signer = identity.signer();
    let assembler =
        TransactionAssembler::new(&signer, recipient.script_pubkey(), identity.script_pubkey());

    let exact = FeeEstimator::new(request.fee_rate, logger).estimate(&selection, amount, &assembler)?;
    let plan = plan_outputs(selection.total_input_value, amount, exact.fee_sats)?;
    if !plan.emit_change {
        logger.info(
            LogContext::Core,
            "change below dust threshold burned into fee",
            Some(json!({ "burned": plan.burned_change(exact.fee_sats) })),
        );
    }

    let finalized = assembler.assemble(&selection, &plan)?;
    let required_fee = request.fee_rate.fee_for_vsize(finalized.virtual_size);
    if finalized.fee_sats < required_fee {
        return Err(TransferError::signing(format!(
            "Fee {} is below {} required for {} vbytes",
            finalized.fee_sats, required_fee, finalized.virtual_size
        )));
    }
    logger.info(
        LogContext::Transaction,
        "transaction finalized",
        Some(json!({
            "txid": finalized.txid.to_string(),
            "vsize": finalized.virtual_size,
            "fee": finalized.fee_sats,
            "inputs": selection.input_count(),
            "outputs": plan.output_count(),
        })),
    );

    let txid = source.broadcast(&finalized.raw_hex).map_err(|err| {
        if err.is_ambiguous_broadcast() {
            logger.warn(
                LogContext::Transaction,
                "broadcast outcome unknown; transaction may have been accepted",
                Some(json!({ "txid": finalized.txid.to_string() })),
            );
        }
        err
    })?;
    if txid != finalized.txid {
        logger.warn(
            LogContext::Transaction,
            "data source acknowledged a different txid",
            Some(json!({ "txid": txid.to_string() })),
        );
    }

    logger.info(
        LogContext::Transaction,
        "transaction broadcast",
        Some(json!({ "txid": txid.to_string() })),
    );

    Ok(TransferReceipt {
        txid,
        sender_address: sender,
        recipient_address: recipient.to_string(),
        sent_amount: plan.recipient_value,
        fee_sats: plan.fee_sats,
        change_sats: plan.change_value,
        virtual_size: finalized.virtual_size,
        input_count: selection.input_count(),
    })
}

fn validate_request(
    request: &TransferRequest,
    fees: &FeeConfig,
    logger: &dyn EventLogger,
) -> TransferResult<Address> {
    if request.amount_sats == 0 {
        return Err(TransferError::invalid_input("Amount must be greater than zero"));
    }

    let max_rate = fees.max_rate()?;
    if request.fee_rate > max_rate {
        return Err(TransferError::invalid_input(format!(
            "Fee rate {} exceeds maximum {}",
            request.fee_rate, max_rate
        )));
    }

    let recipient = parse_address(&request.recipient, request.network)?;

    if is_dust_amount(request.amount_sats) {
        logger.warn(
            LogContext::Core,
            "recipient amount is at or below the dust threshold",
            Some(json!({ "amount": request.amount_sats })),
        );
    }

    Ok(recipient)
}

/// Parse `address` and require that it belongs to `network`
pub fn parse_address(address: &str, network: Network) -> TransferResult<Address> {
    let unchecked = Address::<NetworkUnchecked>::from_str(address.trim())?;
    Ok(unchecked.require_network(network)?)
}

/// Balance of the identity behind `wif`, derived from its spendable outputs
pub fn get_wallet_balance(
    wif: &SensitiveString,
    network: Network,
    source: &dyn FundingSource,
    logger: &dyn EventLogger,
) -> TransferResult<WalletBalance> {
    let identity = Identity::from_wif(wif, network)?;
    let address = identity.address().to_string();
    let utxos = source.fetch_spendable(&address)?;
    let balance = WalletBalance::from_utxos(address, utxos);

    logger.info(
        LogContext::Network,
        "computed balance",
        Some(json!({
            "address": balance.address,
            "balance": balance.balance_sats,
            "utxos": balance.total_utxos,
        })),
    );
    Ok(balance)
}

/// Mempool and confirmed history of `address`
pub fn get_address_history(
    address: &str,
    network: Network,
    aggregator: &HistoryAggregator,
    source: &dyn FundingSource,
    logger: &dyn EventLogger,
) -> TransferResult<AddressHistory> {
    let address = parse_address(address, network)?;
    aggregator.fetch(&address.to_string(), source, logger)
}

/// Generate a new random P2WPKH wallet
pub fn create_wallet(network: Network, logger: &dyn EventLogger) -> TransferResult<NewWallet> {
    let wallet = Identity::generate(network)?.to_new_wallet();
    logger.info(
        LogContext::Security,
        "created wallet",
        Some(json!({ "address": wallet.address, "network": network.to_string() })),
    );
    Ok(wallet)
}
