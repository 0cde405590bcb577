//! End-to-end transfer scenarios against the in-memory funding source


use bitcoin::{Network, Sequence};
use bitsend_common::config::FeeConfig;
use bitsend_common::error::{ErrorCategory, TransferError};
use bitsend_common::funding_source::MockFundingSource;
use bitsend_common::logging::{LogLevel, MemoryLogger};
use bitsend_common::signing::Identity;
use bitsend_common::transfer::{
    create_wallet, get_wallet_balance, send_transaction, send_transaction_with_limits,
    try_send_transaction,
};
use bitsend_common::types::{FeeRate, TransferRequest, DUST_THRESHOLD};
use rust_decimal::Decimal;
use test_helpers::*;

fn sender_address() -> String {
    Identity::from_wif(&TEST_WIF.into(), Network::Testnet)
        .unwrap()
        .address()
        .to_string()
}

#[test]
fn test_spends_first_utxo_when_it_covers_amount_and_fee() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000, 50_000]));
    let logger = MemoryLogger::new();

    let receipt =
        try_send_transaction(&testnet_request(60_000, 10), &FeeConfig::default(), &source, &logger)
            .unwrap();

    assert_eq!(receipt.input_count, 1);
    assert_eq!(receipt.sent_amount, 60_000);
    assert_eq!(receipt.fee_sats, receipt.virtual_size as u64 * 10);
    assert_eq!(receipt.sent_amount + receipt.change_sats + receipt.fee_sats, 100_000);
    assert!(receipt.change_sats > DUST_THRESHOLD);

    let broadcasts = source.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    let tx = decode_tx(&broadcasts[0]);
    assert_eq!(tx.txid(), receipt.txid);
    assert_eq!(tx.vsize(), receipt.virtual_size);
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.input[0].previous_output, utxo(1, 0, 0).outpoint());
    assert_eq!(tx.output.len(), 2);
    assert_eq!(tx.output[0].value, 60_000);
    assert_eq!(tx.output[1].value, receipt.change_sats);
}

#[test]
fn test_accumulates_second_utxo_when_first_is_short() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000, 50_000]));

    let receipt = try_send_transaction(
        &testnet_request(99_000, 10),
        &FeeConfig::default(),
        &source,
        &MemoryLogger::new(),
    )
    .unwrap();

    assert_eq!(receipt.input_count, 2);
    let tx = decode_tx(&source.broadcasts()[0]);
    let output_total: u64 = tx.output.iter().map(|o| o.value).sum();
    assert_eq!(output_total + receipt.fee_sats, 150_000);

    let change = 150_000 - 99_000 - receipt.fee_sats;
    assert!(change == 0 || change > DUST_THRESHOLD);
}

#[test]
fn test_every_input_signals_replaceability() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[30_000, 30_000, 30_000]));

    let outcome = send_transaction(&testnet_request(70_000, 5), &source, &MemoryLogger::new());
    assert!(outcome.success);

    let tx = decode_tx(&source.broadcasts()[0]);
    assert_eq!(tx.input.len(), 3);
    for txin in &tx.input {
        assert_eq!(txin.sequence, Sequence::ENABLE_RBF_NO_LOCKTIME);
        assert!(txin.script_sig.is_empty());
        assert_eq!(txin.witness.len(), 2);
    }
}

#[test]
fn test_sub_dust_change_is_burned_into_fee() {
    init_test_logging();
    // At 1 sat/vB: provisional change 318 (no change in draft), exact change ~390
    let source = MockFundingSource::new(utxos(&[60_500]));
    let logger = MemoryLogger::new();

    let outcome = send_transaction(&testnet_request(60_000, 1), &source, &logger);
    assert!(outcome.success, "{:?}", outcome.failure_reason);
    assert_eq!(outcome.sent_amount, Some(60_000));
    assert_eq!(outcome.fee_sats, Some(500));

    let tx = decode_tx(&source.broadcasts()[0]);
    assert_eq!(tx.output.len(), 1);
    assert_eq!(tx.output[0].value, 60_000);
    assert!(logger.contains("burned into fee"));
}

#[test]
fn test_broadcast_fee_covers_requested_rate_when_change_appears() {
    init_test_logging();
    for sat_per_vb in [1u64, 10] {
        // Provisional change is 500 (dust), the measured fee leaves more
        let total = 60_000 + 182 * sat_per_vb + 500;
        let source = MockFundingSource::new(utxos(&[total]));

        let receipt = try_send_transaction(
            &testnet_request(60_000, sat_per_vb),
            &FeeConfig::default(),
            &source,
            &MemoryLogger::new(),
        )
        .unwrap();

        let tx = decode_tx(&source.broadcasts()[0]);
        let output_total: u64 = tx.output.iter().map(|o| o.value).sum();
        let paid = total - output_total;
        assert_eq!(paid, receipt.fee_sats);
        assert_eq!(tx.vsize(), receipt.virtual_size);
        assert!(
            paid >= tx.vsize() as u64 * sat_per_vb,
            "rate {}: fee {} for {} vbytes",
            sat_per_vb,
            paid,
            tx.vsize()
        );
        assert_eq!(tx.output[0].value, 60_000);
        assert_eq!(tx.output.len() == 2, receipt.change_sats > DUST_THRESHOLD);
    }
}

#[test]
fn test_amount_above_balance_never_broadcasts() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[1_000, 2_000]));

    let outcome = send_transaction(&testnet_request(10_000, 10), &source, &MemoryLogger::new());

    assert!(!outcome.success);
    assert_eq!(outcome.failure_category, Some(ErrorCategory::InsufficientFunds));
    assert!(outcome.transaction_id.is_none());
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_empty_utxo_set_fails_immediately() {
    init_test_logging();
    let source = MockFundingSource::new(vec![]);
    let logger = MemoryLogger::new();

    let err = try_send_transaction(&testnet_request(10_000, 10), &FeeConfig::default(), &source, &logger)
        .unwrap_err();

    assert_eq!(
        err,
        TransferError::InsufficientFunds {
            needed: 10_000,
            available: 0
        }
    );
    assert!(!logger.contains("provisional fee"));
    assert!(!logger.contains("measured fee"));
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_heuristic_fee_blocks_exact_balance_spend() {
    init_test_logging();
    // Selection needs amount + 1820 at 10 sat/vB for one input
    let source = MockFundingSource::new(utxos(&[61_819]));

    let outcome = send_transaction(&testnet_request(60_000, 10), &source, &MemoryLogger::new());

    assert_eq!(outcome.failure_category, Some(ErrorCategory::InsufficientFunds));
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_invalid_inputs_are_rejected_before_fetching() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000]));
    let logger = MemoryLogger::new();

    let zero = send_transaction(&testnet_request(0, 10), &source, &logger);
    assert_eq!(zero.failure_category, Some(ErrorCategory::InvalidInput));

    let wrong_network = TransferRequest::new(TEST_WIF, MAINNET_ADDRESS, 10_000, Network::Testnet);
    let outcome = send_transaction(&wrong_network, &source, &logger);
    assert_eq!(outcome.failure_category, Some(ErrorCategory::InvalidInput));

    let garbage = TransferRequest::new(TEST_WIF, "not-an-address", 10_000, Network::Testnet);
    let outcome = send_transaction(&garbage, &source, &logger);
    assert_eq!(outcome.failure_category, Some(ErrorCategory::InvalidInput));

    let bad_key = TransferRequest::new("5notawif", RECIPIENT, 10_000, Network::Testnet);
    let outcome = send_transaction(&bad_key, &source, &logger);
    assert_eq!(outcome.failure_category, Some(ErrorCategory::InvalidInput));

    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_fee_rate_above_configured_maximum_is_rejected() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[1_000_000]));
    let fees = FeeConfig {
        max_fee_rate: Decimal::from(50u64),
        ..FeeConfig::default()
    };

    let outcome =
        send_transaction_with_limits(&testnet_request(10_000, 51), &fees, &source, &MemoryLogger::new());

    assert_eq!(outcome.failure_category, Some(ErrorCategory::InvalidInput));
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_huge_fee_rate_is_insufficient_funds() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[1_000_000]));
    let fees = FeeConfig {
        max_fee_rate: Decimal::MAX,
        ..FeeConfig::default()
    };
    let request = TransferRequest::new(TEST_WIF, RECIPIENT, 10_000, Network::Testnet)
        .with_fee_rate(FeeRate::from_sat_per_vb(Decimal::MAX).unwrap());

    let outcome = send_transaction_with_limits(&request, &fees, &source, &MemoryLogger::new());

    assert_eq!(outcome.failure_category, Some(ErrorCategory::InsufficientFunds));
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_dust_recipient_amount_is_sent_with_warning() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000]));
    let logger = MemoryLogger::new();

    let outcome = send_transaction(&testnet_request(500, 2), &source, &logger);

    assert!(outcome.success);
    assert!(logger.contains("dust threshold"));
    assert!(logger.count_at(LogLevel::Warn) >= 1);
}

#[test]
fn test_broadcast_rejection_is_reported() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000])).with_broadcast_error(
        TransferError::BroadcastRejected("min relay fee not met".to_string()),
    );

    let outcome = send_transaction(&testnet_request(60_000, 10), &source, &MemoryLogger::new());

    assert!(!outcome.success);
    assert_eq!(outcome.failure_category, Some(ErrorCategory::BroadcastRejected));
    assert!(outcome.failure_reason.unwrap().contains("min relay fee"));
    assert_eq!(source.broadcast_count(), 1);
}

#[test]
fn test_ambiguous_broadcast_warns_caller() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000])).with_broadcast_error(
        TransferError::data_source("broadcast: connection reset by peer"),
    );
    let logger = MemoryLogger::new();

    let outcome = send_transaction(&testnet_request(60_000, 10), &source, &logger);

    assert_eq!(outcome.failure_category, Some(ErrorCategory::DataSourceFailure));
    assert!(outcome.failure_reason.unwrap().contains("before resubmitting"));
    assert!(logger.contains("may have been accepted"));
}

#[test]
fn test_fetch_failure_is_a_data_source_failure() {
    init_test_logging();
    let source = MockFundingSource::new(vec![])
        .with_fetch_error(TransferError::data_source("/address/x/utxo returned 503"));

    let outcome = send_transaction(&testnet_request(60_000, 10), &source, &MemoryLogger::new());

    assert_eq!(outcome.failure_category, Some(ErrorCategory::DataSourceFailure));
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_zero_value_utxo_is_a_data_source_failure() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000, 0]));

    let outcome = send_transaction(&testnet_request(10_000, 10), &source, &MemoryLogger::new());

    assert_eq!(outcome.failure_category, Some(ErrorCategory::DataSourceFailure));
    assert_eq!(source.broadcast_count(), 0);
}

#[test]
fn test_outcome_serializes_with_camel_case_fields() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000]));

    let outcome = send_transaction(&testnet_request(60_000, 10), &source, &MemoryLogger::new());
    let value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(value["success"], true);
    assert_eq!(value["senderAddress"], sender_address());
    assert_eq!(value["recipientAddress"], RECIPIENT);
    assert_eq!(value["sentAmount"], 60_000);
    assert!(value.get("failureReason").is_none());
}

#[test]
fn test_wif_never_reaches_the_log() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000]));
    let logger = MemoryLogger::new();

    send_transaction(&testnet_request(60_000, 10), &source, &logger);

    for record in logger.records() {
        assert!(!record.message.contains(TEST_WIF));
        if let Some(params) = record.params {
            assert!(!params.to_string().contains(TEST_WIF));
        }
    }
}

#[test]
fn test_balance_is_sum_of_spendable_outputs() {
    init_test_logging();
    let source = MockFundingSource::new(utxos(&[100_000, 50_000, 1]));

    let balance =
        get_wallet_balance(&TEST_WIF.into(), Network::Testnet, &source, &MemoryLogger::new()).unwrap();

    assert_eq!(balance.address, sender_address());
    assert_eq!(balance.balance_sats, 150_001);
    assert_eq!(balance.total_utxos, 3);
    assert_eq!(balance.balance_btc(), "0.00150001");
}

#[test]
fn test_created_wallet_can_fund_a_transfer() {
    init_test_logging();
    let logger = MemoryLogger::new();
    let wallet = create_wallet(Network::Testnet, &logger).unwrap();
    assert!(wallet.address.starts_with("tb1q"));
    assert!(!logger.contains(wallet.wif.expose_secret()));

    let source = MockFundingSource::new(utxos(&[20_000]));
    let request = TransferRequest::new(wallet.wif.clone(), RECIPIENT, 10_000, Network::Testnet);
    let outcome = send_transaction(&request, &source, &logger);

    assert!(outcome.success);
    assert_eq!(outcome.sender_address, Some(wallet.address));
}
