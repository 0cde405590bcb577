//! Transaction history aggregation
//!
//! Collects the unconfirmed and confirmed transactions of an address from a
//! [`FundingSource`] and computes what each one did to the address's balance.
//!
//! Confirmed history is paged: the first page has no cursor, each following page
//! is requested with the txid of the last entry of the previous one. Paging stops
//! at an empty page or at the configured page ceiling.
//!
//! Net amounts are for display only. A transaction whose value or address fields
//! are missing or malformed reports a net amount of zero instead of failing the
//! whole listing, so these numbers must never feed balance or spending logic.

use crate::config::HistoryConfig;
use crate::error::{TransferError, TransferResult};
use crate::funding_source::FundingSource;
use crate::logging::{EventLogger, LogContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Default maximum number of confirmed pages fetched per call
pub const DEFAULT_PAGE_CEILING: usize = 1000;

/// One transaction touching the address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub txid: String,
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
    pub fee_sats: Option<u64>,
    /// Received minus spent, in satoshis
    pub net_amount: i64,
}

impl HistoryEntry {
    /// Build an entry from an Esplora transaction object
    pub fn from_esplora(tx: &Value, address: &str) -> Self {
        let status = &tx["status"];
        Self {
            txid: tx["txid"].as_str().unwrap_or_default().to_string(),
            confirmed: status["confirmed"].as_bool().unwrap_or(false),
            block_height: status["block_height"].as_u64(),
            block_time: status["block_time"].as_u64(),
            fee_sats: tx["fee"].as_u64(),
            net_amount: compute_net_amount(tx, address),
        }
    }
}

/// Mempool and confirmed history of one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressHistory {
    pub address: String,
    pub mempool: Vec<HistoryEntry>,
    pub confirmed: Vec<HistoryEntry>,
    pub pages_fetched: usize,
    /// The page ceiling stopped paging before an empty page was seen
    pub truncated: bool,
}

impl AddressHistory {
    pub fn total_transactions(&self) -> usize {
        self.mempool.len() + self.confirmed.len()
    }

    /// All entries, unconfirmed first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.mempool.iter().chain(self.confirmed.iter())
    }
}

/// Net effect of `tx` on `address`: outputs paying it minus inputs spending from it
///
/// Returns 0 when any relevant value or address field is absent or malformed.
pub fn compute_net_amount(tx: &Value, address: &str) -> i64 {
    try_net_amount(tx, address).unwrap_or(0)
}

fn try_net_amount(tx: &Value, address: &str) -> Option<i64> {
    let mut received: i64 = 0;
    for output in tx.get("vout")?.as_array()? {
        if pays_address(output, address)? {
            received = received.checked_add(i64::try_from(output.get("value")?.as_u64()?).ok()?)?;
        }
    }

    let mut spent: i64 = 0;
    for input in tx.get("vin")?.as_array()? {
        // Coinbase inputs have no previous output
        if input.get("is_coinbase").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        let prevout = input.get("prevout")?;
        if pays_address(prevout, address)? {
            spent = spent.checked_add(i64::try_from(prevout.get("value")?.as_u64()?).ok()?)?;
        }
    }

    received.checked_sub(spent)
}

// Outputs without an address (e.g. OP_RETURN) never pay it
fn pays_address(output: &Value, address: &str) -> Option<bool> {
    match output.as_object()?.get("scriptpubkey_address") {
        None | Some(Value::Null) => Some(false),
        Some(Value::String(a)) => Some(a == address),
        Some(_) => None,
    }
}

/// Pages through the history of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryAggregator {
    page_ceiling: usize,
}

impl Default for HistoryAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_CEILING)
    }
}

impl HistoryAggregator {
    pub fn new(page_ceiling: usize) -> Self {
        Self { page_ceiling }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.page_ceiling)
    }

    pub fn page_ceiling(&self) -> usize {
        self.page_ceiling
    }

    /// Fetch mempool and confirmed history for `address`
    ///
    /// # Returns
    /// The aggregated history, or the first `DataSourceFailure` from the source.
    /// Unconfirmed entries that reappear in confirmed pages are dropped.
    pub fn fetch(
        &self,
        address: &str,
        source: &dyn FundingSource,
        logger: &dyn EventLogger,
    ) -> TransferResult<AddressHistory> {
        let mempool: Vec<HistoryEntry> = source
            .fetch_mempool_txs(address)?
            .iter()
            .map(|tx| HistoryEntry::from_esplora(tx, address))
            .collect();
        let mut seen: HashSet<String> = mempool.iter().map(|e| e.txid.clone()).collect();

        let mut confirmed = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0;
        let mut truncated = false;

        loop {
            if pages_fetched >= self.page_ceiling {
                truncated = true;
                logger.warn(
                    LogContext::Network,
                    "history page ceiling reached",
                    Some(json!({ "pages": pages_fetched, "cursor": cursor })),
                );
                break;
            }

            let page = source.fetch_chain_txs(address, cursor.as_deref())?;
            pages_fetched += 1;
            if page.is_empty() {
                break;
            }

            let last_txid = page
                .last()
                .and_then(|tx| tx["txid"].as_str())
                .ok_or_else(|| TransferError::data_source("History page entry has no txid"))?
                .to_string();

            for tx in &page {
                let entry = HistoryEntry::from_esplora(tx, address);
                if !entry.confirmed || !seen.insert(entry.txid.clone()) {
                    continue;
                }
                confirmed.push(entry);
            }

            if cursor.as_deref() == Some(last_txid.as_str()) {
                return Err(TransferError::data_source(
                    "History cursor did not advance between pages",
                ));
            }
            cursor = Some(last_txid);
        }

        logger.info(
            LogContext::Network,
            "fetched history",
            Some(json!({
                "address": address,
                "mempool": mempool.len(),
                "confirmed": confirmed.len(),
                "pages": pages_fetched,
            })),
        );

        Ok(AddressHistory {
            address: address.to_string(),
            mempool,
            confirmed,
            pages_fetched,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

    #[test]
    fn unrelated_transaction_nets_zero() {
        let tx = json!({
            "txid": "aa",
            "vin": [{"prevout": {"scriptpubkey_address": "tb1qother", "value": 5_000}}],
            "vout": [{"scriptpubkey_address": "tb1qsomeoneelse", "value": 4_000}]
        });
        assert_eq!(compute_net_amount(&tx, ADDR), 0);
    }

    #[test]
    fn spend_with_change_is_negative() {
        let tx = json!({
            "txid": "bb",
            "vin": [{"prevout": {"scriptpubkey_address": ADDR, "value": 100_000}}],
            "vout": [
                {"scriptpubkey_address": "tb1qrecipient", "value": 60_000},
                {"scriptpubkey_address": ADDR, "value": 38_590},
                {"scriptpubkey_type": "op_return", "value": 0}
            ]
        });
        assert_eq!(compute_net_amount(&tx, ADDR), -61_410);
    }

    #[test]
    fn malformed_value_nets_zero() {
        let tx = json!({
            "txid": "cc",
            "vin": [],
            "vout": [{"scriptpubkey_address": ADDR, "value": "lots"}]
        });
        assert_eq!(compute_net_amount(&tx, ADDR), 0);
        assert_eq!(compute_net_amount(&json!({"txid": "dd"}), ADDR), 0);
    }

    #[test]
    fn coinbase_inputs_are_ignored() {
        let tx = json!({
            "txid": "ee",
            "vin": [{"is_coinbase": true, "prevout": null}],
            "vout": [{"scriptpubkey_address": ADDR, "value": 625_000_000}]
        });
        assert_eq!(compute_net_amount(&tx, ADDR), 625_000_000);
    }

    #[test]
    fn missing_prevout_nets_zero() {
        for prevout in [json!(null), json!("00ff"), json!(7)] {
            let tx = json!({
                "txid": "ff",
                "vin": [{"prevout": prevout}],
                "vout": [{"scriptpubkey_address": ADDR, "value": 5_000}]
            });
            assert_eq!(compute_net_amount(&tx, ADDR), 0);
        }
        let no_prevout = json!({
            "txid": "ff",
            "vin": [{"txid": "aa", "vout": 0}],
            "vout": [{"scriptpubkey_address": ADDR, "value": 5_000}]
        });
        assert_eq!(compute_net_amount(&no_prevout, ADDR), 0);
    }
}
