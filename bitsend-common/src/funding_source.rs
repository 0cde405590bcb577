//! Funding source client
//!
//! The [`FundingSource`] trait is the only way the pipeline talks to the outside
//! world: it lists spendable outputs, pages through history and submits raw
//! transactions. [`EsploraClient`] implements it over the Esplora REST API with a
//! blocking `reqwest` client.
//!
//! # Failure model
//!
//! Nothing is retried. Any transport error, non-2xx response or unparsable body
//! becomes a typed [`TransferError`]:
//!
//! - a non-2xx answer to `POST /tx` is `BroadcastRejected` with the server's reason
//! - a transport error during `POST /tx` is a `DataSourceFailure` flagged as
//!   ambiguous, since the transaction may have been accepted anyway
//! - everything else is a plain `DataSourceFailure`
//!
//! # Security Considerations
//!
//! - The remote service is untrusted; payloads are parsed strictly
//! - Only public data (addresses, raw signed transactions) is ever sent

use crate::config::NetworkConfig;
use crate::error::{TransferError, TransferResult, BROADCAST_PREFIX};
use crate::utxo_selection::UnspentOutput;
use bitcoin::{Transaction, Txid};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

/// Remote source of UTXOs and history, and sink for signed transactions
pub trait FundingSource {
    /// Spendable outputs of `address`, in the order the source returns them
    fn fetch_spendable(&self, address: &str) -> TransferResult<Vec<UnspentOutput>>;

    /// Submit a raw transaction, returning the id the network assigned it
    fn broadcast(&self, raw_tx_hex: &str) -> TransferResult<Txid>;

    /// Unconfirmed transactions touching `address`
    fn fetch_mempool_txs(&self, address: &str) -> TransferResult<Vec<Value>>;

    /// One page of confirmed transactions, newest first, starting after `last_seen`
    fn fetch_chain_txs(&self, address: &str, last_seen: Option<&str>) -> TransferResult<Vec<Value>>;
}

/// Reject a spendable set containing a zero-value output
pub fn validate_spendable(utxos: Vec<UnspentOutput>) -> TransferResult<Vec<UnspentOutput>> {
    match utxos.iter().find(|utxo| utxo.value_sats == 0) {
        Some(utxo) => Err(TransferError::data_source(format!(
            "malformed UTXO payload: {} has zero value",
            utxo.outpoint()
        ))),
        None => Ok(utxos),
    }
}

/// Esplora REST client
#[derive(Debug, Clone)]
pub struct EsploraClient {
    base_url: String,
    client: Client,
}

impl EsploraClient {
    /// Create a client for `base_url` (e.g. `https://blockstream.info/testnet/api`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> TransferResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a client from the network section of the configuration
    pub fn from_config(config: &NetworkConfig) -> TransferResult<Self> {
        let base_url = config
            .esplora_base_url()
            .map_err(|e| TransferError::invalid_input(e.to_string()))?;
        Self::new(base_url, Duration::from_secs(config.timeout_seconds))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> TransferResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| TransferError::data_source(format!("GET {} failed: {}", path, e)))?;
        let body = success_body(response, path)?;
        serde_json::from_str(&body).map_err(|e| {
            TransferError::data_source(format!("Malformed response from {}: {}", path, e))
        })
    }
}

// Returns the body of a 2xx response, otherwise a DataSourceFailure
fn success_body(response: Response, path: &str) -> TransferResult<String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(TransferError::data_source(format!(
            "{} returned {}: {}",
            path,
            status,
            body.trim()
        )));
    }
    Ok(response.text()?)
}

impl FundingSource for EsploraClient {
    fn fetch_spendable(&self, address: &str) -> TransferResult<Vec<UnspentOutput>> {
        validate_spendable(self.get_json(&format!("/address/{}/utxo", address))?)
    }

    fn broadcast(&self, raw_tx_hex: &str) -> TransferResult<Txid> {
        let url = format!("{}/tx", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_tx_hex.to_string())
            .send()
            .map_err(|e| TransferError::data_source(format!("{} {}", BROADCAST_PREFIX, e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().unwrap_or_default();
            return Err(TransferError::BroadcastRejected(format!(
                "{}: {}",
                status,
                reason.trim()
            )));
        }

        let body = response.text().map_err(|e| {
            TransferError::data_source(format!("{} unreadable acknowledgment: {}", BROADCAST_PREFIX, e))
        })?;
        Txid::from_str(body.trim()).map_err(|e| {
            TransferError::data_source(format!(
                "{} acknowledgment is not a txid ({}): {}",
                BROADCAST_PREFIX,
                e,
                body.trim()
            ))
        })
    }

    fn fetch_mempool_txs(&self, address: &str) -> TransferResult<Vec<Value>> {
        self.get_json(&format!("/address/{}/txs/mempool", address))
    }

    fn fetch_chain_txs(&self, address: &str, last_seen: Option<&str>) -> TransferResult<Vec<Value>> {
        match last_seen {
            None => self.get_json(&format!("/address/{}/txs", address)),
            Some(txid) => self.get_json(&format!("/address/{}/txs/chain/{}", address, txid)),
        }
    }
}

/// In-memory funding source.
///
/// # WARNING: FOR TESTING PURPOSES ONLY
///
/// Serves canned UTXOs and history pages and records every broadcast and page
/// request, so tests can assert on what was (or was not) sent. A successful
/// broadcast returns the txid of the submitted transaction, as Esplora does.
#[derive(Debug, Default)]
pub struct MockFundingSource {
    utxos: Vec<UnspentOutput>,
    mempool: Vec<Value>,
    chain_pages: Vec<Vec<Value>>,
    fetch_error: Option<TransferError>,
    broadcast_error: Option<TransferError>,
    broadcasts: Mutex<Vec<String>>,
    page_requests: Mutex<Vec<Option<String>>>,
}

impl MockFundingSource {
    pub fn new(utxos: Vec<UnspentOutput>) -> Self {
        Self {
            utxos,
            ..Default::default()
        }
    }

    pub fn with_mempool(mut self, txs: Vec<Value>) -> Self {
        self.mempool = txs;
        self
    }

    /// Confirmed pages served in order; requests past the last page get an empty page
    pub fn with_chain_pages(mut self, pages: Vec<Vec<Value>>) -> Self {
        self.chain_pages = pages;
        self
    }

    /// Make every fetch fail with `err`
    pub fn with_fetch_error(mut self, err: TransferError) -> Self {
        self.fetch_error = Some(err);
        self
    }

    /// Make broadcasts fail with `err`
    pub fn with_broadcast_error(mut self, err: TransferError) -> Self {
        self.broadcast_error = Some(err);
        self
    }

    /// Raw transactions submitted so far
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts().len()
    }

    /// Cursor of every confirmed-page request, in order
    pub fn page_requests(&self) -> Vec<Option<String>> {
        self.page_requests.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn check_fetch(&self) -> TransferResult<()> {
        match &self.fetch_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl FundingSource for MockFundingSource {
    fn fetch_spendable(&self, _address: &str) -> TransferResult<Vec<UnspentOutput>> {
        self.check_fetch()?;
        validate_spendable(self.utxos.clone())
    }

    fn broadcast(&self, raw_tx_hex: &str) -> TransferResult<Txid> {
        if let Ok(mut broadcasts) = self.broadcasts.lock() {
            broadcasts.push(raw_tx_hex.to_string());
        }
        if let Some(err) = &self.broadcast_error {
            return Err(err.clone());
        }

        let bytes = hex::decode(raw_tx_hex)
            .map_err(|e| TransferError::BroadcastRejected(format!("TX decode failed: {}", e)))?;
        let tx: Transaction = bitcoin::consensus::deserialize(&bytes)
            .map_err(|e| TransferError::BroadcastRejected(format!("TX decode failed: {}", e)))?;
        Ok(tx.txid())
    }

    fn fetch_mempool_txs(&self, _address: &str) -> TransferResult<Vec<Value>> {
        self.check_fetch()?;
        Ok(self.mempool.clone())
    }

    fn fetch_chain_txs(&self, _address: &str, last_seen: Option<&str>) -> TransferResult<Vec<Value>> {
        self.check_fetch()?;
        let index = match self.page_requests.lock() {
            Ok(mut requests) => {
                requests.push(last_seen.map(str::to_string));
                requests.len() - 1
            }
            Err(_) => return Err(TransferError::data_source("mock state poisoned")),
        };
        Ok(self.chain_pages.get(index).cloned().unwrap_or_default())
    }
}
