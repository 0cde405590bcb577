//! Core types for UTXO selection
//!
//! [`UnspentOutput`] deserializes directly from the Esplora `/address/{addr}/utxo`
//! payload (`txid`, `vout`, `value`); the `status` object is ignored.

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

/// A spendable output belonging to the funding address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Transaction that created the output
    pub txid: Txid,
    /// Output index within that transaction
    pub vout: u32,
    /// Value in satoshis
    #[serde(rename = "value")]
    pub value_sats: u64,
}

impl UnspentOutput {
    pub fn new(txid: Txid, vout: u32, value_sats: u64) -> Self {
        Self {
            txid,
            vout,
            value_sats,
        }
    }

    /// Reference used as the previous output of a spending input
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// Outcome of a successful selection
///
/// `selected` keeps the order in which the outputs were taken from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    pub selected: Vec<UnspentOutput>,
    pub total_input_value: u64,
}

impl SelectionResult {
    pub fn input_count(&self) -> usize {
        self.selected.len()
    }

    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.selected.iter().map(UnspentOutput::outpoint).collect()
    }
}
