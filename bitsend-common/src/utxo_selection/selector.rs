//! Greedy UTXO selector
//!
//! Accumulates outputs in the order the funding source returned them and stops at
//! the first prefix that covers the amount plus the heuristic fee for that many
//! inputs. No sorting, no attempt to minimize input count or change.
//!
//! # Security Considerations
//!
//! - The selector itself does not handle private keys or signatures
//! - Duplicate outpoints from a misbehaving source are skipped, never spent twice

use crate::error::{TransferError, TransferResult};
use crate::logging::{EventLogger, LogContext};
use crate::math::{calculate_fee, estimate_tx_vsize};
use crate::types::FeeRate;
use crate::utxo_selection::types::{SelectionResult, UnspentOutput};
use bitcoin::OutPoint;
use serde_json::json;
use std::collections::HashSet;

/// First-satisfying-prefix selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreedySelector {
    fee_rate: FeeRate,
}

impl GreedySelector {
    /// Create a selector that estimates fees at `fee_rate`
    pub fn new(fee_rate: FeeRate) -> Self {
        Self { fee_rate }
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    /// Select inputs for a payment of `amount_sats`
    ///
    /// # Arguments
    /// * `utxos` - Spendable outputs in source order
    /// * `amount_sats` - Amount the recipient must receive
    /// * `logger` - Observability collaborator
    ///
    /// # Returns
    /// The shortest satisfying prefix (duplicates skipped), or
    /// `InsufficientFunds` carrying the last target that was checked
    pub fn select(
        &self,
        utxos: &[UnspentOutput],
        amount_sats: u64,
        logger: &dyn EventLogger,
    ) -> TransferResult<SelectionResult> {
        if utxos.is_empty() {
            logger.warn(
                LogContext::Core,
                "no spendable outputs available",
                Some(json!({ "amount": amount_sats })),
            );
            return Err(TransferError::InsufficientFunds {
                needed: amount_sats,
                available: 0,
            });
        }

        let mut seen: HashSet<OutPoint> = HashSet::with_capacity(utxos.len());
        let mut selected = Vec::new();
        let mut total: u64 = 0;
        let mut needed = amount_sats;

        for utxo in utxos {
            if !seen.insert(utxo.outpoint()) {
                logger.warn(
                    LogContext::Core,
                    "skipping duplicate outpoint",
                    Some(json!({ "txid": utxo.txid.to_string(), "vout": utxo.vout })),
                );
                continue;
            }

            selected.push(utxo.clone());
            total = total.saturating_add(utxo.value_sats);

            let vsize = estimate_tx_vsize(selected.len());
            needed = amount_sats.saturating_add(calculate_fee(vsize, self.fee_rate));

            if total >= needed {
                logger.info(
                    LogContext::Core,
                    "selected inputs",
                    Some(json!({
                        "inputs": selected.len(),
                        "total": total,
                        "needed": needed,
                    })),
                );
                return Ok(SelectionResult {
                    selected,
                    total_input_value: total,
                });
            }
        }

        logger.warn(
            LogContext::Core,
            "spendable outputs exhausted",
            Some(json!({ "needed": needed, "available": total })),
        );
        Err(TransferError::InsufficientFunds {
            needed,
            available: total,
        })
    }
}
