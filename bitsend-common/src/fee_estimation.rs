//! Two-pass fee estimation
//!
//! The exact size of a transaction depends on its signatures, which depend on its
//! outputs, which depend on the fee. The loop is broken in two passes:
//!
//! 1. **Provisional**: the heuristic size for the selected input count gives a
//!    first fee and first change value.
//! 2. **Measurement**: a fully signed draft with the provisional outputs is
//!    built, its virtual size measured and the fee recomputed at the same rate.
//!
//! When the measured fee leaves enough change for a change output the draft did
//! not carry, the draft is rebuilt with that output and measured once more. The
//! returned fee therefore always covers the output set the final plan will have.
//! If the larger fee pushes the change back to dust, the change is burned and the
//! smaller transaction overpays slightly.
//!
//! The draft is discarded; only the exact [`FeeEstimate`] leaves this module.
//!
//! # Security Considerations
//!
//! - The draft is signed with the real key but never leaves this module
//! - Both passes fail with `InsufficientFunds` rather than shrinking any output

use crate::assembler::TransactionAssembler;
use crate::change::{plan_outputs, OutputPlan};
use crate::error::TransferResult;
use crate::logging::{EventLogger, LogContext};
use crate::math::{calculate_fee, estimate_tx_vsize};
use crate::types::FeeRate;
use crate::utxo_selection::SelectionResult;
use bitcoin::Transaction;
use serde_json::json;

/// Virtual size and the fee it costs at a given rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub virtual_size: usize,
    pub fee_rate: FeeRate,
    pub fee_sats: u64,
}

impl FeeEstimate {
    pub fn for_vsize(virtual_size: usize, fee_rate: FeeRate) -> Self {
        Self {
            virtual_size,
            fee_rate,
            fee_sats: calculate_fee(virtual_size, fee_rate),
        }
    }

    /// Heuristic estimate for a spend of `input_count` inputs
    pub fn provisional(input_count: usize, fee_rate: FeeRate) -> Self {
        Self::for_vsize(estimate_tx_vsize(input_count), fee_rate)
    }

    /// Estimate from the measured size of a signed transaction
    pub fn measured(transaction: &Transaction, fee_rate: FeeRate) -> Self {
        Self::for_vsize(transaction.vsize(), fee_rate)
    }
}

/// Runs both estimation passes for one selection
pub struct FeeEstimator<'a> {
    fee_rate: FeeRate,
    logger: &'a dyn EventLogger,
}

impl<'a> FeeEstimator<'a> {
    pub fn new(fee_rate: FeeRate, logger: &'a dyn EventLogger) -> Self {
        Self { fee_rate, logger }
    }

    /// Exact fee for paying `amount` from `selection`
    ///
    /// # Returns
    /// The estimate measured on the output set the exact fee leads to, or
    /// `InsufficientFunds` if either the provisional or the exact change would be
    /// negative
    pub fn estimate(
        &self,
        selection: &SelectionResult,
        amount: u64,
        assembler: &TransactionAssembler<'_>,
    ) -> TransferResult<FeeEstimate> {
        let provisional = FeeEstimate::provisional(selection.input_count(), self.fee_rate);
        let draft_plan = plan_outputs(selection.total_input_value, amount, provisional.fee_sats)?;
        self.logger.debug(
            LogContext::Core,
            "provisional fee",
            Some(json!({
                "vsize": provisional.virtual_size,
                "fee": provisional.fee_sats,
                "draft_change": draft_plan.emit_change,
            })),
        );

        let mut measured_plan = draft_plan;
        let mut exact = self.measure(selection, &measured_plan, assembler)?;
        loop {
            // Exact change must still be non-negative
            let next = plan_outputs(selection.total_input_value, amount, exact.fee_sats)?;
            if !next.emit_change || measured_plan.emit_change {
                break;
            }
            // A change output the draft did not carry makes the final transaction larger
            self.logger.debug(
                LogContext::Core,
                "change output appeared after measurement, measuring again",
                Some(json!({ "vsize": exact.virtual_size, "change": next.change_value })),
            );
            measured_plan = next;
            exact = self.measure(selection, &measured_plan, assembler)?;
        }

        self.logger.info(
            LogContext::Core,
            "measured fee",
            Some(json!({
                "provisional_vsize": provisional.virtual_size,
                "vsize": exact.virtual_size,
                "fee": exact.fee_sats,
                "rate": self.fee_rate.to_string(),
            })),
        );
        Ok(exact)
    }

    fn measure(
        &self,
        selection: &SelectionResult,
        plan: &OutputPlan,
        assembler: &TransactionAssembler<'_>,
    ) -> TransferResult<FeeEstimate> {
        let draft = assembler.assemble(selection, plan)?;
        Ok(FeeEstimate::measured(&draft.transaction, self.fee_rate))
    }
}
