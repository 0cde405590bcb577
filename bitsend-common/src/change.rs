//! Change policy
//!
//! Change strictly above the dust threshold becomes a second output back to the
//! sender. Anything at or below it is added to the fee; the recipient amount is
//! never touched.

use crate::error::{TransferError, TransferResult};
use crate::math::{is_dust_amount, remaining_change};
use crate::types::DUST_THRESHOLD;

/// Final split of the input total between recipient, change and fee
///
/// Always satisfies `recipient_value + change_value + fee_sats == total_input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPlan {
    pub recipient_value: u64,
    /// Zero when no change output is emitted
    pub change_value: u64,
    pub emit_change: bool,
    /// Fee actually paid, including any burned sub-dust change
    pub fee_sats: u64,
}

impl OutputPlan {
    /// Change that was folded into the fee
    pub fn burned_change(&self, estimated_fee: u64) -> u64 {
        self.fee_sats.saturating_sub(estimated_fee)
    }

    pub fn output_count(&self) -> usize {
        if self.emit_change {
            2
        } else {
            1
        }
    }
}

/// Decide the outputs for paying `amount` out of `total_input` with `fee`
///
/// # Returns
/// `InsufficientFunds` when `total_input < amount + fee`, `InvalidInput` for a
/// zero amount
pub fn plan_outputs(total_input: u64, amount: u64, fee: u64) -> TransferResult<OutputPlan> {
    if amount == 0 {
        return Err(TransferError::invalid_input("Amount must be greater than zero"));
    }

    let change = remaining_change(total_input, amount, fee).ok_or_else(|| {
        TransferError::InsufficientFunds {
            needed: amount.saturating_add(fee),
            available: total_input,
        }
    })?;

    if is_dust_amount(change) {
        Ok(OutputPlan {
            recipient_value: amount,
            change_value: 0,
            emit_change: false,
            fee_sats: fee + change,
        })
    } else {
        debug_assert!(change > DUST_THRESHOLD);
        Ok(OutputPlan {
            recipient_value: amount,
            change_value: change,
            emit_change: true,
            fee_sats: fee,
        })
    }
}
