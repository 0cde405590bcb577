//! Transaction assembly
//!
//! Materializes a selection and an [`OutputPlan`] into a signed version 2
//! transaction. Every input carries the replaceable sequence (BIP125), the
//! recipient output comes first and change, when emitted, second.
//!
//! The assembler makes no decisions: it fails if the result does not balance
//! rather than adjusting any value.
//!
//! # Security Considerations
//!
//! - Signing goes through the [`TransactionSigner`] collaborator, never a raw key
//! - A finalized transaction is only returned after the balance check passes

use crate::change::OutputPlan;
use crate::error::{TransferError, TransferResult};
use crate::math::checked_sum;
use crate::signing::TransactionSigner;
use crate::utxo_selection::SelectionResult;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

/// A signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    pub transaction: Transaction,
    pub raw_hex: String,
    pub txid: Txid,
    pub virtual_size: usize,
    pub fee_sats: u64,
}

/// Builds and signs transactions paying one recipient
pub struct TransactionAssembler<'a> {
    signer: &'a dyn TransactionSigner,
    recipient_script: ScriptBuf,
    change_script: ScriptBuf,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(
        signer: &'a dyn TransactionSigner,
        recipient_script: ScriptBuf,
        change_script: ScriptBuf,
    ) -> Self {
        Self {
            signer,
            recipient_script,
            change_script,
        }
    }

    /// Unsigned transaction for `selection` and `plan`
    pub fn build_unsigned(&self, selection: &SelectionResult, plan: &OutputPlan) -> Transaction {
        let input = selection
            .selected
            .iter()
            .map(|utxo| TxIn {
                previous_output: utxo.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
            .collect();

        let mut output = vec![TxOut {
            value: plan.recipient_value,
            script_pubkey: self.recipient_script.clone(),
        }];
        if plan.emit_change {
            output.push(TxOut {
                value: plan.change_value,
                script_pubkey: self.change_script.clone(),
            });
        }

        Transaction {
            version: 2,
            lock_time: LockTime::ZERO,
            input,
            output,
        }
    }

    /// Build, sign every input once, serialize and verify
    pub fn assemble(
        &self,
        selection: &SelectionResult,
        plan: &OutputPlan,
    ) -> TransferResult<FinalizedTransaction> {
        let unsigned = self.build_unsigned(selection, plan);

        // Sighashes are computed over the unsigned transaction
        let witnesses = selection
            .selected
            .iter()
            .enumerate()
            .map(|(index, utxo)| self.signer.sign_input(&unsigned, index, utxo.value_sats))
            .collect::<TransferResult<Vec<Witness>>>()?;

        let mut transaction = unsigned;
        for (txin, witness) in transaction.input.iter_mut().zip(witnesses) {
            txin.witness = witness;
        }

        verify_balance(&transaction, selection, plan)?;

        Ok(FinalizedTransaction {
            raw_hex: serialize_hex(&transaction),
            txid: transaction.txid(),
            virtual_size: transaction.vsize(),
            fee_sats: plan.fee_sats,
            transaction,
        })
    }
}

/// Check that outputs plus fee equal the inputs and every input is signed
pub fn verify_balance(
    transaction: &Transaction,
    selection: &SelectionResult,
    plan: &OutputPlan,
) -> TransferResult<()> {
    if transaction.input.len() != selection.input_count() {
        return Err(TransferError::signing(format!(
            "Transaction has {} inputs, selection has {}",
            transaction.input.len(),
            selection.input_count()
        )));
    }
    if transaction.input.iter().any(|txin| txin.witness.is_empty()) {
        return Err(TransferError::signing("Unsigned input in finalized transaction"));
    }
    if transaction.output.iter().any(|txout| txout.value == 0) {
        return Err(TransferError::signing("Zero-value output in finalized transaction"));
    }

    let input_total = checked_sum(selection.selected.iter().map(|u| u.value_sats));
    let output_total = checked_sum(transaction.output.iter().map(|o| o.value));
    match (input_total, output_total) {
        (Some(inputs), Some(outputs)) if outputs.checked_add(plan.fee_sats) == Some(inputs) => Ok(()),
        (inputs, outputs) => Err(TransferError::signing(format!(
            "Transaction does not balance: inputs {:?}, outputs {:?}, fee {}",
            inputs, outputs, plan.fee_sats
        ))),
    }
}
