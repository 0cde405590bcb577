//! Common data types for BitSend
//!
//! These types are the request and result values exchanged with callers. They are
//! created fresh per operation and never mutated after construction.
//!
//! IMPORTANT: apart from [`SensitiveString`], these types MUST NOT contain private
//! keys or other secret material.

use crate::error::{ErrorCategory, TransferError, TransferResult};
use crate::utxo_selection::UnspentOutput;
use bitcoin::Network;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

// Constants for Bitcoin-specific values

/// Dust threshold for P2WPKH outputs; change at or below this is burned into the fee
pub const DUST_THRESHOLD: u64 = 546;

/// Constant for satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Constant for maximum Bitcoin supply in satoshis
pub const MAX_BITCOIN_SUPPLY: u64 = 21_000_000 * SATS_PER_BTC;

/// Fee rate used when the caller does not pick one
pub const DEFAULT_FEE_RATE_SAT_VB: u64 = 10;

/// A string that contains sensitive data that should be zeroed when dropped
///
/// Used for WIF secrets handed to the transfer functions and returned by
/// [`crate::transfer::create_wallet`].
///
/// ```
/// use bitsend_common::types::SensitiveString;
///
/// let wif = SensitiveString::new("cVt4o7BGAig1UXywgGSmARhxMdzP5qvQsxKkSsc1XEkw3tDTQFpy");
/// assert_eq!(format!("{:?}", wif), "SensitiveString([REDACTED], length=52)");
/// ```
#[derive(Zeroize, ZeroizeOnDrop, Clone, PartialEq, Eq)]
pub struct SensitiveString {
    inner: String,
}

impl SensitiveString {
    /// Create a new SensitiveString
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Expose the secret value
    ///
    /// Never persist or log the returned reference.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Length of the secret in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SensitiveString([REDACTED], length={})", self.len())
    }
}

impl From<&str> for SensitiveString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Fee rate in satoshis per virtual byte
///
/// Fractional rates are allowed; fees are always rounded up to a whole satoshi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(Decimal);

impl FeeRate {
    /// Create a fee rate, rejecting zero and negative values
    pub fn from_sat_per_vb(rate: Decimal) -> TransferResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(TransferError::invalid_input(format!(
                "Fee rate must be positive, got {} sat/vB",
                rate
            )));
        }
        Ok(Self(rate))
    }

    /// Create a fee rate from a whole number of sat/vB
    pub fn from_sat_per_vb_u64(rate: u64) -> TransferResult<Self> {
        Self::from_sat_per_vb(Decimal::from(rate))
    }

    /// Rate in sat/vB
    pub fn as_sat_per_vb(&self) -> Decimal {
        self.0
    }

    /// Fee for the given virtual size: `ceil(vsize * rate)`
    ///
    /// Saturates at `u64::MAX`, which no set of inputs can cover.
    pub fn fee_for_vsize(&self, vsize: usize) -> u64 {
        self.0
            .checked_mul(Decimal::from(vsize))
            .and_then(|fee| fee.ceil().to_u64())
            .unwrap_or(u64::MAX)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(Decimal::from(DEFAULT_FEE_RATE_SAT_VB))
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

/// Parse a network name as accepted in configuration and requests
pub fn parse_network(name: &str) -> TransferResult<Network> {
    match name.trim().to_lowercase().as_str() {
        "mainnet" | "bitcoin" | "main" => Ok(Network::Bitcoin),
        "testnet" | "test" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        other => Err(TransferError::invalid_input(format!(
            "Unknown network: {}",
            other
        ))),
    }
}

/// Everything needed to send a single-recipient transfer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Funding identity in wallet import format
    pub wif: SensitiveString,
    /// Destination address
    pub recipient: String,
    /// Amount the recipient receives, in satoshis
    pub amount_sats: u64,
    /// Fee rate for both estimation passes
    pub fee_rate: FeeRate,
    /// Network the identity and recipient must belong to
    pub network: Network,
}

impl TransferRequest {
    pub fn new(
        wif: impl Into<SensitiveString>,
        recipient: impl Into<String>,
        amount_sats: u64,
        network: Network,
    ) -> Self {
        Self {
            wif: wif.into(),
            recipient: recipient.into(),
            amount_sats,
            fee_rate: FeeRate::default(),
            network,
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = fee_rate;
        self
    }
}

/// Terminal result of one transfer operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_sats: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_category: Option<ErrorCategory>,
}

impl TransferOutcome {
    /// Outcome of a broadcast the network accepted
    pub fn succeeded(
        transaction_id: String,
        sender_address: String,
        recipient_address: String,
        sent_amount: u64,
        fee_sats: u64,
    ) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            sender_address: Some(sender_address),
            recipient_address: Some(recipient_address),
            sent_amount: Some(sent_amount),
            fee_sats: Some(fee_sats),
            failure_reason: None,
            failure_category: None,
        }
    }

    /// Outcome of an operation that submitted nothing, or whose broadcast failed
    pub fn failed(err: &TransferError) -> Self {
        Self {
            success: false,
            transaction_id: None,
            sender_address: None,
            recipient_address: None,
            sent_amount: None,
            fee_sats: None,
            failure_reason: Some(err.user_message()),
            failure_category: Some(err.category()),
        }
    }
}

/// Spendable balance of an address, derived from its UTXOs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub address: String,
    pub balance_sats: u64,
    pub utxos: Vec<UnspentOutput>,
    pub total_utxos: usize,
}

impl WalletBalance {
    pub fn from_utxos(address: String, utxos: Vec<UnspentOutput>) -> Self {
        let balance_sats = utxos.iter().map(|u| u.value_sats).sum();
        Self {
            address,
            balance_sats,
            total_utxos: utxos.len(),
            utxos,
        }
    }

    /// Balance formatted in BTC with eight decimals
    pub fn balance_btc(&self) -> String {
        format!("{:.8}", bitcoin::Amount::from_sat(self.balance_sats).to_btc())
    }
}

/// A freshly generated P2WPKH identity
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub address: String,
    pub wif: SensitiveString,
    pub public_key: String,
    pub network: Network,
}
