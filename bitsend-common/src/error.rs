//! Standardized error handling for BitSend
//!
//! Every failure of a transfer, balance or history operation is one of the five
//! variants of [`TransferError`]. Each variant carries only the fields relevant
//! to it, and none of them ever carries key material.
//!
//! # Usage
//!
//! ```
//! use bitsend_common::error::{TransferError, ErrorCategory};
//!
//! let err = TransferError::InsufficientFunds { needed: 61_920, available: 50_000 };
//! assert_eq!(err.category(), ErrorCategory::InsufficientFunds);
//! assert!(err.user_message().contains("61920"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed failure taxonomy for BitSend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Malformed address, malformed secret, non-positive amount or fee rate
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No UTXO set covers amount plus fee
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// The signing collaborator could not produce a valid witness
    #[error("Signing failure: {0}")]
    SigningFailure(String),

    /// Fetch or broadcast transport failure, non-success response, or malformed payload
    #[error("Data source failure: {0}")]
    DataSourceFailure(String),

    /// The network declined the finalized transaction
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),
}

/// Type alias for a Result with TransferError
pub type TransferResult<T> = Result<T, TransferError>;

/// Error category for logging and outcome reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    InvalidInput,
    InsufficientFunds,
    SigningFailure,
    DataSourceFailure,
    BroadcastRejected,
}

impl ErrorCategory {
    /// Stable string form of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "InvalidInput",
            ErrorCategory::InsufficientFunds => "InsufficientFunds",
            ErrorCategory::SigningFailure => "SigningFailure",
            ErrorCategory::DataSourceFailure => "DataSourceFailure",
            ErrorCategory::BroadcastRejected => "BroadcastRejected",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransferError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        TransferError::InvalidInput(message.into())
    }

    /// Create a new data source error
    pub fn data_source<S: Into<String>>(message: S) -> Self {
        TransferError::DataSourceFailure(message.into())
    }

    /// Create a new signing error
    pub fn signing<S: Into<String>>(message: S) -> Self {
        TransferError::SigningFailure(message.into())
    }

    /// Get the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransferError::InvalidInput(_) => ErrorCategory::InvalidInput,
            TransferError::InsufficientFunds { .. } => ErrorCategory::InsufficientFunds,
            TransferError::SigningFailure(_) => ErrorCategory::SigningFailure,
            TransferError::DataSourceFailure(_) => ErrorCategory::DataSourceFailure,
            TransferError::BroadcastRejected(_) => ErrorCategory::BroadcastRejected,
        }
    }

    /// Whether the transaction may already have reached the network.
    ///
    /// Only a broadcast attempt can leave the ledger in an unknown state: the
    /// request may have been accepted even though no acknowledgment came back.
    pub fn is_ambiguous_broadcast(&self) -> bool {
        matches!(self, TransferError::DataSourceFailure(msg) if msg.starts_with(BROADCAST_PREFIX))
    }

    /// Get a message suitable for displaying to users
    pub fn user_message(&self) -> String {
        match self {
            TransferError::InvalidInput(message) => format!("Invalid request: {}", message),
            TransferError::InsufficientFunds { needed, available } => format!(
                "Insufficient balance: {} sats required, {} sats available",
                needed, available
            ),
            // Signer errors can echo key parsing details
            TransferError::SigningFailure(_) => "The transaction could not be signed".to_string(),
            TransferError::DataSourceFailure(message) => {
                if self.is_ambiguous_broadcast() {
                    format!(
                        "Broadcast status unknown, check the transaction before resubmitting: {}",
                        message
                    )
                } else {
                    format!("External service error: {}", message)
                }
            }
            TransferError::BroadcastRejected(reason) => {
                format!("The network rejected the transaction: {}", reason)
            }
        }
    }
}

/// Prefix marking data source failures raised while posting a transaction
pub(crate) const BROADCAST_PREFIX: &str = "broadcast:";

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::DataSourceFailure(format!("HTTP transport error: {}", err))
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::DataSourceFailure(format!("Malformed JSON payload: {}", err))
    }
}

impl From<bitcoin::address::Error> for TransferError {
    fn from(err: bitcoin::address::Error) -> Self {
        TransferError::InvalidInput(format!("Invalid Bitcoin address: {}", err))
    }
}

impl From<bitcoin::key::Error> for TransferError {
    fn from(err: bitcoin::key::Error) -> Self {
        TransferError::InvalidInput(format!("Invalid private key: {}", err))
    }
}

impl From<bitcoin::secp256k1::Error> for TransferError {
    fn from(err: bitcoin::secp256k1::Error) -> Self {
        TransferError::SigningFailure(format!("secp256k1 error: {}", err))
    }
}

impl From<bitcoin::sighash::Error> for TransferError {
    fn from(err: bitcoin::sighash::Error) -> Self {
        TransferError::SigningFailure(format!("Sighash computation failed: {}", err))
    }
}
