//! BitSend Common Library
//!
//! Builds, signs and submits single-recipient P2WPKH transfers, and reports
//! balances and history of an address through an Esplora data source.
//!
//! # Modules
//!
//! - `types`: Request, outcome and balance types
//! - `error`: The closed failure taxonomy
//! - `math`: Satoshi arithmetic and the heuristic size model
//! - `logging`: Injected, security-aware logging
//! - `config`: TOML configuration
//! - `utxo_selection`: Greedy input selection
//! - `fee_estimation`: Provisional and measured fees
//! - `change`: Dust-aware change policy
//! - `signing`: WIF identities and the signer seam
//! - `assembler`: Transaction materialization and verification
//! - `funding_source`: Esplora client and the `FundingSource` trait
//! - `history`: Paged history with per-transaction net amounts
//! - `transfer`: End-to-end operations
//!
//! # Security Considerations
//!
//! - WIF secrets are wrapped in [`SensitiveString`] and wiped on drop
//! - Logging never sees key material; identifiers are truncated
//! - Nothing is broadcast unless a fully signed, balanced transaction exists

/// Core domain types
pub mod types;

/// Error taxonomy
pub mod error;

/// Bitcoin-related calculations and math utilities
pub mod math;

/// Secure logging functionality
pub mod logging;

/// Configuration management
pub mod config;

/// UTXO selection
pub mod utxo_selection;

/// Fee estimation
pub mod fee_estimation;

/// Change output policy
pub mod change;

/// Identity derivation and signing
pub mod signing;

/// Transaction assembly
pub mod assembler;

/// Esplora data source
pub mod funding_source;

/// Address history
pub mod history;

/// Transfer operations
pub mod transfer;

pub use bitcoin::{Address, Network, OutPoint, Transaction, Txid};

pub use types::{
    FeeRate, NewWallet, SensitiveString, TransferOutcome, TransferRequest, WalletBalance,
    DUST_THRESHOLD, MAX_BITCOIN_SUPPLY, SATS_PER_BTC,
};

pub use error::{ErrorCategory, TransferError, TransferResult};

pub use math::{calculate_fee, estimate_tx_vsize, is_dust_amount};

pub use utxo_selection::{GreedySelector, SelectionResult, UnspentOutput};

pub use fee_estimation::{FeeEstimate, FeeEstimator};

pub use change::{plan_outputs, OutputPlan};

pub use signing::{Identity, TransactionSigner, WifSigner};

pub use assembler::{FinalizedTransaction, TransactionAssembler};

pub use funding_source::{EsploraClient, FundingSource, MockFundingSource};

pub use history::{AddressHistory, HistoryAggregator, HistoryEntry};

pub use transfer::{
    create_wallet, get_address_history, get_wallet_balance, send_transaction,
    send_transaction_with_limits, try_send_transaction, TransferReceipt,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use std::sync::Once;

static INIT: Once = Once::new();

/// Library initialization
///
/// Installs the `log` backend with the default [`logging::LogConfig`]. Safe to
/// call multiple times; only the first call has an effect.
pub fn init() -> Result<(), String> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = logging::init(&logging::LogConfig::default())
            .map_err(|e| format!("Failed to initialize logging: {}", e));
    });
    result
}
