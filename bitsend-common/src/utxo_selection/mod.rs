//! UTXO selection module
//!
//! Picks which unspent outputs of the funding address pay for a transfer.
//!
//! # Module Structure
//!
//! - `types.rs` - [`UnspentOutput`] and [`SelectionResult`]
//! - `selector.rs` - [`GreedySelector`], first-satisfying-prefix selection in source order
//!
//! # Typical Usage
//!
//! ```
//! use bitsend_common::utxo_selection::{GreedySelector, UnspentOutput};
//! use bitsend_common::logging::MemoryLogger;
//! use bitsend_common::types::FeeRate;
//!
//! let txid = "7967a5185e907a25225574544c31f7b059c1a191d65b53dcc1554d339c4f9efc".parse().unwrap();
//! let utxos = vec![UnspentOutput::new(txid, 0, 100_000)];
//!
//! let selector = GreedySelector::new(FeeRate::default());
//! let result = selector.select(&utxos, 50_000, &MemoryLogger::new()).unwrap();
//! assert_eq!(result.input_count(), 1);
//! assert_eq!(result.total_input_value, 100_000);
//! ```
//!
//! # Security Considerations
//!
//! - Selection never sees key material
//! - The order of the source list is respected, so callers control which coins move first

pub mod selector;
pub mod types;

pub use selector::GreedySelector;
pub use types::{SelectionResult, UnspentOutput};
