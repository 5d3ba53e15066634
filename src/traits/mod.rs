//! Collaborator traits
//!
//! The core never talks to a chain, an indexer or a signer directly. These
//! traits are the seams the surrounding system plugs its transport into.

mod ledger;
mod valuation;
mod vault;

pub use ledger::{LedgerReader, LedgerWriter};
pub use valuation::ValuationSource;
pub use vault::VaultReader;
