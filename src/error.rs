//! Error types for the entry market core

use thiserror::Error;

use crate::types::Triple;

/// Result type for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Market error types
///
/// Payloads are strings so a single result can be handed to every caller
/// waiting on a coalesced request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Valuation source, ledger or vault could not be reached
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote answered with something we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Requested share range is empty-reversed or cannot be quantized
    #[error("Invalid share range: start {start}, end {end}")]
    InvalidRange { start: u128, end: u128 },

    /// First triple of a two-triple tag landed, the second did not
    #[error("Partial tag: wrote {written}, then failed: {reason}")]
    PartialTag {
        written: Triple,
        reason: Box<MarketError>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Coalesced request lost its leader too many times
    #[error("Coalesced request abandoned: {0}")]
    Coalesce(String),
}

impl MarketError {
    /// Whether the failure came from a remote collaborator
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MarketError::RemoteUnavailable(_) | MarketError::InvalidResponse(_)
        )
    }
}

impl From<toml::de::Error> for MarketError {
    fn from(err: toml::de::Error) -> Self {
        MarketError::Config(err.to_string())
    }
}

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        MarketError::Config(err.to_string())
    }
}
