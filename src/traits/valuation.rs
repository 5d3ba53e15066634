//! Bonding curve valuation

use crate::error::Result;
use crate::types::{Assets, CurveId, Shares};
use async_trait::async_trait;

/// Remote bonding curve registry.
///
/// # Example
///
/// ```rust,ignore
/// use entry_market::ValuationSource;
///
/// // Price of the first `shares` shares on curve 4 from an empty vault
/// let price = source.convert_to_assets(shares, shares, 0, 4).await?;
/// ```
#[async_trait]
pub trait ValuationSource: Send + Sync {
    /// Convert a share quantity to assets on the given curve.
    ///
    /// `total_shares` and `total_assets` describe the vault state the
    /// conversion is evaluated against.
    async fn convert_to_assets(
        &self,
        shares: Shares,
        total_shares: Shares,
        total_assets: Assets,
        curve_id: CurveId,
    ) -> Result<Assets>;

    /// Human readable curve name
    async fn curve_name(&self, curve_id: CurveId) -> Result<String>;
}
