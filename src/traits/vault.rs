//! Vault state reads

use crate::error::Result;
use crate::types::{Assets, CurveId, EntityId, UserPosition, VaultTotals};
use async_trait::async_trait;

/// Reads vault state for entities.
#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Totals of the default vault for a term
    async fn vault_totals(&self, term_id: EntityId) -> Result<VaultTotals>;

    /// Totals of a term's vault on a specific curve
    async fn curve_vault_totals(&self, term_id: EntityId, curve_id: CurveId) -> Result<VaultTotals>;

    /// An account's position in a term's curve vault
    async fn user_position(
        &self,
        term_id: EntityId,
        curve_id: CurveId,
        account: &str,
    ) -> Result<UserPosition>;

    /// Current price of one share in a term's curve vault
    async fn current_share_price(&self, term_id: EntityId, curve_id: CurveId) -> Result<Assets>;
}
