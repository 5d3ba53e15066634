//! Vault state reads
//!
//! Independent reads are issued concurrently and fail as a unit: a stats
//! view is never assembled from a subset of its reads.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use crate::error::{MarketError, Result};
use crate::traits::VaultReader;
use crate::types::{CurveId, EntityId, VaultStats, VaultTotals};

pub struct VaultService {
    reader: Arc<dyn VaultReader>,
}

impl VaultService {
    pub fn new(reader: Arc<dyn VaultReader>) -> Self {
        Self { reader }
    }

    /// Position, totals and share price for one account on one curve vault
    pub async fn stats(&self, term_id: EntityId, curve_id: CurveId, account: &str) -> Result<VaultStats> {
        let (user_position, vault_totals, share_price) = tokio::try_join!(
            self.reader.user_position(term_id, curve_id, account),
            self.reader.curve_vault_totals(term_id, curve_id),
            self.reader.current_share_price(term_id, curve_id),
        )?;

        debug!(%term_id, curve_id, account, share_price, "Vault stats loaded");
        Ok(VaultStats {
            user_position,
            vault_totals,
            share_price,
        })
    }

    /// Default-vault totals for many terms, in request order
    pub async fn totals_batch(&self, term_ids: &[EntityId]) -> Result<Vec<(EntityId, VaultTotals)>> {
        let reads = term_ids.iter().map(move |&term_id| async move {
            let totals = self.reader.vault_totals(term_id).await?;
            Ok::<_, MarketError>((term_id, totals))
        });

        let totals = try_join_all(reads).await?;
        debug!(count = totals.len(), "Vault totals batch loaded");
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockVault;
    use crate::types::UserPosition;

    #[tokio::test]
    async fn test_stats_combines_reads() {
        let vault = Arc::new(
            MockVault::new()
                .with_totals(EntityId(1), VaultTotals { total_assets: 50, total_shares: 40 })
                .with_position(EntityId(1), "0xabc", UserPosition { shares: 4, assets: 5 })
                .with_share_price(EntityId(1), 1_250),
        );
        let service = VaultService::new(vault);

        let stats = service.stats(EntityId(1), 3, "0xabc").await.unwrap();
        assert_eq!(stats.vault_totals.total_shares, 40);
        assert_eq!(stats.user_position.shares, 4);
        assert_eq!(stats.share_price, 1_250);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let vault = Arc::new(
            MockVault::new()
                .with_totals(EntityId(2), VaultTotals { total_assets: 2, total_shares: 20 })
                .with_totals(EntityId(1), VaultTotals { total_assets: 1, total_shares: 10 }),
        );
        let service = VaultService::new(vault);

        let totals = service.totals_batch(&[EntityId(1), EntityId(2)]).await.unwrap();
        assert_eq!(totals[0].0, EntityId(1));
        assert_eq!(totals[1].1.total_shares, 20);
    }

    #[tokio::test]
    async fn test_batch_fails_as_a_whole() {
        let vault = Arc::new(
            MockVault::new().with_totals(EntityId(1), VaultTotals { total_assets: 1, total_shares: 10 }),
        );
        let service = VaultService::new(vault);

        assert!(service.totals_batch(&[EntityId(1), EntityId(99)]).await.is_err());
    }
}
