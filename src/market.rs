//! The market service object
//!
//! [`EntryMarket`] owns every cache in the crate: the curve price cache,
//! resolved entity identifiers, tag identifiers and asserted triples. Two
//! markets in one process share nothing, so tests and multiple apps can run
//! side by side.

use std::sync::Arc;
use tracing::info;

use crate::cache::{CurveSampleCache, SampleCacheStats};
use crate::config::MarketConfig;
use crate::curve::{CurveSampler, PriceCurveService};
use crate::error::Result;
use crate::registry::{AppTagIds, EntityRegistry, TagReconciler, TypeTagIds};
use crate::traits::{LedgerReader, LedgerWriter, ValuationSource, VaultReader};
use crate::types::{
    CurveChart, CurveId, CurveSample, EntityDefinition, EntityId, Shares, VaultStats, VaultTotals,
};
use crate::vault::VaultService;

/// Remote collaborators a market is built on
#[derive(Clone)]
pub struct Collaborators {
    pub valuation: Arc<dyn ValuationSource>,
    pub ledger_reader: Arc<dyn LedgerReader>,
    pub ledger_writer: Arc<dyn LedgerWriter>,
    pub vaults: Arc<dyn VaultReader>,
}

/// Sampling, entity resolution and tagging for one application
pub struct EntryMarket {
    config: MarketConfig,
    valuation: Arc<dyn ValuationSource>,
    sampler: Arc<CurveSampler>,
    registry: Arc<EntityRegistry>,
    tags: TagReconciler,
    price_curves: PriceCurveService,
    vaults: VaultService,
}

impl EntryMarket {
    pub fn new(config: MarketConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(CurveSampleCache::new(
            collaborators.valuation.clone(),
            CurveId::from(config.curve.curve_id),
        ));
        let sampler = Arc::new(CurveSampler::new(cache, &config.curve)?);
        let registry = Arc::new(EntityRegistry::new(
            collaborators.ledger_reader,
            collaborators.ledger_writer,
        ));
        let tags = TagReconciler::new(registry.clone(), &config.app);
        let price_curves = PriceCurveService::new(
            sampler.clone(),
            collaborators.vaults.clone(),
            Shares::from(config.curve.chart_floor),
        );

        info!(
            app = %config.app.name,
            curve_id = config.curve.curve_id,
            resolution = config.curve.resolution,
            "Entry market initialized"
        );

        Ok(Self {
            config,
            valuation: collaborators.valuation,
            sampler,
            registry,
            tags,
            price_curves,
            vaults: VaultService::new(collaborators.vaults),
        })
    }

    /// Market built from defaults plus environment overrides
    pub fn from_env(collaborators: Collaborators) -> Result<Self> {
        Self::new(MarketConfig::from_env()?, collaborators)
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    // =========================================================================
    // Curve
    // =========================================================================

    /// Grid-aligned sample of `[start, end]` plus the exact price of `special`
    pub async fn sample(&self, start: Shares, end: Shares, special: Shares) -> Result<CurveSample> {
        self.sampler.sample(start, end, special).await
    }

    /// Price-curve chart for a vault; `total_shares` skips the vault read
    pub async fn chart(&self, term_id: EntityId, total_shares: Option<Shares>) -> Result<CurveChart> {
        self.price_curves.chart(term_id, total_shares).await
    }

    /// Name of the configured curve, logged once looked up
    pub async fn curve_name(&self) -> Result<String> {
        self.price_curves.announce(self.valuation.as_ref()).await
    }

    pub fn cache_stats(&self) -> SampleCacheStats {
        self.sampler.cache().stats()
    }

    // =========================================================================
    // Entities and tags
    // =========================================================================

    pub async fn resolve_entity(&self, definition: &EntityDefinition) -> Result<EntityId> {
        self.registry.resolve(definition).await
    }

    /// Create without lookup, for content that cannot exist yet
    pub async fn create_entity(&self, definition: &EntityDefinition) -> Result<EntityId> {
        self.registry.create(definition).await
    }

    pub async fn app_tag_ids(&self) -> Result<AppTagIds> {
        self.tags.app_tag_ids().await
    }

    pub async fn type_tag_ids(&self) -> Result<TypeTagIds> {
        self.tags.type_tag_ids().await
    }

    pub async fn sub_entry_of_predicate_id(&self) -> Result<EntityId> {
        self.tags.sub_entry_of_predicate_id().await
    }

    pub async fn tag_as_app_content(&self, entity_id: EntityId) -> Result<()> {
        self.tags.tag_as_app_content(entity_id).await
    }

    pub async fn tag_as_entry(&self, entity_id: EntityId) -> Result<()> {
        self.tags.tag_as_entry(entity_id).await
    }

    /// See [`TagReconciler::tag_as_sub_entry_of_entry`] for partial failure
    pub async fn tag_as_sub_entry_of_entry(
        &self,
        sub_entry_id: EntityId,
        entry_id: EntityId,
    ) -> Result<()> {
        self.tags.tag_as_sub_entry_of_entry(sub_entry_id, entry_id).await
    }

    pub fn tags(&self) -> &TagReconciler {
        &self.tags
    }

    // =========================================================================
    // Vaults
    // =========================================================================

    /// Stats for an account on the stats curve (`curve.stats_curve_id`)
    pub async fn stats(&self, term_id: EntityId, account: &str) -> Result<VaultStats> {
        let curve_id = CurveId::from(self.config.curve.stats_curve_id);
        self.stats_on_curve(term_id, curve_id, account).await
    }

    pub async fn stats_on_curve(
        &self,
        term_id: EntityId,
        curve_id: CurveId,
        account: &str,
    ) -> Result<VaultStats> {
        self.vaults.stats(term_id, curve_id, account).await
    }

    pub async fn totals_batch(&self, term_ids: &[EntityId]) -> Result<Vec<(EntityId, VaultTotals)>> {
        self.vaults.totals_batch(term_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCurve, MockLedger, MockVault};
    use crate::types::{UserPosition, VaultTotals};

    fn market(curve: Arc<MockCurve>, ledger: Arc<MockLedger>) -> EntryMarket {
        EntryMarket::new(
            MarketConfig::default(),
            Collaborators {
                valuation: curve,
                ledger_reader: ledger.clone(),
                ledger_writer: ledger,
                vaults: Arc::new(MockVault::new()),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_markets_do_not_share_caches() {
        let curve = Arc::new(MockCurve::identity());
        let first = market(curve.clone(), Arc::new(MockLedger::new()));
        let second = market(curve.clone(), Arc::new(MockLedger::new()));

        first.sample(0, 16_000_000, 0).await.unwrap();
        let calls = curve.call_count();
        second.sample(0, 16_000_000, 0).await.unwrap();

        assert_eq!(curve.call_count(), calls * 2);
        assert_eq!(first.cache_stats().entries, second.cache_stats().entries);
    }

    #[tokio::test]
    async fn test_curve_name() {
        let market = market(Arc::new(MockCurve::identity()), Arc::new(MockLedger::new()));
        assert_eq!(market.curve_name().await.unwrap(), "Mock Curve 4");
    }

    #[tokio::test]
    async fn test_stats_read_from_stats_curve() {
        let ledger = Arc::new(MockLedger::new());
        let vaults = Arc::new(
            MockVault::new()
                .with_totals(EntityId(8), VaultTotals { total_assets: 9, total_shares: 6 })
                .with_position(EntityId(8), "0xabc", UserPosition { shares: 1, assets: 2 })
                .with_share_price(EntityId(8), 1_500),
        );
        let market = EntryMarket::new(
            MarketConfig::default(),
            Collaborators {
                valuation: Arc::new(MockCurve::identity()),
                ledger_reader: ledger.clone(),
                ledger_writer: ledger,
                vaults: vaults.clone(),
            },
        )
        .unwrap();

        let stats = market.stats(EntityId(8), "0xabc").await.unwrap();
        assert_eq!(stats.share_price, 1_500);
        assert_eq!(vaults.last_curve_id(), Some(3));
        assert_eq!(vaults.read_count(), 3);

        market.stats_on_curve(EntityId(8), 4, "0xabc").await.unwrap();
        assert_eq!(vaults.last_curve_id(), Some(4));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ledger = Arc::new(MockLedger::new());
        let mut config = MarketConfig::default();
        config.curve.segments = 0;

        let result = EntryMarket::new(
            config,
            Collaborators {
                valuation: Arc::new(MockCurve::identity()),
                ledger_reader: ledger.clone(),
                ledger_writer: ledger,
                vaults: Arc::new(MockVault::new()),
            },
        );
        assert!(result.is_err());
    }
}
