//! Memoized bonding curve prices
//!
//! Prices are keyed by the exact share quantity requested. An entry is never
//! evicted or refreshed: the price of a given quantity on a given curve does
//! not change, so the cache only grows for the life of the process.
//!
//! Misses go through a [`RequestCoalescer`], so concurrent first requests
//! for one quantity cost a single remote call.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::coalesce::RequestCoalescer;
use crate::error::Result;
use crate::traits::ValuationSource;
use crate::types::{Assets, CurveId, Shares};

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Price cache for one curve
pub struct CurveSampleCache {
    source: Arc<dyn ValuationSource>,
    curve_id: CurveId,
    points: DashMap<Shares, Assets>,
    in_flight: RequestCoalescer<Shares, Assets>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CurveSampleCache {
    /// Create a cache for `curve_id`, seeded with the zero point.
    pub fn new(source: Arc<dyn ValuationSource>, curve_id: CurveId) -> Self {
        let points = DashMap::new();
        points.insert(0, 0);

        Self {
            source,
            curve_id,
            points,
            in_flight: RequestCoalescer::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn curve_id(&self) -> CurveId {
        self.curve_id
    }

    /// Price of `shares`, from memory or from the valuation source.
    ///
    /// A remote failure is returned as-is and nothing is cached for it.
    pub async fn get_price(&self, shares: Shares) -> Result<Assets> {
        if let Some(price) = self.points.get(&shares) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(shares, price = *price, "Found cached curve point");
            return Ok(*price);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let price = self
            .in_flight
            .run(shares, move || async move {
                // A coalesced predecessor may have landed while we queued
                if let Some(price) = self.points.get(&shares) {
                    return Ok(*price);
                }
                let price = self
                    .source
                    .convert_to_assets(shares, shares, 0, self.curve_id)
                    .await?;
                self.points.insert(shares, price);
                debug!(shares, price, curve_id = self.curve_id, "Fetched curve point");
                Ok(price)
            })
            .await?;

        Ok(price)
    }

    /// Cached price, without touching the remote side
    pub fn peek(&self, shares: Shares) -> Option<Assets> {
        self.points.get(&shares).map(|price| *price)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn stats(&self) -> SampleCacheStats {
        SampleCacheStats {
            entries: self.points.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCurve;
    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_point_is_free() {
        let curve = Arc::new(MockCurve::identity());
        let cache = CurveSampleCache::new(curve.clone(), 4);

        assert_eq!(cache.get_price(0).await.unwrap(), 0);
        assert_eq!(curve.call_count(), 0);
    }

    #[tokio::test]
    async fn test_second_request_hits_memory() {
        let curve = Arc::new(MockCurve::new(|shares| shares * 3));
        let cache = CurveSampleCache::new(curve.clone(), 4);

        assert_eq!(cache.get_price(1_000_000).await.unwrap(), 3_000_000);
        assert_eq!(cache.get_price(1_000_000).await.unwrap(), 3_000_000);

        assert_eq!(curve.calls_for(1_000_000), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 2);
    }

    #[tokio::test]
    async fn test_source_sees_shares_as_total_shares() {
        let curve = Arc::new(MockCurve::identity());
        let cache = CurveSampleCache::new(curve.clone(), 9);

        cache.get_price(42).await.unwrap();
        assert_eq!(curve.last_request(), Some((42, 42, 0, 9)));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let curve = Arc::new(MockCurve::identity().with_available(false));
        let cache = CurveSampleCache::new(curve.clone(), 4);

        assert!(cache.get_price(5).await.is_err());
        assert_eq!(cache.peek(5), None);

        curve.set_available(true);
        assert_eq!(cache.get_price(5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_misses_cost_one_call() {
        let curve = Arc::new(MockCurve::identity().with_delay(Duration::from_millis(20)));
        let cache = CurveSampleCache::new(curve.clone(), 4);

        let (a, b, c) = tokio::join!(cache.get_price(7), cache.get_price(7), cache.get_price(7));
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (7, 7, 7));
        assert_eq!(curve.calls_for(7), 1);
    }
}
