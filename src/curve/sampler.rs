//! Fixed-cardinality curve sampling
//!
//! A requested share range is snapped outward to the resolution grid, then
//! walked in equal steps that are themselves grid multiples. Every stop is
//! therefore a grid point, which keeps the price cache's key space small no
//! matter how finely callers vary their ranges.

use std::sync::Arc;
use tracing::debug;

use crate::cache::CurveSampleCache;
use crate::config::CurveConfig;
use crate::error::{MarketError, Result};
use crate::types::{CurveSample, SamplePoint, Shares};

/// Round down to a multiple of `resolution`
pub fn quantize_down(value: Shares, resolution: Shares) -> Shares {
    value / resolution * resolution
}

/// Round up to a multiple of `resolution`, `None` on overflow
pub fn quantize_up(value: Shares, resolution: Shares) -> Option<Shares> {
    value.div_ceil(resolution).checked_mul(resolution)
}

/// The grid walk for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePlan {
    pub start: Shares,
    pub end: Shares,
    pub step: Shares,
}

impl SamplePlan {
    /// Stops from `start` to `end` inclusive
    pub fn stops(&self) -> impl Iterator<Item = Shares> {
        let end = self.end;
        let step = self.step;
        std::iter::successors(Some(self.start), move |current| current.checked_add(step))
            .take_while(move |current| *current <= end)
    }
}

/// Produces chart samples for one curve through a shared price cache
pub struct CurveSampler {
    cache: Arc<CurveSampleCache>,
    resolution: Shares,
    segments: u32,
}

impl CurveSampler {
    pub fn new(cache: Arc<CurveSampleCache>, config: &CurveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache,
            resolution: Shares::from(config.resolution),
            segments: config.segments,
        })
    }

    /// Sampler with the default grid (1,000,000 shares, 16 segments)
    pub fn with_defaults(cache: Arc<CurveSampleCache>) -> Self {
        let config = CurveConfig::default();
        Self {
            cache,
            resolution: Shares::from(config.resolution),
            segments: config.segments,
        }
    }

    pub fn cache(&self) -> &Arc<CurveSampleCache> {
        &self.cache
    }

    pub fn resolution(&self) -> Shares {
        self.resolution
    }

    /// Work out the quantized bounds and step for `[start, end]`.
    ///
    /// The step is the span divided by the segment count, rounded up to the
    /// grid and never below one grid unit, so a plan has at most
    /// `segments + 1` stops.
    pub fn plan(&self, start: Shares, end: Shares) -> Result<SamplePlan> {
        if start > end {
            return Err(MarketError::InvalidRange { start, end });
        }

        let resolution = self.resolution;
        let quantized_start = quantize_down(start, resolution);
        let quantized_end =
            quantize_up(end, resolution).ok_or(MarketError::InvalidRange { start, end })?;

        let span = quantized_end - quantized_start;
        let raw_step = span.div_ceil(Shares::from(self.segments));
        let step = quantize_up(raw_step, resolution)
            .ok_or(MarketError::InvalidRange { start, end })?
            .max(resolution);

        Ok(SamplePlan {
            start: quantized_start,
            end: quantized_end,
            step,
        })
    }

    /// Sample the curve over `[start, end]` and price `special` exactly.
    ///
    /// Any remote failure fails the whole call; no partial sample is returned.
    pub async fn sample(&self, start: Shares, end: Shares, special: Shares) -> Result<CurveSample> {
        let plan = self.plan(start, end)?;
        debug!(
            start = plan.start,
            end = plan.end,
            step = plan.step,
            special,
            "Sampling curve"
        );

        let mut points = Vec::with_capacity(self.segments as usize + 1);
        for shares in plan.stops() {
            let price = self.cache.get_price(shares).await?;
            points.push(SamplePoint::new(shares, price));
        }

        let special_price = self.cache.get_price(special).await?;

        Ok(CurveSample {
            points,
            special_point: SamplePoint::new(special, special_price),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCurve;

    fn sampler() -> CurveSampler {
        let cache = Arc::new(CurveSampleCache::new(Arc::new(MockCurve::identity()), 4));
        CurveSampler::with_defaults(cache)
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize_down(2_500_000, 1_000_000), 2_000_000);
        assert_eq!(quantize_up(2_500_000, 1_000_000), Some(3_000_000));
        assert_eq!(quantize_up(3_000_000, 1_000_000), Some(3_000_000));
        assert_eq!(quantize_up(u128::MAX, 1_000_000), None);
    }

    #[test]
    fn test_plan_snaps_outward() {
        let plan = sampler().plan(1_500_000, 158_200_000).unwrap();
        assert_eq!(plan.start, 1_000_000);
        assert_eq!(plan.end, 159_000_000);
        assert_eq!(plan.step, 10_000_000);
        assert!(plan.stops().count() <= 17);
    }

    #[test]
    fn test_plan_empty_range_has_one_stop() {
        let plan = sampler().plan(3_000_000, 3_000_000).unwrap();
        assert_eq!(plan.step, 1_000_000);
        assert_eq!(plan.stops().collect::<Vec<_>>(), vec![3_000_000]);
    }

    #[test]
    fn test_plan_small_range_uses_one_unit_steps() {
        let plan = sampler().plan(0, 3_000_000).unwrap();
        assert_eq!(plan.step, 1_000_000);
        assert_eq!(plan.stops().count(), 4);
    }

    #[test]
    fn test_plan_rejects_reversed_range() {
        assert_eq!(
            sampler().plan(10, 5),
            Err(MarketError::InvalidRange { start: 10, end: 5 })
        );
    }

    #[test]
    fn test_plan_cardinality_with_odd_resolution() {
        let cache = Arc::new(CurveSampleCache::new(Arc::new(MockCurve::identity()), 4));
        let config = CurveConfig {
            resolution: 7,
            ..CurveConfig::default()
        };
        let sampler = CurveSampler::new(cache, &config).unwrap();

        for end in [7u128, 119, 126, 133, 1_000, 99_999] {
            let plan = sampler.plan(0, end).unwrap();
            assert!(plan.stops().count() <= 17, "end {} gave too many stops", end);
            assert_eq!(plan.step % 7, 0);
        }
    }

    #[tokio::test]
    async fn test_sample_prices_special_point_exactly() {
        let sample = sampler().sample(0, 16_000_000, 1_234_567).await.unwrap();
        assert_eq!(sample.points.len(), 17);
        assert_eq!(sample.special_point, SamplePoint::new(1_234_567, 1_234_567));
    }
}
