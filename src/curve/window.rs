//! Price curve charts for vaults
//!
//! Chooses the share window a vault's chart covers and turns a sample into
//! plottable points. The window starts at zero and runs to twice the vault's
//! current supply, but never shorter than the configured floor, so a young
//! vault still shows the shape of its curve.

use std::sync::Arc;
use tracing::info;

use super::sampler::CurveSampler;
use crate::error::Result;
use crate::traits::{ValuationSource, VaultReader};
use crate::types::{ChartPoint, CurveChart, CurveSample, EntityId, Shares};

/// Chart window `(start, end)` for a vault holding `total_shares`
pub fn chart_window(total_shares: Shares, floor: Shares) -> (Shares, Shares) {
    (0, total_shares.saturating_mul(2).max(floor))
}

/// Builds price-curve charts for vaults on one curve
pub struct PriceCurveService {
    sampler: Arc<CurveSampler>,
    vaults: Arc<dyn VaultReader>,
    chart_floor: Shares,
}

impl PriceCurveService {
    pub fn new(sampler: Arc<CurveSampler>, vaults: Arc<dyn VaultReader>, chart_floor: Shares) -> Self {
        Self {
            sampler,
            vaults,
            chart_floor,
        }
    }

    /// Look up and log the name of the sampled curve
    pub async fn announce(&self, source: &dyn ValuationSource) -> Result<String> {
        let curve_id = self.sampler.cache().curve_id();
        let name = source.curve_name(curve_id).await?;
        info!(curve_id, curve_name = %name, "Price curve service ready");
        Ok(name)
    }

    /// Sample the curve around a vault's current supply.
    ///
    /// `total_shares` overrides the supply read from the vault when given.
    pub async fn sample_vault(
        &self,
        term_id: EntityId,
        total_shares: Option<Shares>,
    ) -> Result<(CurveSample, Shares)> {
        let total_shares = match total_shares {
            Some(total) => total,
            None => self.vaults.vault_totals(term_id).await?.total_shares,
        };

        let (start, end) = chart_window(total_shares, self.chart_floor);
        let sample = self.sampler.sample(start, end, total_shares).await?;
        Ok((sample, total_shares))
    }

    /// Chart-ready curve for a vault.
    ///
    /// The window end is twice the supply, which must stay quantizable: a
    /// supply above roughly `u128::MAX / 2` fails with
    /// [`MarketError::InvalidRange`](crate::error::MarketError::InvalidRange).
    pub async fn chart(&self, term_id: EntityId, total_shares: Option<Shares>) -> Result<CurveChart> {
        let (sample, total_shares) = self.sample_vault(term_id, total_shares).await?;

        Ok(CurveChart {
            points: sample.points.into_iter().map(ChartPoint::from).collect(),
            special_point: ChartPoint::from(sample.special_point),
            total_shares: total_shares.to_string(),
        })
    }
}
