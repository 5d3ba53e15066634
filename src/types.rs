//! Shared value types
//!
//! Quantities on the ledger are unsigned integers. They are carried as
//! `u128`; anything wider is rejected by the collaborator that reads it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A quantity of vault shares
pub type Shares = u128;

/// A quantity of vault assets (prices are expressed in assets)
pub type Assets = u128;

/// Bonding curve identifier in the curve registry
pub type CurveId = u128;

// =============================================================================
// Curve sampling
// =============================================================================

/// One point on a bonding curve.
///
/// The price is a pure function of `(shares, curve)`, so a point never goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplePoint {
    pub shares: Shares,
    pub price: Assets,
}

impl SamplePoint {
    pub fn new(shares: Shares, price: Assets) -> Self {
        Self { shares, price }
    }
}

/// Output of a sampling run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveSample {
    /// Strictly ascending in `shares`, at most `segments + 1` entries
    pub points: Vec<SamplePoint>,
    /// The unquantized point of interest
    pub special_point: SamplePoint,
}

// =============================================================================
// Ledger entities
// =============================================================================

/// Canonical identifier assigned by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u128);

impl EntityId {
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl From<u128> for EntityId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four attributes that define an entity.
///
/// Two definitions name the same entity only if every field matches byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EntityDefinition {
    pub name: String,
    pub description: String,
    pub image: String,
    pub url: String,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// A `(subject, predicate, object)` fact on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triple {
    pub subject_id: EntityId,
    pub predicate_id: EntityId,
    pub object_id: EntityId,
}

impl Triple {
    pub fn new(subject_id: EntityId, predicate_id: EntityId, object_id: EntityId) -> Self {
        Self {
            subject_id,
            predicate_id,
            object_id,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.subject_id, self.predicate_id, self.object_id
        )
    }
}

// =============================================================================
// Vaults
// =============================================================================

/// Totals held by a vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTotals {
    pub total_assets: Assets,
    pub total_shares: Shares,
}

/// One account's holding in a vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserPosition {
    pub shares: Shares,
    pub assets: Assets,
}

/// Everything the stats view needs for one vault and account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStats {
    pub user_position: UserPosition,
    pub vault_totals: VaultTotals,
    pub share_price: Assets,
}

// =============================================================================
// Chart output
// =============================================================================

/// A plottable point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

impl From<SamplePoint> for ChartPoint {
    fn from(point: SamplePoint) -> Self {
        Self {
            x: point.shares as f64,
            y: point.price as f64,
        }
    }
}

/// Price curve ready for the chart component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveChart {
    pub points: Vec<ChartPoint>,
    pub special_point: ChartPoint,
    /// Decimal string, too wide for a JSON number
    pub total_shares: String,
}
