//! Entry Market - bonding curve sampling and canonical entity resolution
//!
//! Core of the entry market front end. Two concerns live here:
//!
//! - **Curve sampling**: a bounded, grid-aligned set of `(shares, price)`
//!   points for any share range, served from a memoized price cache so the
//!   remote curve registry is asked about each grid point once.
//! - **Entity resolution**: find-or-create of ledger entities, plus the
//!   well-known classification tags attached to entries and sub-entries.
//!
//! Transport (contract calls, indexer queries, signing) stays outside the
//! crate behind the traits in [`traits`].
//!
//! # Example
//!
//! ```rust,ignore
//! use entry_market::{Collaborators, EntryMarket, MarketConfig};
//!
//! let market = EntryMarket::new(MarketConfig::load("market.toml")?, collaborators)?;
//!
//! // 17 points across the range, plus the exact price at 50M shares
//! let sample = market.sample(0, 160_000_000, 50_000_000).await?;
//!
//! // Classify new content
//! let entry = market.create_entity(&definition).await?;
//! market.tag_as_app_content(entry).await?;
//! market.tag_as_entry(entry).await?;
//! ```

// Collaborator seams
pub mod traits;

// Caching primitives
pub mod cache;

// Curve sampling and charts
pub mod curve;

// Entity resolution and tagging
pub mod registry;

// Vault reads
pub mod vault;

// Service object
pub mod market;

// Shared types
pub mod types;

// Configuration
pub mod config;

// Error types
pub mod error;

// Test collaborators
pub mod mock;

pub use traits::{LedgerReader, LedgerWriter, ValuationSource, VaultReader};

pub use cache::{CurveSampleCache, RequestCoalescer, SampleCacheStats};

pub use curve::{chart_window, quantize_down, quantize_up, CurveSampler, PriceCurveService, SamplePlan};

pub use registry::{AppTagIds, EntityRegistry, TagDefinitions, TagReconciler, TypeTagIds};

pub use vault::VaultService;

pub use market::{Collaborators, EntryMarket};

pub use types::{
    Assets, ChartPoint, CurveChart, CurveId, CurveSample, EntityDefinition, EntityId, SamplePoint,
    Shares, Triple, UserPosition, VaultStats, VaultTotals,
};

pub use config::{AppIdentity, CurveConfig, MarketConfig};

pub use error::{MarketError, Result};
