//! Market configuration
//!
//! Loaded from TOML, with environment variables (and a `.env` file, if
//! present) layered on top:
//!
//! ```toml
//! [app]
//! name = "Information Test Markets"
//! description = "Markets for information"
//!
//! [curve]
//! curve_id = 4
//! stats_curve_id = 3
//! resolution = 1000000
//! ```
//!
//! Numbers here are `u64` (TOML integers are signed 64-bit) and are widened
//! to ledger quantities where the sampler and caches are built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{MarketError, Result};
use crate::types::EntityDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MarketConfig {
    #[serde(default)]
    pub app: AppIdentity,
    #[serde(default)]
    pub curve: CurveConfig,
}

/// The running application's self-describing entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Logo URL
    #[serde(default)]
    pub image: String,
    /// Application URL
    #[serde(default)]
    pub url: String,
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            name: "Information Test Markets".to_string(),
            description: "An Information Test Markets application".to_string(),
            image: String::new(),
            url: String::new(),
        }
    }
}

impl AppIdentity {
    pub fn to_definition(&self) -> EntityDefinition {
        EntityDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            url: self.url.clone(),
        }
    }
}

/// Bonding curve sampling parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveConfig {
    /// Curve sampled for price charts
    #[serde(default = "default_curve_id")]
    pub curve_id: u64,

    /// Curve whose vault backs the stats view
    #[serde(default = "default_stats_curve_id")]
    pub stats_curve_id: u64,

    /// Sample grid, in shares
    #[serde(default = "default_resolution")]
    pub resolution: u64,

    /// Steps per sample (a sample has at most `segments + 1` points)
    #[serde(default = "default_segments")]
    pub segments: u32,

    /// Shortest chart window, in shares
    #[serde(default = "default_chart_floor")]
    pub chart_floor: u64,
}

// Defaults
fn default_curve_id() -> u64 { 4 }
fn default_stats_curve_id() -> u64 { 3 }
fn default_resolution() -> u64 { 1_000_000 }
fn default_segments() -> u32 { 16 }
fn default_chart_floor() -> u64 { 100_000_000_000_000_000 } // 1e17

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            curve_id: default_curve_id(),
            stats_curve_id: default_stats_curve_id(),
            resolution: default_resolution(),
            segments: default_segments(),
            chart_floor: default_chart_floor(),
        }
    }
}

impl CurveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(MarketError::Config("curve.resolution must be positive".into()));
        }
        if self.segments == 0 {
            return Err(MarketError::Config("curve.segments must be positive".into()));
        }
        Ok(())
    }
}

impl MarketConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MarketConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read_file(path.as_ref())?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only; a missing file gives the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        if path.exists() {
            info!(path = %path.display(), "Loading market config");
            Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Ok(MarketConfig::default())
        }
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = MarketConfig::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `APP_*`, `BONDING_CURVE_ID`, `STATS_CURVE_ID` and `CURVE_RESOLUTION`
    pub fn apply_env(&mut self) -> Result<()> {
        // Load environment variables from .env file if present
        let _ = dotenvy::dotenv();
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(name) = lookup("APP_NAME") {
            self.app.name = name;
        }
        if let Some(description) = lookup("APP_DESCRIPTION") {
            self.app.description = description;
        }
        if let Some(image) = lookup("APP_IMAGE") {
            self.app.image = image;
        }
        if let Some(url) = lookup("APP_URL") {
            self.app.url = url;
        }
        if let Some(val) = lookup("BONDING_CURVE_ID") {
            self.curve.curve_id = parse_number("BONDING_CURVE_ID", &val)?;
        }
        if let Some(val) = lookup("STATS_CURVE_ID") {
            self.curve.stats_curve_id = parse_number("STATS_CURVE_ID", &val)?;
        }
        if let Some(val) = lookup("CURVE_RESOLUTION") {
            self.curve.resolution = parse_number("CURVE_RESOLUTION", &val)?;
        }

        debug!(app = %self.app.name, curve_id = self.curve.curve_id, "Environment applied");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            return Err(MarketError::Config("app.name must not be empty".into()));
        }
        self.curve.validate()
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| MarketError::Config(format!("{} is not a number ({}): {}", key, value, e)))
}
