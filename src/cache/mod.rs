//! Caching primitives
//!
//! Request coalescing plus the memoized curve price cache built on it.

mod coalesce;
mod sample_cache;

pub use coalesce::RequestCoalescer;
pub use sample_cache::{CurveSampleCache, SampleCacheStats};
