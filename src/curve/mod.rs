//! Bonding curve sampling
//!
//! - [`CurveSampler`]: bounded, grid-aligned samples of an arbitrary range
//! - [`PriceCurveService`]: picks a vault's chart window and formats the result

mod sampler;
mod window;

pub use sampler::{quantize_down, quantize_up, CurveSampler, SamplePlan};
pub use window::{chart_window, PriceCurveService};
