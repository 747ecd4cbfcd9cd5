//! Expected Shortfall attribution.
//!
//! Portfolio ES is split into per-asset contributions conditioned on the
//! portfolio tail event. Weights are applied exactly as supplied: unlike the
//! return aggregator there is no renormalisation, so the component sum equals
//! the ES of the portfolio built with these same weights.

pub mod historical;
#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use historical::{es_attribution, rolling_es_attribution};
#[cfg(feature = "monte_carlo")]
pub use monte_carlo::mc_es_attribution;
