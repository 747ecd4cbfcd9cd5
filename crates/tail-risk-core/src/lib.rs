pub mod config;
pub mod error;
pub mod portfolio;
pub mod stats;
pub mod types;
pub mod window;

#[cfg(feature = "var_es")]
pub mod var_es;

#[cfg(feature = "attribution")]
pub mod attribution;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

#[cfg(feature = "backtesting")]
pub mod backtesting;

pub use config::RiskConfig;
pub use error::TailRiskError;
pub use types::*;

/// Standard result type for all tail-risk computations
pub type TailRiskResult<T> = Result<T, TailRiskError>;
