pub mod attribution;
pub mod backtest;
pub mod stress;
pub mod var_es;

use clap::Args;
use tracing::debug;

use tail_risk_core::{ReturnMatrix, RiskConfig, WeightVector};

use crate::input;

/// Inputs shared by every computation.
#[derive(Args)]
pub struct DataArgs {
    /// CSV of asset returns, first column ISO date (read from stdin when omitted)
    #[arg(long)]
    pub returns: Option<String>,

    /// JSON object of asset id to weight (default: equal weights)
    #[arg(long)]
    pub weights: Option<String>,

    /// Run configuration, JSON or YAML
    #[arg(long)]
    pub config: Option<String>,

    /// Confidence level, overrides the config file
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Rolling window length, overrides the config file
    #[arg(long)]
    pub window: Option<usize>,
}

impl DataArgs {
    pub fn load_returns(&self) -> Result<ReturnMatrix, Box<dyn std::error::Error>> {
        let matrix = if let Some(ref path) = self.returns {
            input::file::read_returns_csv(path)?
        } else if let Some(text) = input::stdin::read_stdin()? {
            input::file::parse_returns_csv(text.as_bytes(), "stdin")?
        } else {
            return Err("--returns <file.csv> or CSV on stdin required".into());
        };
        debug!(
            n_obs = matrix.n_obs(),
            n_assets = matrix.n_assets(),
            "loaded returns"
        );
        Ok(matrix)
    }

    pub fn load_weights(
        &self,
        returns: &ReturnMatrix,
    ) -> Result<WeightVector, Box<dyn std::error::Error>> {
        match self.weights {
            Some(ref path) => input::file::read_weights(path),
            None => Ok(WeightVector::equal(&returns.assets)),
        }
    }

    /// Config file (or defaults) with flag overrides applied, validated.
    pub fn load_config(&self) -> Result<RiskConfig, Box<dyn std::error::Error>> {
        let mut config = match self.config {
            Some(ref path) => input::file::read_config(path)?,
            None => RiskConfig::default(),
        };
        if let Some(alpha) = self.alpha {
            config.confidence_level = alpha;
        }
        if let Some(window) = self.window {
            config.window_length = window;
        }
        config.validate()?;
        Ok(config)
    }
}
