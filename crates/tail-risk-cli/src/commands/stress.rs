use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use tail_risk_core::monte_carlo::stress::{mc_attribution_report, mc_stress_summary};
use tail_risk_core::portfolio::stress::stress_replay;
use tail_risk_core::RiskConfig;

use super::DataArgs;

/// Arguments for the historical stress replay
#[derive(Args)]
pub struct StressArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// First day of the stress window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day of the stress window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub end: NaiveDate,
}

/// Arguments for Monte Carlo stress runs
#[derive(Args)]
pub struct McArgs {
    #[command(flatten)]
    pub stress: StressArgs,

    /// Horizon in periods
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Number of scenarios
    #[arg(long)]
    pub sims: Option<usize>,

    /// Generator seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Degrees of freedom of the Student-t generator
    #[arg(long)]
    pub df: Option<f64>,
}

impl McArgs {
    fn config(&self) -> Result<RiskConfig, Box<dyn std::error::Error>> {
        let mut config = self.stress.data.load_config()?;
        if let Some(h) = self.horizon {
            config.horizon = h;
        }
        if let Some(n) = self.sims {
            config.scenario_count = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(df) = self.df {
            config.student_t_df = df;
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn run_stress_replay(args: StressArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns = args.data.load_returns()?;
    let weights = args.data.load_weights(&returns)?;
    let config = args.data.load_config()?;
    let result = stress_replay(&returns, &weights, args.start, args.end, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_mc_stress(args: McArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.config()?;
    let data = &args.stress.data;
    let returns = data.load_returns()?;
    let weights = data.load_weights(&returns)?;
    let result = mc_stress_summary(
        &returns,
        &weights,
        args.stress.start,
        args.stress.end,
        &config,
    )?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_mc_attribution(args: McArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.config()?;
    let data = &args.stress.data;
    let returns = data.load_returns()?;
    let weights = data.load_weights(&returns)?;
    let result = mc_attribution_report(
        &returns,
        &weights,
        args.stress.start,
        args.stress.end,
        &config,
    )?;
    Ok(serde_json::to_value(result)?)
}
