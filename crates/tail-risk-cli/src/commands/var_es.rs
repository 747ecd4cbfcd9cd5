use clap::{Args, ValueEnum};
use serde_json::Value;

use tail_risk_core::portfolio::aggregate::portfolio_returns;
use tail_risk_core::var_es::report::var_report;
use tail_risk_core::var_es::rolling::{rolling_report, rolling_var_es};
use tail_risk_core::var_es::VarModel;

use super::DataArgs;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelArg {
    Gaussian,
    Historical,
    StudentT,
}

impl From<ModelArg> for VarModel {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Gaussian => VarModel::Gaussian,
            ModelArg::Historical => VarModel::Historical,
            ModelArg::StudentT => VarModel::StudentT,
        }
    }
}

/// Arguments for the single-window VaR/ES report
#[derive(Args)]
pub struct VarReportArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Comma-separated confidence levels, overrides report_alphas
    #[arg(long, value_delimiter = ',')]
    pub alphas: Option<Vec<f64>>,
}

/// Arguments for rolling VaR/ES
#[derive(Args)]
pub struct RollingArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Single model to roll (default: joined report of all three)
    #[arg(long)]
    pub model: Option<ModelArg>,
}

pub fn run_var_report(args: VarReportArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns = args.data.load_returns()?;
    let weights = args.data.load_weights(&returns)?;
    let mut config = args.data.load_config()?;
    if let Some(alphas) = args.alphas {
        config.report_alphas = alphas;
        config.validate()?;
    }
    let result = var_report(&returns, &weights, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_rolling(args: RollingArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns = args.data.load_returns()?;
    let weights = args.data.load_weights(&returns)?;
    let config = args.data.load_config()?;
    let series = portfolio_returns(&returns, &weights)?;
    match args.model {
        Some(model) => {
            let result = rolling_var_es(&series, model.into(), &config)?;
            Ok(serde_json::to_value(result)?)
        }
        None => {
            let result = rolling_report(&series, &config)?;
            Ok(serde_json::to_value(result)?)
        }
    }
}
