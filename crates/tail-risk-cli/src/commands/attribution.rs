use clap::Args;
use serde_json::Value;

use tail_risk_core::attribution::historical::{attribution_report, rolling_attribution_report};

use super::DataArgs;

/// Arguments for full-sample historical ES attribution
#[derive(Args)]
pub struct AttributionArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

/// Arguments for rolling historical ES attribution
#[derive(Args)]
pub struct RollingAttributionArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

pub fn run_attribution(args: AttributionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns = args.data.load_returns()?;
    let weights = args.data.load_weights(&returns)?;
    let config = args.data.load_config()?;
    let result = attribution_report(&returns, &weights, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_rolling_attribution(
    args: RollingAttributionArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let returns = args.data.load_returns()?;
    let weights = args.data.load_weights(&returns)?;
    let config = args.data.load_config()?;
    let result = rolling_attribution_report(&returns, &weights, &config)?;
    Ok(serde_json::to_value(result)?)
}
