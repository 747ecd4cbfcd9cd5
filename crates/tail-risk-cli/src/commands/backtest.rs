use clap::Args;
use serde_json::Value;

use tail_risk_core::backtesting::backtest_report;
use tail_risk_core::portfolio::aggregate::portfolio_returns;

use super::DataArgs;
use crate::input;

/// Arguments for the VaR backtest
#[derive(Args)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Single-column CSV of realised portfolio returns, used instead of --returns
    #[arg(long, conflicts_with = "weights")]
    pub portfolio: Option<String>,
}

pub fn run_backtest(args: BacktestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.data.load_config()?;
    let series = match args.portfolio {
        Some(ref path) => input::file::single_series(input::file::read_returns_csv(path)?)?,
        None => {
            let returns = args.data.load_returns()?;
            let weights = args.data.load_weights(&returns)?;
            portfolio_returns(&returns, &weights)?
        }
    };
    let result = backtest_report(&series, &config)?;
    Ok(serde_json::to_value(result)?)
}
