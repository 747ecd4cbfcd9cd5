mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::attribution::{AttributionArgs, RollingAttributionArgs};
use commands::backtest::BacktestArgs;
use commands::stress::{McArgs, StressArgs};
use commands::var_es::{RollingArgs, VarReportArgs};

/// Portfolio tail-risk reporting
#[derive(Parser)]
#[command(
    name = "tailrisk",
    version,
    about = "Portfolio VaR/ES, ES attribution, Monte Carlo stress and VaR backtesting",
    long_about = "Computes Value-at-Risk and Expected Shortfall of a weighted portfolio \
                  under Gaussian, historical and Student-t models, attributes ES to assets, \
                  runs Monte Carlo stress scenarios and backtests rolling VaR forecasts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Single-window VaR/ES at each report confidence level
    VarReport(VarReportArgs),
    /// Rolling VaR/ES under every model, or one with --model
    Rolling(RollingArgs),
    /// Historical ES attribution over the whole sample
    Attribution(AttributionArgs),
    /// Historical ES attribution over rolling windows
    RollingAttribution(RollingAttributionArgs),
    /// Full-sample versus stress-window risk, attribution and equity curve
    StressReplay(StressArgs),
    /// Monte Carlo horizon VaR/ES calibrated on a stress window
    McStress(McArgs),
    /// Monte Carlo ES attribution calibrated on a stress window
    McAttribution(McArgs),
    /// Kupiec and Christoffersen tests of rolling VaR
    Backtest(BacktestArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::VarReport(args) => commands::var_es::run_var_report(args),
        Commands::Rolling(args) => commands::var_es::run_rolling(args),
        Commands::Attribution(args) => commands::attribution::run_attribution(args),
        Commands::RollingAttribution(args) => {
            commands::attribution::run_rolling_attribution(args)
        }
        Commands::StressReplay(args) => commands::stress::run_stress_replay(args),
        Commands::McStress(args) => commands::stress::run_mc_stress(args),
        Commands::McAttribution(args) => commands::stress::run_mc_attribution(args),
        Commands::Backtest(args) => commands::backtest::run_backtest(args),
        Commands::Version => {
            println!("tailrisk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
