use std::io::Read;

use clap::{Parser, Subcommand};
use risk_analytics::config::Config;
use risk_analytics::fundamentals::FundamentalsProvider;
use risk_analytics::iss::{HttpIssTransport, IssClient};
use risk_analytics::logging::{init_logging, LoggingConfig};
use risk_analytics::tools::{cfo_liquidity, correlation_matrix, peers_compare, portfolio_risk, rebalance};

/// Command-line front-end over the five risk-analytics tools. Reads a JSON request
/// from `--input` (or stdin when absent) and prints the tool's output envelope.
#[derive(Debug, Parser)]
#[command(name = "risk-analytics", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a JSON request file. Reads stdin when omitted.
    #[arg(long, global = true)]
    input: Option<std::path::PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// compute_portfolio_risk_basic
    PortfolioRisk,
    /// compute_correlation_matrix
    CorrelationMatrix,
    /// build_cfo_liquidity_report
    CfoLiquidity,
    /// issuer_peers_compare
    PeersCompare,
    /// suggest_rebalance
    Rebalance,
}

fn read_request(path: &Option<std::path::PathBuf>) -> Result<String, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_logging(LoggingConfig::from_env())?;

    let cli = Cli::parse();
    let config = Config::from_env();
    if let Err(message) = config.validate() {
        return Err(message.into());
    }

    let body = read_request(&cli.input)?;

    let transport = HttpIssTransport::new(&config.moex_iss_base_url, std::time::Duration::from_secs(config.moex_iss_timeout_seconds))?;
    let client = IssClient::new(Box::new(transport), &config);

    let output = match cli.command {
        Command::PortfolioRisk => {
            let request: portfolio_risk::PortfolioRiskRequest = serde_json::from_str(&body)?;
            serde_json::to_string_pretty(&portfolio_risk::compute_portfolio_risk_basic(&client, &config, request).await)?
        }
        Command::CorrelationMatrix => {
            let request: correlation_matrix::CorrelationMatrixRequest = serde_json::from_str(&body)?;
            serde_json::to_string_pretty(&correlation_matrix::compute_correlation_matrix(&client, &config, request).await)?
        }
        Command::CfoLiquidity => {
            let request: cfo_liquidity::CfoLiquidityRequest = serde_json::from_str(&body)?;
            serde_json::to_string_pretty(&cfo_liquidity::build_cfo_liquidity_report(&client, &config, request).await)?
        }
        Command::PeersCompare => {
            let request: peers_compare::PeersCompareRequest = serde_json::from_str(&body)?;
            let fundamentals = FundamentalsProvider::new(config.risk_fundamentals_cache_ttl_seconds);
            serde_json::to_string_pretty(
                &peers_compare::issuer_peers_compare(&client, &config, &fundamentals, request).await,
            )?
        }
        Command::Rebalance => {
            let request: rebalance::SuggestRebalanceRequest = serde_json::from_str(&body)?;
            serde_json::to_string_pretty(&rebalance::suggest_rebalance(request))?
        }
    };

    println!("{output}");
    Ok(())
}
