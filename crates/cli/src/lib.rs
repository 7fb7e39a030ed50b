use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "periscope")]
#[command(about = "Periscope - options chain snapshots, enrichment and strike ladders")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./periscope.yaml, then the environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override logging.format
    #[arg(long, global = true, value_parser = ["pretty", "json", "compact"])]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the options chain HTTP API
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.http_port
        #[arg(long)]
        http: Option<u16>,

        /// Override server.metrics_port
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Fetch a chain and print the strike ladder for one expiration
    Chain {
        /// Underlying symbol, e.g. SPY
        symbol: String,

        /// Expiration date (YYYY-MM-DD); the nearest listed one when omitted
        #[arg(short, long)]
        expiration: Option<String>,

        /// Only fetch one side of the chain
        #[arg(long, value_enum)]
        contract_type: Option<ContractKind>,

        /// Only fetch this strike
        #[arg(long)]
        strike: Option<f64>,

        /// Enrich the N contracts nearest the money with detail snapshots
        #[arg(short, long)]
        details: Option<usize>,

        /// Print the ladder as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Fetch detail snapshots for specific contracts
    Details {
        /// Contract tickers, e.g. O:SPY250117C00500000
        #[arg(required = true, num_args = 1..)]
        tickers: Vec<String>,
    },

    /// Validate configuration without contacting the provider
    Validate,

    /// Write a configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "periscope.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    Call,
    Put,
}

impl ContractKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Call => "call",
            ContractKind::Put => "put",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_arguments() {
        let cli = Cli::try_parse_from([
            "periscope",
            "chain",
            "SPY",
            "--expiration",
            "2025-01-17",
            "--contract-type",
            "put",
            "-d",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::Chain {
                symbol,
                expiration,
                contract_type,
                details,
                json,
                ..
            } => {
                assert_eq!(symbol, "SPY");
                assert_eq!(expiration.as_deref(), Some("2025-01-17"));
                assert_eq!(contract_type, Some(ContractKind::Put));
                assert_eq!(details, Some(10));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["periscope", "validate", "-c", "custom.yaml", "--log-format", "json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
        assert_eq!(cli.log_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_details_requires_tickers() {
        assert!(Cli::try_parse_from(["periscope", "details"]).is_err());
        assert!(Cli::try_parse_from(["periscope", "serve", "--log-format", "xml"]).is_err());
    }
}
