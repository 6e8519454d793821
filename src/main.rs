use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundme::cli::setup::setup;
use fundme::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Network to use instead of the configured default
    #[arg(short, long, global = true)]
    network: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fundme::AppCommand {
    fn from(cmd: Commands) -> fundme::AppCommand {
        match cmd {
            Commands::Accounts => fundme::AppCommand::Accounts,
            Commands::Deploy { tags, reset } => fundme::AppCommand::Deploy { tags, reset },
            Commands::Fund { amount, from } => fundme::AppCommand::Fund { from, amount },
            Commands::Withdraw { from } => fundme::AppCommand::Withdraw { from },
            Commands::Balance { account } => fundme::AppCommand::Balance { account },
            Commands::Funders => fundme::AppCommand::Funders,
            Commands::Price => fundme::AppCommand::Price,
            Commands::SetPrice { answer } => fundme::AppCommand::SetPrice { answer },
            Commands::Info => fundme::AppCommand::Info,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List local accounts and their balances
    Accounts,
    /// Run deploy scripts
    Deploy {
        /// Only run scripts with one of these tags
        #[arg(short, long, value_delimiter = ',', default_value = "all")]
        tags: Vec<String>,
        /// Discard saved chain state first
        #[arg(long)]
        reset: bool,
    },
    /// Contribute to the FundMe contract
    Fund {
        /// Amount in ETH, e.g. 0.1
        amount: String,
        /// Account index, named account or address
        #[arg(short, long, default_value = "deployer")]
        from: String,
    },
    /// Withdraw all funds to the owner
    Withdraw {
        #[arg(short, long, default_value = "deployer")]
        from: String,
    },
    /// Show amounts funded per account
    Balance {
        /// Account index, named account or address
        account: Option<String>,
    },
    /// List funders
    Funders,
    /// Show the current ETH/USD price
    Price,
    /// Update the mock price feed answer
    SetPrice {
        /// New answer in the feed's decimals, e.g. 300000000000
        #[arg(allow_negative_numbers = true)]
        answer: i128,
    },
    /// Show the FundMe contract state
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => {
            fundme::run_command(
                cmd.into(),
                cli.config_path.as_deref(),
                cli.network.as_deref(),
            )
            .await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Application failed");
    }
    result
}
