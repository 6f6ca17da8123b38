mod commands;
mod config;

use clap::{Parser, Subcommand};
use lotto_core::LotteryError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lotto")]
#[command(about = "Lottery aggregation server and agency client")]
#[command(version)]
struct Cli {
    /// Data directory for the bet database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the aggregation server
    Serve(commands::ServeArgs),

    /// Submit an agency's bets and wait for its winners
    Submit(commands::SubmitArgs),

    /// Inspect the bet database
    #[command(subcommand)]
    Bets(commands::BetsCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cli_config = config::CliConfig::new(cli.data_dir, cli.verbose);

    // Initialize logging
    let log_level = if cli_config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "lotto={},lotto_core={},lotto_server={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Ensure data directory exists
    tokio::fs::create_dir_all(&cli_config.data_dir).await?;

    let result = match cli.command {
        Commands::Serve(args) => commands::handle_serve(args, &cli_config).await,
        Commands::Submit(args) => commands::handle_submit(args).await,
        Commands::Bets(cmd) => commands::handle_bets_command(cmd, &cli_config).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<LotteryError>() {
            Some(LotteryError::Config(msg)) => {
                eprintln!("Error: Invalid configuration: {}", msg);
                eprintln!("Use 'lotto serve --help' to see available options");
            }
            Some(LotteryError::ConnectionClosed(msg)) => {
                eprintln!("Error: Connection to the server was lost: {}", msg);
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
