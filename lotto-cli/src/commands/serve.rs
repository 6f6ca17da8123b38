use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use lotto_core::{BetStore, SqliteBetStore};
use lotto_server::{LotteryServer, ServerConfig, WinningNumber};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpSocket;

#[derive(Args)]
pub struct ServeArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of agencies that must finish before the draw
    #[arg(short, long)]
    agencies: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    backlog: Option<u32>,

    /// Winning number for the draw
    #[arg(long)]
    winning_number: Option<u64>,

    /// Rounds to run, 0 to keep serving until interrupted
    #[arg(long)]
    rounds: Option<u32>,

    /// Abandon a round when agencies have not finished after this many seconds
    #[arg(long)]
    round_timeout_secs: Option<f64>,
}

impl ServeArgs {
    fn into_config(self, cli_config: &CliConfig) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig {
                db_path: cli_config.db_path(),
                ..ServerConfig::default()
            },
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(agencies) = self.agencies {
            config.expected_agencies = agencies;
        }
        if let Some(backlog) = self.backlog {
            config.listen_backlog = backlog;
        }
        if let Some(number) = self.winning_number {
            config.winning_number = number;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(secs) = self.round_timeout_secs {
            config.round_timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn handle_serve(args: ServeArgs, cli_config: &CliConfig) -> Result<()> {
    let config = args.into_config(cli_config)?;

    let store: Arc<dyn BetStore> = Arc::new(
        SqliteBetStore::open(&config.db_path)
            .with_context(|| format!("Failed to open bet store {}", config.db_path.display()))?,
    );

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket
        .bind(addr)
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let listener = socket.listen(config.listen_backlog)?.into_std()?;

    println!(
        "Serving {} agencies on {} (winning number {})",
        config.expected_agencies, addr, config.winning_number
    );

    let rule = Arc::new(WinningNumber(config.winning_number));
    let server = LotteryServer::new(listener, config, store, rule)?;
    let shutdown = server.shutdown_handle();

    let mut running = tokio::task::spawn_blocking(move || server.run());

    let reports = tokio::select! {
        joined = &mut running => joined??,
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down...");
            shutdown.shutdown();
            running.await??
        }
    };

    for report in &reports {
        println!(
            "Round {}: {} bets, {} winners, {} packages sent, {} failed",
            report.round,
            report.bets_loaded,
            report.winners,
            report.packages_sent,
            report.delivery_failures
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn args() -> ServeArgs {
        ServeArgs {
            config: None,
            port: None,
            agencies: None,
            backlog: None,
            winning_number: None,
            rounds: None,
            round_timeout_secs: None,
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli_config = CliConfig::new(Some(PathBuf::from("/tmp/lotto-test")), false);
        let config = ServeArgs {
            port: Some(9000),
            agencies: Some(2),
            round_timeout_secs: Some(30.0),
            ..args()
        }
        .into_config(&cli_config)
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.expected_agencies, 2);
        assert_eq!(config.round_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.winning_number, 7574);
        assert_eq!(config.db_path, PathBuf::from("/tmp/lotto-test/bets.db"));
    }

    #[test]
    fn test_zero_agencies_rejected() {
        let cli_config = CliConfig::default();
        let result = ServeArgs {
            agencies: Some(0),
            ..args()
        }
        .into_config(&cli_config);
        assert!(result.is_err());
    }
}
