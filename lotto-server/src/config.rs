use lotto_core::{LotteryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub listen_backlog: u32,
    pub expected_agencies: usize,
    pub max_batch_bytes: u64,
    /// Give up on a round when not every agency finished within this many
    /// seconds.
    pub round_timeout_secs: Option<f64>,
    /// Rounds to run before stopping; `0` runs until shutdown.
    pub rounds: u32,
    pub winning_number: u64,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 12345,
            listen_backlog: 5,
            expected_agencies: 5,
            max_batch_bytes: 8 * 1024 * 1024, // 8 MiB
            round_timeout_secs: None,
            rounds: 1,
            winning_number: 7574,
            db_path: PathBuf::from("bets.db"),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LotteryError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.expected_agencies == 0 {
            return Err(LotteryError::config(
                "Expected agency count must be greater than 0",
            ));
        }

        if self.listen_backlog == 0 {
            return Err(LotteryError::config("Listen backlog must be greater than 0"));
        }

        if self.max_batch_bytes == 0 {
            return Err(LotteryError::config(
                "Max batch size must be greater than 0",
            ));
        }

        if let Some(secs) = self.round_timeout_secs {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(LotteryError::config(format!(
                    "Round timeout must be a positive number of seconds, got {}",
                    secs
                )));
            }
        }

        Ok(())
    }
}
