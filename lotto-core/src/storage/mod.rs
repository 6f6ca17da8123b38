pub mod bet_store;
pub mod memory;

pub use bet_store::{SqliteBetStore, StoredBet};
pub use memory::MemoryBetStore;

use crate::error::{LotteryError, Result};
use crate::types::Bet;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;

/// Durable record of every bet received during a round.
///
/// `store_bets` is all-or-nothing: either every bet of the slice is persisted
/// or none is. `load_bets` returns bets in the order they were stored.
pub trait BetStore: Send + Sync {
    fn store_bets(&self, bets: &[Bet]) -> Result<()>;

    fn load_bets(&self) -> Result<Vec<Bet>>;

    fn count_bets(&self) -> Result<u64> {
        Ok(self.load_bets()?.len() as u64)
    }
}

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LotteryError::internal(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agency TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                document TEXT NOT NULL,
                birthdate TEXT NOT NULL,
                number INTEGER NOT NULL,
                stored_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_agency ON bets (agency)",
            [],
        )?;

        Ok(())
    }

    pub fn get_connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
