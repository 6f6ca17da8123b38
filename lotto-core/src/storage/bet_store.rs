use crate::error::{LotteryError, Result};
use crate::storage::{BetStore, Storage};
use crate::types::Bet;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBet {
    pub id: i64,
    pub bet: Bet,
    pub stored_at: DateTime<Utc>,
}

pub struct SqliteBetStore {
    storage: Storage,
}

impl SqliteBetStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            storage: Storage::new(db_path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            storage: Storage::in_memory()?,
        })
    }

    /// All stored bets with their row metadata, oldest first.
    pub fn list_bets(&self) -> Result<Vec<StoredBet>> {
        let conn = self.storage.get_connection();

        let mut stmt = conn.prepare(
            "SELECT id, agency, first_name, last_name, document, birthdate, number, stored_at
             FROM bets ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredBet {
                id: row.get(0)?,
                bet: bet_from_row(row, 1)?,
                stored_at: DateTime::from_timestamp(row.get(7)?, 0).unwrap_or_else(Utc::now),
            })
        })?;

        let mut bets = Vec::new();
        for bet in rows {
            bets.push(bet?);
        }

        Ok(bets)
    }

    /// Delete every stored bet. Returns how many were removed.
    pub fn clear(&self) -> Result<u64> {
        let conn = self.storage.get_connection();
        let removed = conn.execute("DELETE FROM bets", [])?;
        tracing::info!("Cleared {} stored bets", removed);
        Ok(removed as u64)
    }

    /// Number of stored bets per agency, ordered by agency.
    pub fn count_by_agency(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.storage.get_connection();

        let mut stmt =
            conn.prepare("SELECT agency, COUNT(*) FROM bets GROUP BY agency ORDER BY agency")?;
        let rows = stmt.query_map([], |row| {
            let agency: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((agency, count as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }

        Ok(counts)
    }
}

fn bet_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Bet> {
    let number: i64 = row.get(offset + 5)?;
    Ok(Bet {
        agency: row.get(offset)?,
        first_name: row.get(offset + 1)?,
        last_name: row.get(offset + 2)?,
        document: row.get(offset + 3)?,
        birthdate: row.get(offset + 4)?,
        number: number as u64,
    })
}

impl BetStore for SqliteBetStore {
    fn store_bets(&self, bets: &[Bet]) -> Result<()> {
        let mut conn = self.storage.get_connection();
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO bets (agency, first_name, last_name, document, birthdate, number, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for bet in bets {
                // SQLite integers are signed
                let number = i64::try_from(bet.number).map_err(|_| {
                    LotteryError::persistence(format!(
                        "bet number {} does not fit a signed 64-bit column",
                        bet.number
                    ))
                })?;

                stmt.execute(params![
                    bet.agency,
                    bet.first_name,
                    bet.last_name,
                    bet.document,
                    bet.birthdate,
                    number,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Stored {} bets", bets.len());
        Ok(())
    }

    fn load_bets(&self) -> Result<Vec<Bet>> {
        let conn = self.storage.get_connection();

        let mut stmt = conn.prepare(
            "SELECT agency, first_name, last_name, document, birthdate, number
             FROM bets ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| bet_from_row(row, 0))?;

        let mut bets = Vec::new();
        for bet in rows {
            bets.push(bet?);
        }

        Ok(bets)
    }

    fn count_bets(&self) -> Result<u64> {
        let conn = self.storage.get_connection();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM bets", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
