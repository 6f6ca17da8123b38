use crate::config::CliConfig;
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::{BetStore, SqliteBetStore};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum BetsCommands {
    /// List stored bets
    List {
        /// Only show bets of this agency
        #[arg(short, long)]
        agency: Option<u32>,
        /// Number of bets to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Database file, defaults to bets.db in the data directory
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Count stored bets per agency
    Count {
        /// Database file, defaults to bets.db in the data directory
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete every stored bet
    Clear {
        /// Database file, defaults to bets.db in the data directory
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

pub async fn handle_bets_command(cmd: BetsCommands, cli_config: &CliConfig) -> Result<()> {
    let open = |db: Option<PathBuf>| -> Result<SqliteBetStore> {
        let path = db.unwrap_or_else(|| cli_config.db_path());
        tracing::debug!("Opening bet store at {}", path.display());
        Ok(SqliteBetStore::open(&path)?)
    };

    match cmd {
        BetsCommands::List { agency, limit, db } => {
            let store = open(db)?;
            let agency = agency.map(|id| id.to_string());
            let bets: Vec<_> = store
                .list_bets()?
                .into_iter()
                .filter(|stored| agency.as_ref().map_or(true, |a| &stored.bet.agency == a))
                .collect();

            if bets.is_empty() {
                println!("No bets stored");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "ID", "Stored", "Agency", "First name", "Last name", "Document", "Birthdate",
                "Number",
            ]);

            for stored in bets.iter().take(limit) {
                table.add_row(vec![
                    stored.id.to_string(),
                    stored.stored_at.format("%Y-%m-%d %H:%M").to_string(),
                    stored.bet.agency.clone(),
                    stored.bet.first_name.clone(),
                    stored.bet.last_name.clone(),
                    stored.bet.document.clone(),
                    stored.bet.birthdate.clone(),
                    stored.bet.number.to_string(),
                ]);
            }

            println!("{}", table);

            if bets.len() > limit {
                println!(
                    "Showing {} of {} bets. Use --limit to see more.",
                    limit,
                    bets.len()
                );
            }
        }

        BetsCommands::Count { db } => {
            let store = open(db)?;
            let counts = store.count_by_agency()?;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Agency", "Bets"]);
            for (agency, count) in &counts {
                table.add_row(vec![agency.clone(), count.to_string()]);
            }

            println!("{}", table);
            println!("Total: {} bets", store.count_bets()?);
        }

        BetsCommands::Clear { db } => {
            let store = open(db)?;
            let removed = store.clear()?;
            println!("Removed {} bets", removed);
        }
    }

    Ok(())
}
