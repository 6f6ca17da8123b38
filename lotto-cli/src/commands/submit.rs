use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::{AgencyClient, AgencyId, Bet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct SubmitArgs {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Agency number
    #[arg(short, long)]
    agency: u32,

    /// JSON file with the agency's bets
    #[arg(short, long)]
    bets: PathBuf,

    /// Bets per batch
    #[arg(long, default_value = "100")]
    batch_size: usize,
}

/// One entry of a bets file. The agency comes from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetEntry {
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birthdate: String,
    pub number: u64,
}

impl BetEntry {
    fn into_bet(self, agency: AgencyId) -> Bet {
        Bet::new(
            agency.to_string(),
            self.first_name,
            self.last_name,
            self.document,
            self.birthdate,
            self.number,
        )
    }
}

fn load_bets(path: &Path, agency: AgencyId) -> Result<Vec<Bet>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bets file {}", path.display()))?;
    let entries: Vec<BetEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid bets file {}", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|entry| entry.into_bet(agency))
        .collect())
}

pub async fn handle_submit(args: SubmitArgs) -> Result<()> {
    let agency = AgencyId(args.agency);
    let bets = load_bets(&args.bets, agency)?;

    println!(
        "Submitting {} bets for agency {} to {}...",
        bets.len(),
        agency,
        args.server
    );

    let server = args.server.clone();
    let batch_size = args.batch_size;
    let (summary, winners) = tokio::task::spawn_blocking(move || -> lotto_core::Result<_> {
        let mut client = AgencyClient::connect(server.as_str(), agency)?;
        let summary = client.submit_all(&bets, batch_size)?;
        client.finish()?;

        tracing::info!("Agency {} finished, waiting for the draw", agency);
        let winners = client.receive_winners()?;
        Ok((summary, winners))
    })
    .await??;

    println!(
        "Sent {} batches ({} rejected), {} bets stored",
        summary.batches_sent, summary.batches_rejected, summary.bets_stored
    );

    if winners.is_empty() {
        println!("No winners for agency {}", agency);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["First name", "Last name", "Document", "Birthdate", "Number"]);

    for bet in &winners {
        table.add_row(vec![
            bet.first_name.clone(),
            bet.last_name.clone(),
            bet.document.clone(),
            bet.birthdate.clone(),
            bet.number.to_string(),
        ]);
    }

    println!("{} winners for agency {}:", winners.len(), agency);
    println!("{}", table);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bets_file_takes_agency_from_flag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"first_name":"Ana","last_name":"Gomez","document":"30904465","birthdate":"1999-03-17","number":7574}}]"#
        )
        .unwrap();

        let bets = load_bets(file.path(), AgencyId(3)).unwrap();
        assert_eq!(
            bets,
            vec![Bet::new("3", "Ana", "Gomez", "30904465", "1999-03-17", 7574)]
        );
    }

    #[test]
    fn test_invalid_bets_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_bets(file.path(), AgencyId(1)).is_err());
    }
}
