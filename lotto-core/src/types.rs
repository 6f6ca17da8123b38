use crate::error::{LotteryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of a participating agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgencyId(pub u32);

impl AgencyId {
    /// Parse an agency id from its ASCII-digit form.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LotteryError::handshake(format!(
                "agency id must be ASCII digits, got {:?}",
                raw
            )));
        }

        raw.parse::<u32>()
            .map(AgencyId)
            .map_err(|e| LotteryError::handshake(format!("agency id {:?}: {}", raw, e)))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AgencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgencyId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A single bet placed at an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub agency: String,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birthdate: String,
    pub number: u64,
}

impl Bet {
    pub fn new(
        agency: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        document: impl Into<String>,
        birthdate: impl Into<String>,
        number: u64,
    ) -> Self {
        Self {
            agency: agency.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            document: document.into(),
            birthdate: birthdate.into(),
            number,
        }
    }

    /// Agency that placed this bet, if its id is well formed.
    pub fn agency_id(&self) -> Result<AgencyId> {
        AgencyId::parse(&self.agency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agency_id_parse() {
        assert_eq!(AgencyId::parse("3").unwrap(), AgencyId(3));
        assert_eq!(AgencyId::parse("0042").unwrap(), AgencyId(42));
        assert!(AgencyId::parse("").is_err());
        assert!(AgencyId::parse("-1").is_err());
        assert!(AgencyId::parse("3a").is_err());
        assert!(AgencyId::parse("99999999999").is_err());
    }

    #[test]
    fn test_bet_agency_id() {
        let bet = Bet::new("7", "Ana", "Gomez", "30904465", "1999-03-17", 7574);
        assert_eq!(bet.agency_id().unwrap(), AgencyId(7));
    }
}
