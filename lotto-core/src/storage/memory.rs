use crate::error::{LotteryError, Result};
use crate::storage::BetStore;
use crate::types::Bet;
use parking_lot::Mutex;

/// Volatile store, used for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBetStore {
    bets: Mutex<Vec<Bet>>,
    fail_stores: Mutex<bool>,
}

impl MemoryBetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `store_bets` call fail.
    pub fn set_failing(&self, failing: bool) {
        *self.fail_stores.lock() = failing;
    }

    pub fn len(&self) -> usize {
        self.bets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.lock().is_empty()
    }
}

impl BetStore for MemoryBetStore {
    fn store_bets(&self, bets: &[Bet]) -> Result<()> {
        if *self.fail_stores.lock() {
            return Err(LotteryError::persistence("store is configured to fail"));
        }

        self.bets.lock().extend_from_slice(bets);
        Ok(())
    }

    fn load_bets(&self) -> Result<Vec<Bet>> {
        Ok(self.bets.lock().clone())
    }

    fn count_bets(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_store_keeps_nothing() {
        let store = MemoryBetStore::new();
        let bet = Bet::new("1", "Ana", "Gomez", "1", "2000-01-01", 5);

        store.set_failing(true);
        assert!(store.store_bets(&[bet.clone()]).is_err());
        assert!(store.is_empty());

        store.set_failing(false);
        store.store_bets(&[bet.clone()]).unwrap();
        assert_eq!(store.load_bets().unwrap(), vec![bet]);
    }
}
