use lotto_core::{AgencyId, LotteryError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Connection handle shared between the registry and whoever writes to it.
pub type SharedConnection<C> = Arc<Mutex<C>>;

/// Live connection of every agency that completed its handshake.
///
/// The map lock only guards inserts and lookups; I/O happens through the
/// per-connection lock of the handle returned by [`lookup`](Self::lookup).
pub struct ConnectionRegistry<C> {
    connections: Mutex<BTreeMap<AgencyId, SharedConnection<C>>>,
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<C> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the connection for `agency`. A previous connection for the same
    /// agency is replaced and handed back.
    pub fn register(&self, agency: AgencyId, conn: C) -> Option<SharedConnection<C>> {
        let replaced = self
            .connections
            .lock()
            .insert(agency, Arc::new(Mutex::new(conn)));

        if replaced.is_some() {
            tracing::warn!("Agency {} re-registered, replacing its connection", agency);
        } else {
            tracing::debug!("Agency {} registered", agency);
        }
        replaced
    }

    pub fn lookup(&self, agency: AgencyId) -> Result<SharedConnection<C>> {
        self.connections
            .lock()
            .get(&agency)
            .cloned()
            .ok_or(LotteryError::UnknownAgency(agency.value()))
    }

    /// Registered agencies in ascending order.
    pub fn agencies(&self) -> Vec<AgencyId> {
        self.connections.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Remove the entries of `agencies`, leaving every other registration in
    /// place. Agencies without an entry are skipped.
    pub fn take(&self, agencies: &[AgencyId]) -> Vec<(AgencyId, SharedConnection<C>)> {
        let mut connections = self.connections.lock();
        agencies
            .iter()
            .filter_map(|agency| connections.remove(agency).map(|conn| (*agency, conn)))
            .collect()
    }

    /// Remove every entry, returning them for closing.
    pub fn drain(&self) -> Vec<(AgencyId, SharedConnection<C>)> {
        std::mem::take(&mut *self.connections.lock())
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        registry.register(AgencyId(2), vec![2u8]);
        registry.register(AgencyId(1), vec![1u8]);

        assert_eq!(registry.agencies(), vec![AgencyId(1), AgencyId(2)]);
        assert_eq!(*registry.lookup(AgencyId(2)).unwrap().lock(), vec![2u8]);
    }

    #[test]
    fn test_unknown_agency() {
        let registry: ConnectionRegistry<Vec<u8>> = ConnectionRegistry::new();
        assert!(matches!(
            registry.lookup(AgencyId(9)),
            Err(LotteryError::UnknownAgency(9))
        ));
    }

    #[test]
    fn test_last_write_wins() {
        let registry = ConnectionRegistry::new();
        assert!(registry.register(AgencyId(1), "old").is_none());
        let replaced = registry.register(AgencyId(1), "new").unwrap();

        assert_eq!(*replaced.lock(), "old");
        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.lookup(AgencyId(1)).unwrap().lock(), "new");
    }

    #[test]
    fn test_take_leaves_other_agencies() {
        let registry = ConnectionRegistry::new();
        registry.register(AgencyId(1), ());
        registry.register(AgencyId(2), ());
        registry.register(AgencyId(3), ());

        let taken = registry.take(&[AgencyId(3), AgencyId(1), AgencyId(7)]);
        let taken: Vec<AgencyId> = taken.into_iter().map(|(agency, _)| agency).collect();
        assert_eq!(taken, vec![AgencyId(3), AgencyId(1)]);
        assert_eq!(registry.agencies(), vec![AgencyId(2)]);
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = ConnectionRegistry::new();
        registry.register(AgencyId(1), ());
        registry.register(AgencyId(2), ());

        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
    }
}
