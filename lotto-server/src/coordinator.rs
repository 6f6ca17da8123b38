use crate::barrier::{BarrierWait, CompletionBarrier, RoundMembers};
use crate::draw::DrawRule;
use crate::registry::{ConnectionRegistry, SharedConnection};
use lotto_core::protocol::{encode_winner_package, send_all};
use lotto_core::{AgencyId, Bet, BetStore, LotteryError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Summary of one completed round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u64,
    pub bets_loaded: usize,
    pub winners: usize,
    pub packages_sent: usize,
    pub delivery_failures: usize,
}

#[derive(Debug, Default)]
struct DrawProgress {
    /// Store positions already handed to a round or carried over.
    scanned: usize,
    /// Bets of agencies that had not finished when their position was scanned.
    carried: Vec<Bet>,
}

/// Runs the draw once every agency finished and pushes each agency its
/// winners.
///
/// A round covers the bets its member agencies stored that no earlier round
/// drew. Bets already persisted when the coordinator is created go to the
/// first round whoever placed them. Positions are taken from the store's
/// insertion order, so `load_bets` must return bets in that order.
pub struct LotteryCoordinator<C> {
    store: Arc<dyn BetStore>,
    rule: Arc<dyn DrawRule>,
    registry: Arc<ConnectionRegistry<C>>,
    barrier: Arc<CompletionBarrier>,
    baseline: usize,
    progress: Mutex<DrawProgress>,
}

impl<C: Write> LotteryCoordinator<C> {
    pub fn new(
        store: Arc<dyn BetStore>,
        rule: Arc<dyn DrawRule>,
        registry: Arc<ConnectionRegistry<C>>,
        barrier: Arc<CompletionBarrier>,
    ) -> Result<Self> {
        let baseline = usize::try_from(store.count_bets()?)
            .map_err(|_| LotteryError::internal("stored bet count exceeds usize"))?;
        if baseline > 0 {
            tracing::info!("{} previously stored bets join the first round", baseline);
        }

        Ok(Self {
            store,
            rule,
            registry,
            barrier,
            baseline,
            progress: Mutex::new(DrawProgress::default()),
        })
    }

    /// Wait for the barrier, then draw and distribute. Returns `None` when
    /// the wait was cancelled by a shutdown.
    pub fn run_round(&self, timeout: Option<Duration>) -> Result<Option<RoundReport>> {
        let outcome = match timeout {
            Some(timeout) => self.barrier.wait_timeout(timeout),
            None => self.barrier.wait(),
        };

        let members = match outcome {
            BarrierWait::Released(members) => members,
            BarrierWait::Cancelled => {
                tracing::info!("Round cancelled before every agency finished");
                self.close_connections();
                return Ok(None);
            }
            BarrierWait::TimedOut {
                finished,
                expected,
                abandoned,
            } => {
                let closed = self.registry.take(&abandoned);
                tracing::error!(
                    "Round abandoned with {} of {} agencies finished, closed {} connections",
                    finished,
                    expected,
                    closed.len()
                );
                return Err(LotteryError::RoundTimeout { finished, expected });
            }
        };

        tracing::info!(
            "All agencies finished, running draw for round {}",
            members.round
        );
        match self.draw_and_distribute(&members) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                // no package will follow for this round
                self.registry.take(&members.agencies);
                Err(e)
            }
        }
    }

    /// Winners grouped by agency, in store order.
    pub fn draw(&self, bets: &[Bet]) -> BTreeMap<AgencyId, Vec<Bet>> {
        let mut winners: BTreeMap<AgencyId, Vec<Bet>> = BTreeMap::new();

        for bet in bets.iter().filter(|bet| self.rule.has_won(bet)) {
            match bet.agency_id() {
                Ok(agency) => winners.entry(agency).or_default().push(bet.clone()),
                Err(e) => tracing::warn!("Winning bet with unusable agency dropped: {}", e),
            }
        }

        winners
    }

    /// Bets that belong to the released round, in store order. Positions past
    /// the round's stored mark were written after the release and are left
    /// for later rounds.
    fn round_bets(&self, members: &RoundMembers) -> Result<Vec<Bet>> {
        let bets = self.store.load_bets()?;
        let cutoff = (self.baseline + members.stored_mark as usize).min(bets.len());

        let agencies: BTreeSet<AgencyId> = members.agencies.iter().copied().collect();
        // bets without a usable agency are drawn right away and dropped there
        let is_member = |bet: &Bet| {
            bet.agency_id()
                .map_or(true, |agency| agencies.contains(&agency))
        };

        let mut progress = self.progress.lock();
        let start = progress.scanned.min(cutoff);
        let mut round = Vec::new();
        let mut carried = Vec::new();

        for bet in std::mem::take(&mut progress.carried) {
            if is_member(&bet) {
                round.push(bet);
            } else {
                carried.push(bet);
            }
        }

        for (position, bet) in bets.into_iter().enumerate().take(cutoff).skip(start) {
            if position < self.baseline || is_member(&bet) {
                round.push(bet);
            } else {
                carried.push(bet);
            }
        }

        if !carried.is_empty() {
            tracing::debug!("{} bets carried to a later round", carried.len());
        }
        progress.scanned = progress.scanned.max(cutoff);
        progress.carried = carried;
        Ok(round)
    }

    fn draw_and_distribute(&self, members: &RoundMembers) -> Result<RoundReport> {
        let round = members.round;
        let bets = self.round_bets(members)?;
        let mut winners = self.draw(&bets);

        let mut report = RoundReport {
            round,
            bets_loaded: bets.len(),
            winners: winners.values().map(Vec::len).sum(),
            ..RoundReport::default()
        };

        // every member gets a package, even with zero winners
        for (agency, conn) in self.registry.take(&members.agencies) {
            let agency_winners = winners.remove(&agency).unwrap_or_default();
            match deliver(&conn, &agency_winners) {
                Ok(()) => {
                    report.packages_sent += 1;
                    tracing::info!(
                        "Round {}: sent {} winners to agency {}",
                        round,
                        agency_winners.len(),
                        agency
                    );
                }
                Err(e) => {
                    report.delivery_failures += 1;
                    tracing::error!("Round {}: delivery to agency {} failed: {}", round, agency, e);
                }
            }
        }

        for (agency, unclaimed) in &winners {
            tracing::warn!(
                "Round {}: {} winners for agency {} without a connection",
                round,
                unclaimed.len(),
                agency
            );
        }

        tracing::info!(
            "Round {} done: {} bets, {} winners, {} packages sent, {} failed",
            report.round,
            report.bets_loaded,
            report.winners,
            report.packages_sent,
            report.delivery_failures
        );
        Ok(report)
    }

    fn close_connections(&self) {
        let closed = self.registry.drain();
        tracing::debug!("Closed {} agency connections", closed.len());
    }
}

fn deliver<C: Write>(conn: &SharedConnection<C>, winners: &[Bet]) -> Result<()> {
    let package = encode_winner_package(winners)?;
    let mut conn = conn.lock();
    send_all(&mut *conn, &package)
}
