//! Counting rendezvous between agency sessions and the coordinator.
//!
//! Every session that reaches end-of-session calls [`CompletionBarrier::arrive`];
//! the coordinator blocks in [`CompletionBarrier::wait`] until the number of
//! arrivals reaches the expected agency count. The count is re-checked after
//! every wake.
//!
//! Releasing a round hands the coordinator the agencies that arrived for it
//! and the number of bets stored so far, both read under the same lock. A
//! session that finishes after the release, or stores a batch after it,
//! belongs to the next round. Arrivals beyond the expected count are kept for
//! the next round as well.

use lotto_core::{AgencyId, Result};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BarrierState {
    expected: usize,
    arrived: Vec<AgencyId>,
    stored: u64,
    round: u64,
    cancelled: bool,
}

/// What a released round consists of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundMembers {
    pub round: u64,
    /// Agencies that finished for this round, in arrival order.
    pub agencies: Vec<AgencyId>,
    /// Bets stored through [`CompletionBarrier::record_batch`] up to the
    /// release, counted since the barrier was created.
    pub stored_mark: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierWait {
    /// Every expected agency finished.
    Released(RoundMembers),
    /// The deadline passed first. The arrivals of the abandoned round are
    /// handed back and no longer count.
    TimedOut {
        finished: usize,
        expected: usize,
        abandoned: Vec<AgencyId>,
    },
    Cancelled,
}

#[derive(Debug)]
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    all_finished: Condvar,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                expected,
                arrived: Vec::new(),
                stored: 0,
                round: 0,
                cancelled: false,
            }),
            all_finished: Condvar::new(),
        }
    }

    pub fn expected(&self) -> usize {
        self.state.lock().expected
    }

    /// Arrivals not yet handed to a round.
    pub fn finished(&self) -> usize {
        self.state.lock().arrived.len()
    }

    /// Run `store` and count the bets it reports as stored, without a round
    /// release happening in between.
    pub fn record_batch<F>(&self, store: F) -> Result<usize>
    where
        F: FnOnce() -> Result<usize>,
    {
        let mut state = self.state.lock();
        let stored = store()?;
        state.stored += stored as u64;
        Ok(stored)
    }

    /// Record one finished session. Returns the number of pending arrivals
    /// after it.
    pub fn arrive(&self, agency: AgencyId) -> usize {
        let mut state = self.state.lock();
        state.arrived.push(agency);

        let finished = state.arrived.len();
        if finished > state.expected {
            tracing::debug!(
                "Agency {} finished early, it is held for round {}",
                agency,
                state.round + 2
            );
        } else {
            tracing::debug!("{} of {} agencies finished", finished, state.expected);
        }
        drop(state);

        self.all_finished.notify_all();
        finished
    }

    /// Block until every expected agency has arrived.
    pub fn wait(&self) -> BarrierWait {
        let mut state = self.state.lock();
        while state.arrived.len() < state.expected && !state.cancelled {
            self.all_finished.wait(&mut state);
        }

        Self::release(&mut state)
    }

    /// Like [`wait`](Self::wait) but gives up once `timeout` has elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> BarrierWait {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        while state.arrived.len() < state.expected && !state.cancelled {
            if self
                .all_finished
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.arrived.len() < state.expected
                && !state.cancelled
            {
                let abandoned = std::mem::take(&mut state.arrived);
                return BarrierWait::TimedOut {
                    finished: abandoned.len(),
                    expected: state.expected,
                    abandoned,
                };
            }
        }

        Self::release(&mut state)
    }

    /// Wake the coordinator without releasing a round.
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.all_finished.notify_all();
    }

    fn release(state: &mut BarrierState) -> BarrierWait {
        if state.cancelled {
            return BarrierWait::Cancelled;
        }

        let expected = state.expected;
        let agencies: Vec<AgencyId> = state.arrived.drain(..expected).collect();
        state.round += 1;

        BarrierWait::Released(RoundMembers {
            round: state.round,
            agencies,
            stored_mark: state.stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_core::LotteryError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn released(outcome: BarrierWait) -> RoundMembers {
        match outcome {
            BarrierWait::Released(members) => members,
            other => panic!("round not released: {:?}", other),
        }
    }

    #[test]
    fn test_releases_exactly_at_last_arrival() {
        let barrier = Arc::new(CompletionBarrier::new(3));
        let is_released = Arc::new(AtomicBool::new(false));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            let is_released = Arc::clone(&is_released);
            thread::spawn(move || {
                let outcome = barrier.wait();
                is_released.store(true, Ordering::SeqCst);
                outcome
            })
        };

        barrier.arrive(AgencyId(1));
        barrier.arrive(AgencyId(2));
        thread::sleep(Duration::from_millis(50));
        assert!(!is_released.load(Ordering::SeqCst));

        barrier.arrive(AgencyId(3));
        let members = released(waiter.join().unwrap());
        assert_eq!(members.round, 1);
        assert_eq!(members.agencies, vec![AgencyId(1), AgencyId(2), AgencyId(3)]);
        assert_eq!(barrier.finished(), 0);
    }

    #[test]
    fn test_concurrent_arrivals() {
        let barrier = Arc::new(CompletionBarrier::new(8));
        let sessions: Vec<_> = (0..8u32)
            .map(|id| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.arrive(AgencyId(id));
                })
            })
            .collect();

        let members = released(barrier.wait());
        assert_eq!(members.agencies.len(), 8);
        for session in sessions {
            session.join().unwrap();
        }
    }

    #[test]
    fn test_extra_arrivals_carry_to_next_round() {
        let barrier = CompletionBarrier::new(1);
        assert_eq!(barrier.arrive(AgencyId(1)), 1);
        assert_eq!(barrier.arrive(AgencyId(2)), 2);

        let first = released(barrier.wait());
        assert_eq!(first.agencies, vec![AgencyId(1)]);
        assert_eq!(barrier.finished(), 1);

        let second = released(barrier.wait());
        assert_eq!(second.round, 2);
        assert_eq!(second.agencies, vec![AgencyId(2)]);
    }

    #[test]
    fn test_stored_mark_is_taken_at_release() {
        let barrier = CompletionBarrier::new(1);
        barrier.record_batch(|| Ok(3)).unwrap();
        barrier.arrive(AgencyId(1));
        assert_eq!(released(barrier.wait()).stored_mark, 3);

        barrier.record_batch(|| Ok(2)).unwrap();
        let failed = barrier.record_batch(|| Err(LotteryError::persistence("disk full")));
        assert!(failed.is_err());

        barrier.arrive(AgencyId(1));
        assert_eq!(released(barrier.wait()).stored_mark, 5);
    }

    #[test]
    fn test_timeout_hands_back_arrivals() {
        let barrier = CompletionBarrier::new(2);
        barrier.arrive(AgencyId(4));

        match barrier.wait_timeout(Duration::from_millis(20)) {
            BarrierWait::TimedOut {
                finished,
                expected,
                abandoned,
            } => {
                assert_eq!((finished, expected), (1, 2));
                assert_eq!(abandoned, vec![AgencyId(4)]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(barrier.finished(), 0);
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let barrier = Arc::new(CompletionBarrier::new(2));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };

        thread::sleep(Duration::from_millis(20));
        barrier.cancel();
        assert_eq!(waiter.join().unwrap(), BarrierWait::Cancelled);
    }
}
