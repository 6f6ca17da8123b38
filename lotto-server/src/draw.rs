use lotto_core::Bet;

/// Decides whether a bet won the draw.
pub trait DrawRule: Send + Sync {
    fn has_won(&self, bet: &Bet) -> bool;
}

impl<F> DrawRule for F
where
    F: Fn(&Bet) -> bool + Send + Sync,
{
    fn has_won(&self, bet: &Bet) -> bool {
        self(bet)
    }
}

/// A bet wins when it picked exactly the drawn number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinningNumber(pub u64);

impl DrawRule for WinningNumber {
    fn has_won(&self, bet: &Bet) -> bool {
        bet.number == self.0
    }
}
