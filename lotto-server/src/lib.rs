//! Lottery aggregation server
//!
//! Agencies connect over TCP, stream their bets in batches and signal when
//! they are done. Once every expected agency finished, the coordinator runs
//! the draw and pushes each agency the list of its own winning bets.
//!
//! Each connection is served on its own thread; the only shared state is the
//! bet store, the [`ConnectionRegistry`] and the [`CompletionBarrier`].

pub mod barrier;
pub mod config;
pub mod coordinator;
pub mod draw;
pub mod registry;
pub mod server;
pub mod session;

pub use barrier::{BarrierWait, CompletionBarrier, RoundMembers};
pub use config::ServerConfig;
pub use coordinator::{LotteryCoordinator, RoundReport};
pub use draw::{DrawRule, WinningNumber};
pub use registry::ConnectionRegistry;
pub use server::{LotteryServer, ShutdownHandle};
pub use session::{SessionHandler, SessionStats};
