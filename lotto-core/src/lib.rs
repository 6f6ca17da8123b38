//! Lotto core - bet model, wire protocol and storage
//!
//! This library holds everything the aggregation server and the agency
//! clients share: the [`Bet`] record, the tagged length-prefixed wire codec,
//! exact-length socket transport and the bet stores.

pub mod client;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod types;

pub use client::{AgencyClient, SubmitSummary};
pub use error::{LotteryError, Result};
pub use storage::{BetStore, MemoryBetStore, SqliteBetStore};
pub use types::{AgencyId, Bet};
