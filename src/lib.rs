//! BRC-20 token indexer core.
//!
//! Consumes a height-ordered stream of inscription events and maintains
//! an authoritative ledger of token deploys, mints, two-phase transfers
//! and per-address balances, with exact decimal arithmetic and
//! rollback-by-height for chain reorganizations.

pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod inscription_id;
pub mod num;
pub mod protocol;
pub mod query;
pub mod storage;
pub mod tick;

pub use self::{
  chain::{BlockApply, BlockRollback, ChainEvent, InscriptionEvent, Location},
  config::IndexConfig,
  error::{Brc20Error, IndexError},
  indexer::Indexer,
  inscription_id::InscriptionId,
  num::Num,
  tick::Tick,
};
