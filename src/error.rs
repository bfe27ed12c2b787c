use crate::{num::NumError, storage::StoreError};

/// Consensus-rule rejection. Never aborts a block: the inscription that
/// produced it simply leaves no rows behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Brc20Error {
  #[error("invalid tick length: {0}")]
  InvalidTickLen(String),

  #[error("tick already exists: {0}")]
  DuplicateTick(String),

  #[error("tick not found: {0}")]
  TickNotFound(String),

  #[error("max supply out of range: {0}")]
  InvalidMaxSupply(String),

  #[error("mint limit out of range: {0}")]
  MintLimitOutOfRange(String),

  #[error("amount precision {amount} exceeds token decimals {decimals}")]
  AmountPrecision { amount: String, decimals: u8 },

  #[error("mint amount {amount} exceeds per-mint limit {limit}")]
  AmountExceedLimit { amount: String, limit: String },

  #[error("tick fully minted: {0}")]
  TickMinted(String),

  #[error("insufficient available balance: {available} available, {required} required")]
  InsufficientBalance { available: String, required: String },

  #[error("numeric error: {0}")]
  Numeric(#[from] NumError),
}

/// Worker-level failures that stop ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  #[error("database error: {0}")]
  Store(#[from] StoreError),

  #[error("block {height} failed after {attempts} attempts: {source}")]
  RetriesExhausted {
    height: u64,
    attempts: usize,
    source: StoreError,
  },

  #[error("rollback of unknown height {height}, tip is {tip:?}")]
  UnknownRollback { height: u64, tip: Option<u64> },

  #[error("index worker panicked")]
  WorkerPanicked,
}
