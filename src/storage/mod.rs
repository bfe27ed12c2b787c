mod schema;
mod sqlite;

pub use self::sqlite::{Brc20Database, SqliteLedger};

use crate::num::Num;
use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Recorded recipient of a settlement whose carrier inscription was
/// spent as a fee. No bitcoin address takes this form.
pub const SPENT_AS_FEE: &str = "spent_as_fee";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Sql(#[from] rusqlite::Error),

  #[error("corrupt ledger state: {0}")]
  Corrupt(String),
}

impl StoreError {
  /// Deadlock-class failures worth retrying with the whole block.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      StoreError::Sql(rusqlite::Error::SqliteFailure(e, _))
        if matches!(
          e.code,
          rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        )
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
  Deploy,
  Mint,
  TransferReserve,
  TransferSettle,
}

impl EventKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      EventKind::Deploy => "deploy",
      EventKind::Mint => "mint",
      EventKind::TransferReserve => "transfer_reserve",
      EventKind::TransferSettle => "transfer_settle",
    }
  }
}

impl FromStr for EventKind {
  type Err = StoreError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "deploy" => Ok(EventKind::Deploy),
      "mint" => Ok(EventKind::Mint),
      "transfer_reserve" => Ok(EventKind::TransferReserve),
      "transfer_settle" => Ok(EventKind::TransferSettle),
      other => Err(StoreError::Corrupt(format!("unknown event kind: {other}"))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct TokenRow {
  pub id: i64,
  pub inscription_id: String,
  pub inscription_number: i64,
  pub block_height: u64,
  pub tx_id: String,
  pub address: String,
  pub ticker: String,
  pub max_supply: Num,
  pub mint_limit: Option<Num>,
  pub decimals: u8,
}

#[derive(Debug, Clone)]
pub struct TransferRow {
  pub id: i64,
  pub inscription_id: String,
  pub inscription_number: i64,
  pub deploy_id: i64,
  pub block_height: u64,
  pub tx_id: String,
  pub from_address: String,
  pub to_address: Option<String>,
  pub settled_height: Option<u64>,
  pub amount: Num,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressBalance {
  pub avail: Num,
  pub trans: Num,
}

impl AddressBalance {
  pub fn new() -> Self {
    Self {
      avail: Num::zero(),
      trans: Num::zero(),
    }
  }

  pub fn total(&self) -> Num {
    &self.avail + &self.trans
  }
}

impl Default for AddressBalance {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Debug)]
pub struct NewToken {
  pub inscription_id: String,
  pub inscription_number: i64,
  pub block_height: u64,
  pub tx_id: String,
  pub address: String,
  pub ticker: String,
  pub max_supply: Num,
  pub mint_limit: Option<Num>,
  pub decimals: u8,
}

#[derive(Debug)]
pub struct NewMint {
  pub inscription_id: String,
  pub inscription_number: i64,
  pub deploy_id: i64,
  pub block_height: u64,
  pub tx_id: String,
  pub address: String,
  pub amount: Num,
}

#[derive(Debug)]
pub struct NewTransfer {
  pub inscription_id: String,
  pub inscription_number: i64,
  pub deploy_id: i64,
  pub block_height: u64,
  pub tx_id: String,
  pub from_address: String,
  pub amount: Num,
}

/// Signed balance delta. The reserve step writes `(-amt, +amt)`, so the
/// columns are signed decimals even though balances never go negative.
#[derive(Debug)]
pub struct NewBalanceDelta {
  pub inscription_id: String,
  pub deploy_id: i64,
  pub block_height: u64,
  pub address: String,
  pub avail: BigDecimal,
  pub trans: BigDecimal,
}

#[derive(Debug)]
pub struct NewEvent {
  pub kind: EventKind,
  pub inscription_id: String,
  pub inscription_number: i64,
  pub block_height: u64,
  pub deploy_id: i64,
  pub deploy_row_id: Option<i64>,
  pub mint_id: Option<i64>,
  pub transfer_id: Option<i64>,
}

pub trait LedgerRead {
  type Error: std::error::Error;

  fn token(&self, lower_tick: &str) -> Result<Option<TokenRow>, Self::Error>;

  /// Current balance as the exact sum of delta rows.
  fn balance(&self, address: &str, deploy_id: i64) -> Result<AddressBalance, Self::Error>;

  /// Sum of effective mint amounts, read from the balance deltas paired
  /// with mint rows (mint rows themselves keep the requested amount).
  fn minted_total(&self, deploy_id: i64) -> Result<Num, Self::Error>;

  fn transfers_by_inscription(
    &self,
    inscription_id: &str,
    cap: usize,
  ) -> Result<Vec<TransferRow>, Self::Error>;
}

pub trait LedgerWrite: LedgerRead {
  fn insert_block_mark(&self, height: u64, hash: &str) -> Result<(), Self::Error>;

  /// Conditional insert: `None` on a case-insensitive ticker collision.
  fn insert_deploy(&self, new: &NewToken) -> Result<Option<TokenRow>, Self::Error>;

  fn insert_mint(&self, new: &NewMint) -> Result<i64, Self::Error>;

  fn insert_transfer(&self, new: &NewTransfer) -> Result<i64, Self::Error>;

  fn settle_transfer(
    &self,
    transfer_id: i64,
    to_address: &str,
    height: u64,
  ) -> Result<(), Self::Error>;

  fn insert_balance_delta(&self, new: &NewBalanceDelta) -> Result<(), Self::Error>;

  fn insert_event(&self, new: &NewEvent) -> Result<i64, Self::Error>;

  /// Remove every row produced at `height` and clear settlements made
  /// there, restoring the state before the block was applied.
  fn delete_block(&self, height: u64) -> Result<(), Self::Error>;
}
