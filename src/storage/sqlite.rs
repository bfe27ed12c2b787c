use super::{
  schema, AddressBalance, LedgerRead, LedgerWrite, NewBalanceDelta, NewEvent, NewMint, NewToken,
  NewTransfer, StoreError, TokenRow, TransferRow,
};
use crate::num::Num;
use bigdecimal::BigDecimal;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::{path::Path, str::FromStr};

/// Owns the SQLite connection. Writers go through [`with_write_tx`];
/// the query surface reads the same connection outside a transaction
/// and therefore only ever sees committed blocks.
///
/// [`with_write_tx`]: Brc20Database::with_write_tx
pub struct Brc20Database {
  conn: Connection,
}

impl Brc20Database {
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Self::init(conn)
  }

  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::init(Connection::open_in_memory()?)
  }

  fn init(conn: Connection) -> Result<Self, StoreError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    schema::migrate(&conn)?;
    Ok(Self { conn })
  }

  pub fn connection(&self) -> &Connection {
    &self.conn
  }

  /// Run `f` inside a single transaction. Everything the closure writes
  /// commits atomically, or not at all.
  pub fn with_write_tx<T>(
    &mut self,
    f: impl FnOnce(&SqliteLedger<'_>) -> Result<T, StoreError>,
  ) -> Result<T, StoreError> {
    let tx = self.conn.transaction()?;
    let result = f(&SqliteLedger { tx: &tx })?;
    tx.commit()?;
    Ok(result)
  }

  /// Highest applied block, used to seed the worker's tip on startup.
  pub fn max_indexed_height(&self) -> Result<Option<u64>, StoreError> {
    Ok(
      self
        .conn
        .query_row("SELECT MAX(height) FROM brc20_blocks", [], |row| {
          row.get::<_, Option<u64>>(0)
        })?,
    )
  }
}

pub struct SqliteLedger<'a> {
  tx: &'a Transaction<'a>,
}

const TOKEN_COLUMNS: &str = "id, inscription_id, inscription_number, block_height, tx_id, \
   address, ticker, max, mint_limit, decimals";

impl TokenRow {
  pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
    Ok(Self {
      id: row.get(0)?,
      inscription_id: row.get(1)?,
      inscription_number: row.get(2)?,
      block_height: row.get(3)?,
      tx_id: row.get(4)?,
      address: row.get(5)?,
      ticker: row.get(6)?,
      max_supply: parse_num(&row.get::<_, String>(7)?)?,
      mint_limit: row
        .get::<_, Option<String>>(8)?
        .map(|s| parse_num(&s))
        .transpose()?,
      decimals: row.get(9)?,
    })
  }
}

/// Amount columns are written by `Num`, so a parse failure here means
/// the file was tampered with or torn.
fn parse_num(s: &str) -> Result<Num, rusqlite::Error> {
  Num::from_str(s).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(
      0,
      rusqlite::types::Type::Text,
      format!("bad decimal column {s:?}: {e}").into(),
    )
  })
}

fn parse_decimal(s: &str) -> Result<BigDecimal, StoreError> {
  BigDecimal::from_str(s).map_err(|e| StoreError::Corrupt(format!("bad delta column {s:?}: {e}")))
}

fn sum_to_num(sum: BigDecimal, what: &str) -> Result<Num, StoreError> {
  Num::try_from(sum).map_err(|e| StoreError::Corrupt(format!("negative {what}: {e}")))
}

impl LedgerRead for SqliteLedger<'_> {
  type Error = StoreError;

  fn token(&self, lower_tick: &str) -> Result<Option<TokenRow>, StoreError> {
    Ok(
      self
        .tx
        .query_row(
          &format!("SELECT {TOKEN_COLUMNS} FROM brc20_deploys WHERE ticker_lower = ?1"),
          params![lower_tick],
          TokenRow::from_row,
        )
        .optional()?,
    )
  }

  fn balance(&self, address: &str, deploy_id: i64) -> Result<AddressBalance, StoreError> {
    let mut stmt = self.tx.prepare_cached(
      "SELECT avail_balance, trans_balance FROM brc20_balances \
       WHERE address = ?1 AND brc20_deploy_id = ?2",
    )?;
    let mut rows = stmt.query(params![address, deploy_id])?;

    let mut avail = BigDecimal::from(0);
    let mut trans = BigDecimal::from(0);
    while let Some(row) = rows.next()? {
      avail += parse_decimal(&row.get::<_, String>(0)?)?;
      trans += parse_decimal(&row.get::<_, String>(1)?)?;
    }

    Ok(AddressBalance {
      avail: sum_to_num(avail, "available balance")?,
      trans: sum_to_num(trans, "transferable balance")?,
    })
  }

  fn minted_total(&self, deploy_id: i64) -> Result<Num, StoreError> {
    let mut stmt = self.tx.prepare_cached(
      "SELECT b.avail_balance FROM brc20_balances b \
       JOIN brc20_mints m \
         ON m.inscription_id = b.inscription_id AND m.brc20_deploy_id = b.brc20_deploy_id \
       WHERE b.brc20_deploy_id = ?1",
    )?;
    let mut rows = stmt.query(params![deploy_id])?;

    let mut minted = BigDecimal::from(0);
    while let Some(row) = rows.next()? {
      minted += parse_decimal(&row.get::<_, String>(0)?)?;
    }
    sum_to_num(minted, "minted total")
  }

  fn transfers_by_inscription(
    &self,
    inscription_id: &str,
    cap: usize,
  ) -> Result<Vec<TransferRow>, StoreError> {
    let mut stmt = self.tx.prepare_cached(
      "SELECT id, inscription_id, inscription_number, brc20_deploy_id, block_height, tx_id, \
         from_address, to_address, settled_height, amount \
       FROM brc20_transfers WHERE inscription_id = ?1 ORDER BY id LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![inscription_id, cap as i64], |row| {
      Ok(TransferRow {
        id: row.get(0)?,
        inscription_id: row.get(1)?,
        inscription_number: row.get(2)?,
        deploy_id: row.get(3)?,
        block_height: row.get(4)?,
        tx_id: row.get(5)?,
        from_address: row.get(6)?,
        to_address: row.get(7)?,
        settled_height: row.get(8)?,
        amount: parse_num(&row.get::<_, String>(9)?)?,
      })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
  }
}

impl LedgerWrite for SqliteLedger<'_> {
  fn insert_block_mark(&self, height: u64, hash: &str) -> Result<(), StoreError> {
    self.tx.execute(
      "INSERT OR REPLACE INTO brc20_blocks (height, hash) VALUES (?1, ?2)",
      params![height, hash],
    )?;
    Ok(())
  }

  fn insert_deploy(&self, new: &NewToken) -> Result<Option<TokenRow>, StoreError> {
    let inserted = self.tx.execute(
      "INSERT OR IGNORE INTO brc20_deploys \
         (inscription_id, inscription_number, block_height, tx_id, address, \
          ticker, ticker_lower, max, mint_limit, decimals) \
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
      params![
        new.inscription_id,
        new.inscription_number,
        new.block_height,
        new.tx_id,
        new.address,
        new.ticker,
        new.ticker.to_lowercase(),
        new.max_supply.to_string(),
        new.mint_limit.as_ref().map(Num::to_string),
        new.decimals,
      ],
    )?;

    if inserted == 0 {
      return Ok(None);
    }

    Ok(Some(TokenRow {
      id: self.tx.last_insert_rowid(),
      inscription_id: new.inscription_id.clone(),
      inscription_number: new.inscription_number,
      block_height: new.block_height,
      tx_id: new.tx_id.clone(),
      address: new.address.clone(),
      ticker: new.ticker.clone(),
      max_supply: new.max_supply.clone(),
      mint_limit: new.mint_limit.clone(),
      decimals: new.decimals,
    }))
  }

  fn insert_mint(&self, new: &NewMint) -> Result<i64, StoreError> {
    self.tx.execute(
      "INSERT INTO brc20_mints \
         (inscription_id, inscription_number, brc20_deploy_id, block_height, tx_id, \
          address, amount) \
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![
        new.inscription_id,
        new.inscription_number,
        new.deploy_id,
        new.block_height,
        new.tx_id,
        new.address,
        new.amount.to_string(),
      ],
    )?;
    Ok(self.tx.last_insert_rowid())
  }

  fn insert_transfer(&self, new: &NewTransfer) -> Result<i64, StoreError> {
    self.tx.execute(
      "INSERT INTO brc20_transfers \
         (inscription_id, inscription_number, brc20_deploy_id, block_height, tx_id, \
          from_address, to_address, settled_height, amount) \
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, ?7)",
      params![
        new.inscription_id,
        new.inscription_number,
        new.deploy_id,
        new.block_height,
        new.tx_id,
        new.from_address,
        new.amount.to_string(),
      ],
    )?;
    Ok(self.tx.last_insert_rowid())
  }

  fn settle_transfer(
    &self,
    transfer_id: i64,
    to_address: &str,
    height: u64,
  ) -> Result<(), StoreError> {
    let updated = self.tx.execute(
      "UPDATE brc20_transfers SET to_address = ?2, settled_height = ?3 \
       WHERE id = ?1 AND to_address IS NULL",
      params![transfer_id, to_address, height],
    )?;
    if updated != 1 {
      return Err(StoreError::Corrupt(format!(
        "transfer {transfer_id} settled twice"
      )));
    }
    Ok(())
  }

  fn insert_balance_delta(&self, new: &NewBalanceDelta) -> Result<(), StoreError> {
    self.tx.execute(
      "INSERT INTO brc20_balances \
         (inscription_id, brc20_deploy_id, block_height, address, avail_balance, trans_balance) \
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      params![
        new.inscription_id,
        new.deploy_id,
        new.block_height,
        new.address,
        new.avail.normalized().to_string(),
        new.trans.normalized().to_string(),
      ],
    )?;
    Ok(())
  }

  fn insert_event(&self, new: &NewEvent) -> Result<i64, StoreError> {
    self.tx.execute(
      "INSERT INTO brc20_events \
         (operation, inscription_id, inscription_number, block_height, brc20_deploy_id, \
          deploy_id, mint_id, transfer_id) \
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        new.kind.as_str(),
        new.inscription_id,
        new.inscription_number,
        new.block_height,
        new.deploy_id,
        new.deploy_row_id,
        new.mint_id,
        new.transfer_id,
      ],
    )?;
    Ok(self.tx.last_insert_rowid())
  }

  fn delete_block(&self, height: u64) -> Result<(), StoreError> {
    // children before parents; settlements are cleared, not deleted,
    // because the reserve row belongs to an earlier block
    self.tx.execute(
      "UPDATE brc20_transfers SET to_address = NULL, settled_height = NULL \
       WHERE settled_height = ?1",
      params![height],
    )?;
    self
      .tx
      .execute("DELETE FROM brc20_events WHERE block_height = ?1", params![height])?;
    self
      .tx
      .execute("DELETE FROM brc20_balances WHERE block_height = ?1", params![height])?;
    self
      .tx
      .execute("DELETE FROM brc20_transfers WHERE block_height = ?1", params![height])?;
    self
      .tx
      .execute("DELETE FROM brc20_mints WHERE block_height = ?1", params![height])?;
    self
      .tx
      .execute("DELETE FROM brc20_deploys WHERE block_height = ?1", params![height])?;
    self
      .tx
      .execute("DELETE FROM brc20_blocks WHERE height = ?1", params![height])?;
    Ok(())
  }
}
