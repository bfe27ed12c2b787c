use crate::{
  num::Num,
  storage::{Brc20Database, EventKind, StoreError, TokenRow},
};
use bigdecimal::BigDecimal;
use rusqlite::params;
use std::{
  collections::BTreeMap,
  str::FromStr,
};

/// Stable `(limit, offset)` paging for every listing.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
  pub limit: usize,
  pub offset: usize,
}

impl Default for Paging {
  fn default() -> Self {
    Self {
      limit: 20,
      offset: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
  pub ticker: String,
  pub avail: Num,
  pub trans: Num,
  pub total: Num,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSupply {
  pub max_supply: Num,
  pub minted: Num,
  pub holders: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holder {
  pub address: String,
  pub total: Num,
}

#[derive(Debug, Clone)]
pub struct HistoryEvent {
  pub kind: EventKind,
  pub inscription_id: String,
  pub inscription_number: i64,
  pub block_height: u64,
  pub ticker: String,
}

fn parse_decimal(s: &str) -> Result<BigDecimal, StoreError> {
  BigDecimal::from_str(s).map_err(|e| StoreError::Corrupt(format!("bad delta column {s:?}: {e}")))
}

fn sum_to_num(sum: BigDecimal, what: &str) -> Result<Num, StoreError> {
  Num::try_from(sum).map_err(|e| StoreError::Corrupt(format!("negative {what}: {e}")))
}

fn page<T>(rows: Vec<T>, paging: Paging) -> Vec<T> {
  rows
    .into_iter()
    .skip(paging.offset)
    .take(paging.limit)
    .collect()
}

/// Tokens with a total row count, optionally filtered by ticker
/// (case-insensitive).
pub fn list_tokens(
  db: &Brc20Database,
  ticker_filter: Option<&str>,
  paging: Paging,
) -> Result<(Vec<TokenRow>, u64), StoreError> {
  let conn = db.connection();
  let filter = ticker_filter.map(str::to_lowercase);

  let total = conn.query_row(
    "SELECT COUNT(*) FROM brc20_deploys WHERE ?1 IS NULL OR ticker_lower = ?1",
    params![filter],
    |row| row.get::<_, u64>(0),
  )?;

  let mut stmt = conn.prepare(
    "SELECT id, inscription_id, inscription_number, block_height, tx_id, address, \
       ticker, max, mint_limit, decimals \
     FROM brc20_deploys WHERE ?1 IS NULL OR ticker_lower = ?1 \
     ORDER BY id LIMIT ?2 OFFSET ?3",
  )?;
  let rows = stmt.query_map(
    params![filter, paging.limit as i64, paging.offset as i64],
    TokenRow::from_row,
  )?;

  Ok((rows.collect::<Result<Vec<_>, _>>()?, total))
}

/// Per-token `(avail, trans, total)` for one address, grouped and
/// summed from the delta rows.
pub fn balances(
  db: &Brc20Database,
  address: &str,
  ticker_filter: Option<&str>,
  paging: Paging,
) -> Result<Vec<TokenBalance>, StoreError> {
  let conn = db.connection();
  let filter = ticker_filter.map(str::to_lowercase);

  let mut stmt = conn.prepare(
    "SELECT d.ticker_lower, d.ticker, b.avail_balance, b.trans_balance \
     FROM brc20_balances b JOIN brc20_deploys d ON d.id = b.brc20_deploy_id \
     WHERE b.address = ?1 AND (?2 IS NULL OR d.ticker_lower = ?2)",
  )?;
  let mut rows = stmt.query(params![address, filter])?;

  let mut sums: BTreeMap<String, (String, BigDecimal, BigDecimal)> = BTreeMap::new();
  while let Some(row) = rows.next()? {
    let key = row.get::<_, String>(0)?;
    let ticker = row.get::<_, String>(1)?;
    let entry = sums
      .entry(key)
      .or_insert_with(|| (ticker, BigDecimal::from(0), BigDecimal::from(0)));
    entry.1 += parse_decimal(&row.get::<_, String>(2)?)?;
    entry.2 += parse_decimal(&row.get::<_, String>(3)?)?;
  }

  let mut result = Vec::with_capacity(sums.len());
  for (_, (ticker, avail, trans)) in sums {
    let avail = sum_to_num(avail, "available balance")?;
    let trans = sum_to_num(trans, "transferable balance")?;
    let total = &avail + &trans;
    result.push(TokenBalance {
      ticker,
      avail,
      trans,
      total,
    });
  }
  Ok(page(result, paging))
}

/// `(max, minted, holders with a positive total)` for one token.
pub fn supply(db: &Brc20Database, ticker: &str) -> Result<Option<TokenSupply>, StoreError> {
  let Some(token) = token_by_ticker(db, ticker)? else {
    return Ok(None);
  };

  let conn = db.connection();
  let mut stmt = conn.prepare(
    "SELECT b.avail_balance FROM brc20_balances b \
     JOIN brc20_mints m \
       ON m.inscription_id = b.inscription_id AND m.brc20_deploy_id = b.brc20_deploy_id \
     WHERE b.brc20_deploy_id = ?1",
  )?;
  let mut rows = stmt.query(params![token.id])?;
  let mut minted = BigDecimal::from(0);
  while let Some(row) = rows.next()? {
    minted += parse_decimal(&row.get::<_, String>(0)?)?;
  }

  let holders = address_totals(db, token.id)?
    .into_iter()
    .filter(|(_, total)| total.is_positive())
    .count() as u64;

  Ok(Some(TokenSupply {
    max_supply: token.max_supply,
    minted: sum_to_num(minted, "minted total")?,
    holders,
  }))
}

/// Addresses holding the token, ordered by total balance descending.
pub fn holders(
  db: &Brc20Database,
  ticker: &str,
  paging: Paging,
) -> Result<Vec<Holder>, StoreError> {
  let Some(token) = token_by_ticker(db, ticker)? else {
    return Ok(Vec::new());
  };

  let mut holders: Vec<Holder> = address_totals(db, token.id)?
    .into_iter()
    .filter(|(_, total)| total.is_positive())
    .map(|(address, total)| Holder { address, total })
    .collect();
  holders.sort_by(|a, b| {
    b.total
      .partial_cmp(&a.total)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| a.address.cmp(&b.address))
  });
  Ok(page(holders, paging))
}

/// Event stream for one token, newest inscriptions first.
pub fn history(
  db: &Brc20Database,
  ticker: &str,
  paging: Paging,
) -> Result<Vec<HistoryEvent>, StoreError> {
  let conn = db.connection();
  let mut stmt = conn.prepare(
    "SELECT e.operation, e.inscription_id, e.inscription_number, e.block_height, d.ticker \
     FROM brc20_events e JOIN brc20_deploys d ON d.id = e.brc20_deploy_id \
     WHERE d.ticker_lower = ?1 \
     ORDER BY e.inscription_number DESC, e.id DESC LIMIT ?2 OFFSET ?3",
  )?;
  let rows = stmt
    .query_map(
      params![ticker.to_lowercase(), paging.limit as i64, paging.offset as i64],
      |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, i64>(2)?,
          row.get::<_, u64>(3)?,
          row.get::<_, String>(4)?,
        ))
      },
    )?
    .collect::<Result<Vec<_>, _>>()?;

  rows
    .into_iter()
    .map(|(operation, inscription_id, inscription_number, block_height, ticker)| {
      Ok(HistoryEvent {
        kind: EventKind::from_str(&operation)?,
        inscription_id,
        inscription_number,
        block_height,
        ticker,
      })
    })
    .collect()
}

fn token_by_ticker(db: &Brc20Database, ticker: &str) -> Result<Option<TokenRow>, StoreError> {
  use rusqlite::OptionalExtension;
  Ok(
    db
      .connection()
      .query_row(
        "SELECT id, inscription_id, inscription_number, block_height, tx_id, address, \
           ticker, max, mint_limit, decimals \
         FROM brc20_deploys WHERE ticker_lower = ?1",
        params![ticker.to_lowercase()],
        TokenRow::from_row,
      )
      .optional()?,
  )
}

fn address_totals(
  db: &Brc20Database,
  deploy_id: i64,
) -> Result<Vec<(String, Num)>, StoreError> {
  let conn = db.connection();
  let mut stmt = conn.prepare(
    "SELECT address, avail_balance, trans_balance FROM brc20_balances \
     WHERE brc20_deploy_id = ?1",
  )?;
  let mut rows = stmt.query(params![deploy_id])?;

  let mut sums: BTreeMap<String, BigDecimal> = BTreeMap::new();
  while let Some(row) = rows.next()? {
    let address = row.get::<_, String>(0)?;
    let delta = parse_decimal(&row.get::<_, String>(1)?)? + parse_decimal(&row.get::<_, String>(2)?)?;
    *sums.entry(address).or_insert_with(|| BigDecimal::from(0)) += delta;
  }

  sums
    .into_iter()
    .map(|(address, total)| Ok((address, sum_to_num(total, "holder total")?)))
    .collect()
}
