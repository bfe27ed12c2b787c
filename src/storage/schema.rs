use rusqlite::Connection;

/// Ledger schema. Amount columns are canonical decimal strings; every
/// row carries the block height that produced it so a rollback is a
/// delete by height. `brc20_balances` is append-only: a balance is the
/// sum of its delta rows, never a mutated cell.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS brc20_blocks (
  height INTEGER PRIMARY KEY,
  hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS brc20_deploys (
  id INTEGER PRIMARY KEY,
  inscription_id TEXT NOT NULL,
  inscription_number INTEGER NOT NULL,
  block_height INTEGER NOT NULL,
  tx_id TEXT NOT NULL,
  address TEXT NOT NULL,
  ticker TEXT NOT NULL,
  ticker_lower TEXT NOT NULL,
  max TEXT NOT NULL,
  mint_limit TEXT,
  decimals INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_deploys_ticker_lower
  ON brc20_deploys (ticker_lower);
CREATE INDEX IF NOT EXISTS idx_deploys_block_height
  ON brc20_deploys (block_height);

CREATE TABLE IF NOT EXISTS brc20_mints (
  id INTEGER PRIMARY KEY,
  inscription_id TEXT NOT NULL,
  inscription_number INTEGER NOT NULL,
  brc20_deploy_id INTEGER NOT NULL REFERENCES brc20_deploys (id),
  block_height INTEGER NOT NULL,
  tx_id TEXT NOT NULL,
  address TEXT NOT NULL,
  amount TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mints_deploy ON brc20_mints (brc20_deploy_id);
CREATE INDEX IF NOT EXISTS idx_mints_block_height ON brc20_mints (block_height);
CREATE INDEX IF NOT EXISTS idx_mints_inscription ON brc20_mints (inscription_id);

CREATE TABLE IF NOT EXISTS brc20_transfers (
  id INTEGER PRIMARY KEY,
  inscription_id TEXT NOT NULL,
  inscription_number INTEGER NOT NULL,
  brc20_deploy_id INTEGER NOT NULL REFERENCES brc20_deploys (id),
  block_height INTEGER NOT NULL,
  tx_id TEXT NOT NULL,
  from_address TEXT NOT NULL,
  to_address TEXT,
  settled_height INTEGER,
  amount TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transfers_inscription
  ON brc20_transfers (inscription_id);
CREATE INDEX IF NOT EXISTS idx_transfers_block_height
  ON brc20_transfers (block_height);
CREATE INDEX IF NOT EXISTS idx_transfers_settled_height
  ON brc20_transfers (settled_height);

CREATE TABLE IF NOT EXISTS brc20_balances (
  id INTEGER PRIMARY KEY,
  inscription_id TEXT NOT NULL,
  brc20_deploy_id INTEGER NOT NULL REFERENCES brc20_deploys (id),
  block_height INTEGER NOT NULL,
  address TEXT NOT NULL,
  avail_balance TEXT NOT NULL,
  trans_balance TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_balances_address
  ON brc20_balances (address, brc20_deploy_id);
CREATE INDEX IF NOT EXISTS idx_balances_deploy ON brc20_balances (brc20_deploy_id);
CREATE INDEX IF NOT EXISTS idx_balances_block_height
  ON brc20_balances (block_height);
CREATE INDEX IF NOT EXISTS idx_balances_inscription
  ON brc20_balances (inscription_id);

CREATE TABLE IF NOT EXISTS brc20_events (
  id INTEGER PRIMARY KEY,
  operation TEXT NOT NULL,
  inscription_id TEXT NOT NULL,
  inscription_number INTEGER NOT NULL,
  block_height INTEGER NOT NULL,
  brc20_deploy_id INTEGER NOT NULL REFERENCES brc20_deploys (id),
  deploy_id INTEGER,
  mint_id INTEGER,
  transfer_id INTEGER
);

CREATE INDEX IF NOT EXISTS idx_events_deploy
  ON brc20_events (brc20_deploy_id, inscription_number);
CREATE INDEX IF NOT EXISTS idx_events_block_height
  ON brc20_events (block_height);
"#;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
  conn.execute_batch(SCHEMA)
}
