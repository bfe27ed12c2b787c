use brc20_index::{
  chain::{BlockApply, InscriptionEvent, InscriptionGenesis, InscriptionTransfer, Location},
  engine::Updater,
  inscription_id::InscriptionId,
  num::Num,
  query::{self, Paging},
  storage::{Brc20Database, SPENT_AS_FEE},
};
use std::str::FromStr;

const DEPLOYER: &str = "bc1qdeployer";
const ALICE: &str = "bc1qalice";
const BOB: &str = "bc1qbob";

fn txid(n: u64) -> bitcoin::Txid {
  format!("{n:064x}").parse().unwrap()
}

fn inscription(n: u64) -> InscriptionId {
  InscriptionId {
    txid: txid(n),
    index: 0,
  }
}

fn location(height: u64, tx: u64, address: Option<&str>) -> Location {
  Location {
    block_height: height,
    tx_id: txid(tx),
    address: address.map(str::to_string),
    offset: 0,
  }
}

fn genesis(n: u64, height: u64, payload: &str, address: Option<&str>) -> InscriptionEvent {
  InscriptionEvent::Genesis(InscriptionGenesis {
    inscription_id: inscription(n),
    number: n as i64,
    payload: payload.as_bytes().to_vec(),
    mime: "text/plain;charset=utf-8".to_string(),
    location: location(height, n, address),
  })
}

fn movement(n: u64, height: u64, address: Option<&str>) -> InscriptionEvent {
  InscriptionEvent::Transfer(InscriptionTransfer {
    inscription_id: inscription(n),
    location: location(height, n + 1000, address),
  })
}

fn block(height: u64, inscriptions: Vec<InscriptionEvent>) -> BlockApply {
  BlockApply {
    height,
    hash: format!("{height:064x}"),
    prev_hash: format!("{:064x}", height.saturating_sub(1)),
    inscriptions,
  }
}

fn apply(db: &mut Brc20Database, block: &BlockApply) -> usize {
  db.with_write_tx(|ledger| {
    let mut updater = Updater::new(ledger);
    updater.apply_block(block)
  })
  .unwrap()
}

fn rollback(db: &mut Brc20Database, height: u64) {
  db.with_write_tx(|ledger| Updater::new(ledger).rollback_block(height))
    .unwrap()
}

fn assert_balance(db: &Brc20Database, address: &str, tick: &str, avail: &str, trans: &str) {
  let rows = query::balances(db, address, Some(tick), Paging::default()).unwrap();
  let row = rows
    .iter()
    .find(|b| b.ticker.to_lowercase() == tick.to_lowercase())
    .unwrap_or_else(|| panic!("no {tick} balance for {address}"));
  assert_eq!(row.avail, Num::from_str(avail).unwrap(), "avail of {address}");
  assert_eq!(row.trans, Num::from_str(trans).unwrap(), "trans of {address}");
  assert_eq!(
    row.total,
    Num::from_str(avail)
      .unwrap()
      .checked_add(&Num::from_str(trans).unwrap())
      .unwrap(),
    "total of {address}"
  );
}

fn assert_no_balance(db: &Brc20Database, address: &str, tick: &str) {
  let rows = query::balances(db, address, Some(tick), Paging::default()).unwrap();
  assert!(rows.is_empty(), "{address} should have no {tick} rows: {rows:?}");
}

fn event_count(db: &Brc20Database, tick: &str) -> usize {
  query::history(db, tick, Paging { limit: 1000, offset: 0 })
    .unwrap()
    .len()
}

/// Deploy at 100, mint 500 to Alice at 101.
fn deploy_and_mint(db: &mut Brc20Database) {
  apply(
    db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"ordi","max":"21000000","lim":"1000"}"##,
        Some(DEPLOYER),
      )],
    ),
  );
  apply(
    db,
    &block(
      101,
      vec![genesis(
        2,
        101,
        r##"{"p":"brc-20","op":"mint","tick":"ordi","amt":"500"}"##,
        Some(ALICE),
      )],
    ),
  );
}

#[test]
fn deploy_mint_and_balance() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  deploy_and_mint(&mut db);

  assert_balance(&db, ALICE, "ordi", "500", "0");

  let supply = query::supply(&db, "ordi").unwrap().unwrap();
  assert_eq!(supply.max_supply, Num::from_str("21000000").unwrap());
  assert_eq!(supply.minted, Num::from_str("500").unwrap());
  assert_eq!(supply.holders, 1);

  let (tokens, total) = query::list_tokens(&db, Some("ORDI"), Paging::default()).unwrap();
  assert_eq!(total, 1);
  assert_eq!(tokens[0].ticker, "ordi");
  assert_eq!(tokens[0].block_height, 100);
}

#[test]
fn mint_exceeding_limit_is_rejected() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  deploy_and_mint(&mut db);
  let events_before = event_count(&db, "ordi");

  let applied = apply(
    &mut db,
    &block(
      102,
      vec![genesis(
        3,
        102,
        r##"{"p":"brc-20","op":"mint","tick":"ordi","amt":"2000"}"##,
        Some(ALICE),
      )],
    ),
  );

  assert_eq!(applied, 0);
  assert_balance(&db, ALICE, "ordi", "500", "0");
  assert_eq!(query::supply(&db, "ordi").unwrap().unwrap().minted, Num::from_str("500").unwrap());
  assert_eq!(event_count(&db, "ordi"), events_before);
}

#[test]
fn mint_excess_is_clamped_to_remaining_supply() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  apply(
    &mut db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"clmp","max":"100"}"##,
        Some(DEPLOYER),
      )],
    ),
  );
  apply(
    &mut db,
    &block(
      101,
      vec![genesis(
        2,
        101,
        r##"{"p":"brc-20","op":"mint","tick":"clmp","amt":"80"}"##,
        Some(ALICE),
      )],
    ),
  );
  apply(
    &mut db,
    &block(
      102,
      vec![genesis(
        3,
        102,
        r##"{"p":"brc-20","op":"mint","tick":"clmp","amt":"50"}"##,
        Some(BOB),
      )],
    ),
  );

  // effective amount is clamped, the mint row keeps the request
  assert_balance(&db, BOB, "clmp", "20", "0");
  let requested: String = db
    .connection()
    .query_row(
      "SELECT amount FROM brc20_mints WHERE inscription_id = ?1",
      [inscription(3).to_string()],
      |row| row.get(0),
    )
    .unwrap();
  assert_eq!(requested, "50");

  let supply = query::supply(&db, "clmp").unwrap().unwrap();
  assert_eq!(supply.minted, Num::from_str("100").unwrap());

  // token is fully minted now
  let applied = apply(
    &mut db,
    &block(
      103,
      vec![genesis(
        4,
        103,
        r##"{"p":"brc-20","op":"mint","tick":"clmp","amt":"1"}"##,
        Some(BOB),
      )],
    ),
  );
  assert_eq!(applied, 0);
  assert_eq!(
    query::supply(&db, "clmp").unwrap().unwrap().minted,
    Num::from_str("100").unwrap()
  );
}

/// Deploy, mint 1000 to Alice, reserve 300, send to Bob.
fn two_step_transfer(db: &mut Brc20Database) {
  apply(
    db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"ordi","max":"21000000","lim":"1000"}"##,
        Some(DEPLOYER),
      )],
    ),
  );
  apply(
    db,
    &block(
      101,
      vec![genesis(
        2,
        101,
        r##"{"p":"brc-20","op":"mint","tick":"ordi","amt":"1000"}"##,
        Some(ALICE),
      )],
    ),
  );
  apply(
    db,
    &block(
      102,
      vec![genesis(
        3,
        102,
        r##"{"p":"brc-20","op":"transfer","tick":"ordi","amt":"300"}"##,
        Some(ALICE),
      )],
    ),
  );
}

#[test]
fn transfer_settles_exactly_once() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  two_step_transfer(&mut db);
  assert_balance(&db, ALICE, "ordi", "700", "300");

  apply(&mut db, &block(103, vec![movement(3, 103, Some(BOB))]));
  assert_balance(&db, ALICE, "ordi", "700", "0");
  assert_balance(&db, BOB, "ordi", "300", "0");

  let to_address: Option<String> = db
    .connection()
    .query_row(
      "SELECT to_address FROM brc20_transfers WHERE inscription_id = ?1",
      [inscription(3).to_string()],
      |row| row.get(0),
    )
    .unwrap();
  assert_eq!(to_address.as_deref(), Some(BOB));

  // re-sending the settled inscription changes nothing
  let events_before = event_count(&db, "ordi");
  let applied = apply(&mut db, &block(104, vec![movement(3, 104, Some(ALICE))]));
  assert_eq!(applied, 0);
  assert_balance(&db, ALICE, "ordi", "700", "0");
  assert_balance(&db, BOB, "ordi", "300", "0");
  assert_eq!(event_count(&db, "ordi"), events_before);
}

#[test]
fn transfer_with_insufficient_balance_is_rejected() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  apply(
    &mut db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"ordi","max":"21000000","lim":"1000"}"##,
        Some(DEPLOYER),
      )],
    ),
  );
  apply(
    &mut db,
    &block(
      101,
      vec![genesis(
        2,
        101,
        r##"{"p":"brc-20","op":"mint","tick":"ordi","amt":"100"}"##,
        Some(ALICE),
      )],
    ),
  );

  let applied = apply(
    &mut db,
    &block(
      102,
      vec![genesis(
        3,
        102,
        r##"{"p":"brc-20","op":"transfer","tick":"ordi","amt":"101"}"##,
        Some(ALICE),
      )],
    ),
  );

  assert_eq!(applied, 0);
  assert_balance(&db, ALICE, "ordi", "100", "0");
  let transfer_rows: u64 = db
    .connection()
    .query_row("SELECT COUNT(*) FROM brc20_transfers", [], |row| row.get(0))
    .unwrap();
  assert_eq!(transfer_rows, 0);
}

#[test]
fn reserved_balance_is_not_available() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  two_step_transfer(&mut db);

  // 700 available, 300 on hold: an 800 reserve must fail
  let applied = apply(
    &mut db,
    &block(
      103,
      vec![genesis(
        4,
        103,
        r##"{"p":"brc-20","op":"transfer","tick":"ordi","amt":"800"}"##,
        Some(ALICE),
      )],
    ),
  );
  assert_eq!(applied, 0);
  assert_balance(&db, ALICE, "ordi", "700", "300");
}

#[test]
fn rollback_restores_prior_state() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  two_step_transfer(&mut db);
  apply(&mut db, &block(103, vec![movement(3, 103, Some(BOB))]));

  rollback(&mut db, 103);
  assert_balance(&db, ALICE, "ordi", "700", "300");
  assert_no_balance(&db, BOB, "ordi");
  let (to_address, settled_height): (Option<String>, Option<u64>) = db
    .connection()
    .query_row(
      "SELECT to_address, settled_height FROM brc20_transfers WHERE inscription_id = ?1",
      [inscription(3).to_string()],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap();
  assert_eq!(to_address, None);
  assert_eq!(settled_height, None);

  // the settlement can happen again after the reorg
  apply(&mut db, &block(103, vec![movement(3, 103, Some(BOB))]));
  assert_balance(&db, BOB, "ordi", "300", "0");
  rollback(&mut db, 103);

  rollback(&mut db, 102);
  assert_balance(&db, ALICE, "ordi", "1000", "0");
  let transfer_rows: u64 = db
    .connection()
    .query_row("SELECT COUNT(*) FROM brc20_transfers", [], |row| row.get(0))
    .unwrap();
  assert_eq!(transfer_rows, 0);

  rollback(&mut db, 101);
  assert_no_balance(&db, ALICE, "ordi");

  rollback(&mut db, 100);
  assert!(query::supply(&db, "ordi").unwrap().is_none());
  let (tokens, total) = query::list_tokens(&db, None, Paging::default()).unwrap();
  assert!(tokens.is_empty());
  assert_eq!(total, 0);
}

#[test]
fn ticker_collision_keeps_the_earlier_deploy() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  apply(
    &mut db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"OrDi","max":"1000"}"##,
        Some(DEPLOYER),
      )],
    ),
  );
  let applied = apply(
    &mut db,
    &block(
      101,
      vec![genesis(
        2,
        101,
        r##"{"p":"brc-20","op":"deploy","tick":"ORDI","max":"5"}"##,
        Some(ALICE),
      )],
    ),
  );

  assert_eq!(applied, 0);
  let (tokens, total) = query::list_tokens(&db, Some("ordi"), Paging::default()).unwrap();
  assert_eq!(total, 1);
  assert_eq!(tokens[0].ticker, "OrDi");
  assert_eq!(tokens[0].block_height, 100);
  assert_eq!(tokens[0].max_supply, Num::from_str("1000").unwrap());
}

#[test]
fn fee_spent_settlement_burns_the_hold() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  two_step_transfer(&mut db);

  apply(&mut db, &block(103, vec![movement(3, 103, None)]));

  assert_balance(&db, ALICE, "ordi", "700", "0");
  let to_address: Option<String> = db
    .connection()
    .query_row(
      "SELECT to_address FROM brc20_transfers WHERE inscription_id = ?1",
      [inscription(3).to_string()],
      |row| row.get(0),
    )
    .unwrap();
  assert_eq!(to_address.as_deref(), Some(SPENT_AS_FEE));

  // still settled exactly once: a later move is ignored
  let applied = apply(&mut db, &block(104, vec![movement(3, 104, Some(BOB))]));
  assert_eq!(applied, 0);
  assert_no_balance(&db, BOB, "ordi");
}

#[test]
fn fee_spent_genesis_is_ignored() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  let applied = apply(
    &mut db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"ordi","max":"1000"}"##,
        None,
      )],
    ),
  );
  assert_eq!(applied, 0);
  assert!(query::supply(&db, "ordi").unwrap().is_none());
}

#[test]
fn non_brc20_inscriptions_are_ignored() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  let applied = apply(
    &mut db,
    &block(
      100,
      vec![
        genesis(1, 100, "GM", Some(ALICE)),
        genesis(2, 100, r##"{"p":"sns","op":"reg","name":"x"}"##, Some(ALICE)),
        InscriptionEvent::Genesis(InscriptionGenesis {
          inscription_id: inscription(3),
          number: 3,
          payload: br##"{"p":"brc-20","op":"deploy","tick":"ordi","max":"1000"}"##.to_vec(),
          mime: "image/png".to_string(),
          location: location(100, 3, Some(ALICE)),
        }),
      ],
    ),
  );
  assert_eq!(applied, 0);
  let (tokens, _) = query::list_tokens(&db, None, Paging::default()).unwrap();
  assert!(tokens.is_empty());
}

#[test]
fn precision_beyond_token_decimals_is_rejected() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  apply(
    &mut db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"prec","max":"1000","dec":"2"}"##,
        Some(DEPLOYER),
      )],
    ),
  );

  let applied = apply(
    &mut db,
    &block(
      101,
      vec![genesis(
        2,
        101,
        r##"{"p":"brc-20","op":"mint","tick":"prec","amt":"1.123"}"##,
        Some(ALICE),
      )],
    ),
  );
  assert_eq!(applied, 0);

  let applied = apply(
    &mut db,
    &block(
      102,
      vec![genesis(
        3,
        102,
        r##"{"p":"brc-20","op":"mint","tick":"prec","amt":"1.12"}"##,
        Some(ALICE),
      )],
    ),
  );
  assert_eq!(applied, 1);
  assert_balance(&db, ALICE, "prec", "1.12", "0");
}

#[test]
fn holders_are_ordered_by_total_descending() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  apply(
    &mut db,
    &block(
      100,
      vec![genesis(
        1,
        100,
        r##"{"p":"brc-20","op":"deploy","tick":"ordi","max":"21000000","lim":"1000"}"##,
        Some(DEPLOYER),
      )],
    ),
  );
  apply(
    &mut db,
    &block(
      101,
      vec![
        genesis(2, 101, r##"{"p":"brc-20","op":"mint","tick":"ordi","amt":"200"}"##, Some(ALICE)),
        genesis(3, 101, r##"{"p":"brc-20","op":"mint","tick":"ordi","amt":"900"}"##, Some(BOB)),
      ],
    ),
  );

  let holders = query::holders(&db, "ORDI", Paging::default()).unwrap();
  assert_eq!(holders.len(), 2);
  assert_eq!(holders[0].address, BOB);
  assert_eq!(holders[0].total, Num::from_str("900").unwrap());
  assert_eq!(holders[1].address, ALICE);

  let supply = query::supply(&db, "ordi").unwrap().unwrap();
  assert_eq!(supply.holders, 2);
}

#[test]
fn history_is_ordered_by_inscription_number_descending() {
  let mut db = Brc20Database::open_in_memory().unwrap();
  two_step_transfer(&mut db);
  apply(&mut db, &block(103, vec![movement(3, 103, Some(BOB))]));

  let events = query::history(&db, "ordi", Paging::default()).unwrap();
  // deploy(1), mint(2), reserve(3), settle(3)
  assert_eq!(events.len(), 4);
  let numbers: Vec<i64> = events.iter().map(|e| e.inscription_number).collect();
  assert_eq!(numbers, vec![3, 3, 2, 1]);

  let paged = query::history(&db, "ordi", Paging { limit: 2, offset: 2 }).unwrap();
  assert_eq!(paged.len(), 2);
  assert_eq!(paged[0].inscription_number, 2);
}
