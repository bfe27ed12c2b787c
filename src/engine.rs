use crate::{
  chain::{BlockApply, InscriptionEvent, InscriptionGenesis, InscriptionTransfer},
  error::Brc20Error,
  num::NumError,
  protocol::{self, Deploy, Mint, Operation, Transfer, MAXIMUM_SUPPLY},
  storage::{
    EventKind, LedgerWrite, NewBalanceDelta, NewEvent, NewMint, NewToken, NewTransfer,
    SPENT_AS_FEE,
  },
};
use bigdecimal::BigDecimal;

#[derive(Debug, thiserror::Error)]
pub enum Error<E: std::error::Error> {
  #[error("brc20 error: {0}")]
  Consensus(#[from] Brc20Error),

  #[error("ledger error: {0}")]
  Ledger(E),
}

impl<E: std::error::Error> From<NumError> for Error<E> {
  fn from(e: NumError) -> Self {
    Self::Consensus(Brc20Error::Numeric(e))
  }
}

/// Applies consensus rules to inscription events and emits ledger
/// writes. One updater instance lives for one block transaction.
pub struct Updater<'a, L> {
  ledger: &'a L,
}

impl<'a, L: LedgerWrite> Updater<'a, L> {
  pub fn new(ledger: &'a L) -> Self {
    Self { ledger }
  }

  /// Process a block's inscriptions in delivery order. Consensus
  /// rejections leave no rows and never abort the block; ledger errors
  /// do. Returns how many operations committed rows.
  pub fn apply_block(&mut self, block: &BlockApply) -> Result<usize, L::Error> {
    self.ledger.insert_block_mark(block.height, &block.hash)?;

    let mut applied = 0;
    for event in &block.inscriptions {
      let result = match event {
        InscriptionEvent::Genesis(genesis) => {
          self.apply_inscription_genesis(block.height, genesis)
        }
        InscriptionEvent::Transfer(transfer) => {
          self.apply_inscription_transfer(block.height, transfer)
        }
      };

      match result {
        Ok(true) => applied += 1,
        Ok(false) => {}
        Err(Error::Consensus(e)) => {
          let id = match event {
            InscriptionEvent::Genesis(genesis) => genesis.inscription_id,
            InscriptionEvent::Transfer(transfer) => transfer.inscription_id,
          };
          log::debug!("inscription {id} rejected: {e}");
        }
        Err(Error::Ledger(e)) => return Err(e),
      }
    }
    Ok(applied)
  }

  /// Undo every ledger effect of `height`.
  pub fn rollback_block(&mut self, height: u64) -> Result<(), L::Error> {
    self.ledger.delete_block(height)
  }

  /// First appearance of an inscription. Returns whether any rows were
  /// written.
  pub fn apply_inscription_genesis(
    &mut self,
    height: u64,
    genesis: &InscriptionGenesis,
  ) -> Result<bool, Error<L::Error>> {
    let operation = match protocol::deserialize_brc20_operation(&genesis.payload, &genesis.mime) {
      Ok(operation) => operation,
      Err(e) => {
        log::debug!("inscription {} is not a brc20 operation: {e}", genesis.inscription_id);
        return Ok(false);
      }
    };

    let Some(address) = genesis.location.address.clone() else {
      log::debug!("inscription {} was inscribed as a fee, ignored", genesis.inscription_id);
      return Ok(false);
    };

    match operation {
      Operation::Deploy(deploy) => self.process_deploy(height, genesis, &address, deploy)?,
      Operation::Mint(mint) => self.process_mint(height, genesis, &address, mint)?,
      Operation::Transfer(transfer) => {
        self.process_inscribe_transfer(height, genesis, &address, transfer)?
      }
    }
    Ok(true)
  }

  /// Subsequent movement of an inscription: settles an unsettled
  /// transfer intent exactly once, otherwise ignores the move.
  pub fn apply_inscription_transfer(
    &mut self,
    height: u64,
    transfer: &InscriptionTransfer,
  ) -> Result<bool, Error<L::Error>> {
    let inscription_id = transfer.inscription_id.to_string();
    let intents = self
      .ledger
      .transfers_by_inscription(&inscription_id, 2)
      .map_err(Error::Ledger)?;

    let intent = match intents.as_slice() {
      [intent] if intent.to_address.is_none() => intent,
      [] => {
        log::debug!("no transfer intent for inscription {inscription_id}, move ignored");
        return Ok(false);
      }
      _ => {
        log::debug!("transfer intent for inscription {inscription_id} already settled, move ignored");
        return Ok(false);
      }
    };

    let amount = intent.amount.to_decimal();

    // release the transferable hold on the sender
    self
      .ledger
      .insert_balance_delta(&NewBalanceDelta {
        inscription_id: inscription_id.clone(),
        deploy_id: intent.deploy_id,
        block_height: height,
        address: intent.from_address.clone(),
        avail: BigDecimal::from(0),
        trans: -amount.clone(),
      })
      .map_err(Error::Ledger)?;

    let to_address = match &transfer.location.address {
      Some(recipient) => {
        self
          .ledger
          .insert_balance_delta(&NewBalanceDelta {
            inscription_id: inscription_id.clone(),
            deploy_id: intent.deploy_id,
            block_height: height,
            address: recipient.clone(),
            avail: amount,
            trans: BigDecimal::from(0),
          })
          .map_err(Error::Ledger)?;
        recipient.clone()
      }
      None => {
        log::debug!(
          "inscription {inscription_id} spent as fee, {} burned from transferable balance",
          intent.amount
        );
        SPENT_AS_FEE.to_string()
      }
    };

    self
      .ledger
      .settle_transfer(intent.id, &to_address, height)
      .map_err(Error::Ledger)?;

    self
      .ledger
      .insert_event(&NewEvent {
        kind: EventKind::TransferSettle,
        inscription_id,
        inscription_number: intent.inscription_number,
        block_height: height,
        deploy_id: intent.deploy_id,
        deploy_row_id: None,
        mint_id: None,
        transfer_id: Some(intent.id),
      })
      .map_err(Error::Ledger)?;

    Ok(true)
  }

  fn process_deploy(
    &mut self,
    height: u64,
    genesis: &InscriptionGenesis,
    address: &str,
    deploy: Deploy,
  ) -> Result<(), Error<L::Error>> {
    let Deploy {
      tick,
      max_supply,
      mint_limit,
      decimals,
    } = deploy;

    if max_supply > *MAXIMUM_SUPPLY {
      return Err(Brc20Error::InvalidMaxSupply(max_supply.to_string()).into());
    }
    if max_supply.scale() > decimals as i64 {
      return Err(
        Brc20Error::AmountPrecision {
          amount: max_supply.to_string(),
          decimals,
        }
        .into(),
      );
    }
    if let Some(limit) = &mint_limit {
      if limit.gt(&max_supply) {
        return Err(Brc20Error::MintLimitOutOfRange(limit.to_string()).into());
      }
      if limit.scale() > decimals as i64 {
        return Err(
          Brc20Error::AmountPrecision {
            amount: limit.to_string(),
            decimals,
          }
          .into(),
        );
      }
    }

    let created = self
      .ledger
      .insert_deploy(&NewToken {
        inscription_id: genesis.inscription_id.to_string(),
        inscription_number: genesis.number,
        block_height: height,
        tx_id: genesis.location.tx_id.to_string(),
        address: address.to_string(),
        ticker: tick.as_str().to_string(),
        max_supply,
        mint_limit,
        decimals,
      })
      .map_err(Error::Ledger)?;

    let Some(token) = created else {
      return Err(Brc20Error::DuplicateTick(tick.lower()).into());
    };

    self
      .ledger
      .insert_event(&NewEvent {
        kind: EventKind::Deploy,
        inscription_id: genesis.inscription_id.to_string(),
        inscription_number: genesis.number,
        block_height: height,
        deploy_id: token.id,
        deploy_row_id: Some(token.id),
        mint_id: None,
        transfer_id: None,
      })
      .map_err(Error::Ledger)?;

    log::debug!("deployed {} at height {height}", token.ticker);
    Ok(())
  }

  fn process_mint(
    &mut self,
    height: u64,
    genesis: &InscriptionGenesis,
    address: &str,
    mint: Mint,
  ) -> Result<(), Error<L::Error>> {
    let token = self
      .ledger
      .token(&mint.tick.lower())
      .map_err(Error::Ledger)?
      .ok_or(Brc20Error::TickNotFound(mint.tick.lower()))?;

    let amount = mint.amount;
    if amount.scale() > token.decimals as i64 {
      return Err(
        Brc20Error::AmountPrecision {
          amount: amount.to_string(),
          decimals: token.decimals,
        }
        .into(),
      );
    }
    if let Some(limit) = &token.mint_limit {
      if amount.gt(limit) {
        return Err(
          Brc20Error::AmountExceedLimit {
            amount: amount.to_string(),
            limit: limit.to_string(),
          }
          .into(),
        );
      }
    }

    let minted = self.ledger.minted_total(token.id).map_err(Error::Ledger)?;
    if minted.ge(&token.max_supply) {
      return Err(Brc20Error::TickMinted(mint.tick.lower()).into());
    }

    // cut off any excess beyond the remaining supply
    let remaining = token.max_supply.checked_sub(&minted)?;
    let effective = amount.min(&remaining);
    if effective.lt(&amount) {
      log::debug!(
        "mint of {} clamped to remaining supply {} for {}",
        amount,
        effective,
        token.ticker
      );
    }

    // the mint row keeps the requested amount; the credited amount
    // lives in the paired balance delta
    let mint_id = self
      .ledger
      .insert_mint(&NewMint {
        inscription_id: genesis.inscription_id.to_string(),
        inscription_number: genesis.number,
        deploy_id: token.id,
        block_height: height,
        tx_id: genesis.location.tx_id.to_string(),
        address: address.to_string(),
        amount: amount.clone(),
      })
      .map_err(Error::Ledger)?;

    self
      .ledger
      .insert_balance_delta(&NewBalanceDelta {
        inscription_id: genesis.inscription_id.to_string(),
        deploy_id: token.id,
        block_height: height,
        address: address.to_string(),
        avail: effective.to_decimal(),
        trans: BigDecimal::from(0),
      })
      .map_err(Error::Ledger)?;

    self
      .ledger
      .insert_event(&NewEvent {
        kind: EventKind::Mint,
        inscription_id: genesis.inscription_id.to_string(),
        inscription_number: genesis.number,
        block_height: height,
        deploy_id: token.id,
        deploy_row_id: None,
        mint_id: Some(mint_id),
        transfer_id: None,
      })
      .map_err(Error::Ledger)?;

    Ok(())
  }

  fn process_inscribe_transfer(
    &mut self,
    height: u64,
    genesis: &InscriptionGenesis,
    address: &str,
    transfer: Transfer,
  ) -> Result<(), Error<L::Error>> {
    let token = self
      .ledger
      .token(&transfer.tick.lower())
      .map_err(Error::Ledger)?
      .ok_or(Brc20Error::TickNotFound(transfer.tick.lower()))?;

    let amount = transfer.amount;
    if amount.scale() > token.decimals as i64 {
      return Err(
        Brc20Error::AmountPrecision {
          amount: amount.to_string(),
          decimals: token.decimals,
        }
        .into(),
      );
    }

    let balance = self
      .ledger
      .balance(address, token.id)
      .map_err(Error::Ledger)?;
    if amount.gt(&balance.avail) {
      return Err(
        Brc20Error::InsufficientBalance {
          available: balance.avail.to_string(),
          required: amount.to_string(),
        }
        .into(),
      );
    }

    let transfer_id = self
      .ledger
      .insert_transfer(&NewTransfer {
        inscription_id: genesis.inscription_id.to_string(),
        inscription_number: genesis.number,
        deploy_id: token.id,
        block_height: height,
        tx_id: genesis.location.tx_id.to_string(),
        from_address: address.to_string(),
        amount: amount.clone(),
      })
      .map_err(Error::Ledger)?;

    // reserve: available moves into the transferable hold
    self
      .ledger
      .insert_balance_delta(&NewBalanceDelta {
        inscription_id: genesis.inscription_id.to_string(),
        deploy_id: token.id,
        block_height: height,
        address: address.to_string(),
        avail: -amount.to_decimal(),
        trans: amount.to_decimal(),
      })
      .map_err(Error::Ledger)?;

    self
      .ledger
      .insert_event(&NewEvent {
        kind: EventKind::TransferReserve,
        inscription_id: genesis.inscription_id.to_string(),
        inscription_number: genesis.number,
        block_height: height,
        deploy_id: token.id,
        deploy_row_id: None,
        mint_id: None,
        transfer_id: Some(transfer_id),
      })
      .map_err(Error::Ledger)?;

    Ok(())
  }
}
