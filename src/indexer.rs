use crate::{
  chain::{BlockApply, BlockRollback, ChainEvent},
  engine::Updater,
  error::IndexError,
  storage::Brc20Database,
};
use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{sync_channel, Receiver, SyncSender, TrySendError},
    Arc,
  },
  thread,
  time::Duration,
};

const BLOCK_RETRY_ATTEMPTS: usize = 3;
const BLOCK_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Serializes block deliveries onto a bounded FIFO drained by a single
/// worker. `on_block`/`on_rollback` never block: they enqueue and
/// report admission, and the source re-offers rejected deliveries.
pub struct Indexer {
  sender: SyncSender<ChainEvent>,
  worker: thread::JoinHandle<Result<(), IndexError>>,
  shutdown: Arc<AtomicBool>,
  failed: Arc<AtomicBool>,
}

impl Indexer {
  pub fn start(db: Brc20Database, queue_max_depth: usize) -> Result<Self, IndexError> {
    let tip = db.max_indexed_height()?;
    let (sender, receiver) = sync_channel(queue_max_depth);
    let shutdown = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(AtomicBool::new(false));

    let worker = thread::spawn({
      let shutdown = shutdown.clone();
      let failed = failed.clone();
      move || {
        let result = run_worker(db, receiver, tip, &shutdown);
        if let Err(e) = &result {
          log::error!("index worker stopped: {e}");
          failed.store(true, Ordering::SeqCst);
        }
        result
      }
    });

    Ok(Self {
      sender,
      worker,
      shutdown,
      failed,
    })
  }

  pub fn on_block(&self, block: BlockApply) -> bool {
    self.offer(ChainEvent::BlockApply(block))
  }

  pub fn on_rollback(&self, rollback: BlockRollback) -> bool {
    self.offer(ChainEvent::BlockRollback(rollback))
  }

  fn offer(&self, event: ChainEvent) -> bool {
    if self.shutdown.load(Ordering::SeqCst) || self.failed.load(Ordering::SeqCst) {
      return false;
    }
    match self.sender.try_send(event) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        log::debug!("delivery rejected: queue full");
        false
      }
      Err(TrySendError::Disconnected(_)) => false,
    }
  }

  /// True once the worker has stopped on a fatal error. Offers are
  /// rejected from then on.
  pub fn has_failed(&self) -> bool {
    self.failed.load(Ordering::SeqCst)
  }

  /// Close intake and let the worker drain everything already
  /// accepted, then surface its result.
  pub fn finish(self) -> Result<(), IndexError> {
    let Indexer { sender, worker, .. } = self;
    drop(sender);
    match worker.join() {
      Ok(result) => result,
      Err(_) => Err(IndexError::WorkerPanicked),
    }
  }

  /// Stop the worker without draining. Pending queue items are
  /// dropped; the source redelivers them on restart.
  pub fn shutdown(self) -> Result<(), IndexError> {
    self.shutdown.store(true, Ordering::SeqCst);
    self.finish()
  }
}

fn run_worker(
  mut db: Brc20Database,
  receiver: Receiver<ChainEvent>,
  mut tip: Option<u64>,
  shutdown: &AtomicBool,
) -> Result<(), IndexError> {
  loop {
    let event = match receiver.recv() {
      Ok(event) => event,
      // all senders gone
      Err(_) => return Ok(()),
    };
    if shutdown.load(Ordering::SeqCst) {
      log::info!("shutdown requested, dropping pending deliveries");
      return Ok(());
    }

    match event {
      ChainEvent::BlockApply(block) => {
        if let Some(tip) = tip {
          if block.height <= tip {
            log::warn!("block {} at or below tip {tip}, skipped", block.height);
            continue;
          }
        }
        let applied = apply_with_retries(&mut db, &block)?;
        tip = Some(block.height);
        log::info!("applied block {} ({applied} brc20 operations)", block.height);
      }
      ChainEvent::BlockRollback(rollback) => {
        if tip != Some(rollback.height) {
          return Err(IndexError::UnknownRollback {
            height: rollback.height,
            tip,
          });
        }
        db.with_write_tx(|ledger| Updater::new(ledger).rollback_block(rollback.height))?;
        tip = rollback.height.checked_sub(1);
        log::info!("rolled back block {}", rollback.height);
      }
    }
  }
}

fn apply_with_retries(db: &mut Brc20Database, block: &BlockApply) -> Result<usize, IndexError> {
  let mut attempt = 0;
  loop {
    attempt += 1;
    match db.with_write_tx(|ledger| {
      let mut updater = Updater::new(ledger);
      updater.apply_block(block)
    }) {
      Ok(applied) => return Ok(applied),
      Err(e) if e.is_transient() && attempt < BLOCK_RETRY_ATTEMPTS => {
        log::warn!(
          "transient store error on block {} (attempt {attempt}): {e}",
          block.height
        );
        thread::sleep(BLOCK_RETRY_DELAY);
      }
      Err(e) if e.is_transient() => {
        return Err(IndexError::RetriesExhausted {
          height: block.height,
          attempts: attempt,
          source: e,
        });
      }
      Err(e) => return Err(e.into()),
    }
  }
}
