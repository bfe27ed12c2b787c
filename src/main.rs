use anyhow::Context;
use brc20_index::{
  chain::ChainEvent, config::IndexConfig, indexer::Indexer, storage::Brc20Database,
};
use clap::Parser;
use std::{
  fs::File,
  io::{self, BufRead, BufReader},
  path::PathBuf,
  process,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  thread,
  time::Duration,
};

const EXIT_FATAL: i32 = 1;
const EXIT_SOURCE_UNREACHABLE: i32 = 2;

const OFFER_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "brc20-index", about = "BRC-20 token indexer core")]
struct Arguments {
  /// Path to the TOML configuration file.
  #[arg(long)]
  config: Option<PathBuf>,

  /// Block event source: a newline-delimited JSON file, or `-` for
  /// stdin.
  #[arg(long, default_value = "-")]
  events: String,
}

fn main() {
  let args = Arguments::parse();

  let config = match IndexConfig::load(args.config.as_deref()).context("failed to load configuration")
  {
    Ok(config) => config,
    Err(err) => {
      report(&err);
      process::exit(EXIT_FATAL);
    }
  };

  env_logger::Builder::new()
    .parse_filters(&config.log_level)
    .init();

  match run(&config, &args.events) {
    Ok(code) => process::exit(code),
    Err(err) => {
      report(&err);
      process::exit(EXIT_FATAL);
    }
  }
}

fn report(err: &anyhow::Error) {
  eprintln!("error: {err}");
  err
    .chain()
    .skip(1)
    .for_each(|cause| eprintln!("because: {cause}"));
}

fn run(config: &IndexConfig, events: &str) -> anyhow::Result<i32> {
  let shutting_down = Arc::new(AtomicBool::new(false));
  {
    let shutting_down = shutting_down.clone();
    ctrlc::set_handler(move || {
      if shutting_down.fetch_or(true, Ordering::SeqCst) {
        process::exit(EXIT_FATAL);
      }
      println!("Shutting down gracefully. Press <CTRL-C> again to shutdown immediately.");
    })
    .expect("Error setting <CTRL-C> handler");
  }

  let db = Brc20Database::open(&config.database.path)
    .with_context(|| format!("failed to open database {}", config.database.path.display()))?;

  let indexer = Indexer::start(db, config.queue_max_depth).context("failed to start index worker")?;

  let reader: Box<dyn BufRead> = if events == "-" {
    Box::new(BufReader::new(io::stdin()))
  } else {
    match File::open(events) {
      Ok(file) => Box::new(BufReader::new(file)),
      Err(e) => {
        log::error!("event source {events} unreachable: {e}");
        return Ok(EXIT_SOURCE_UNREACHABLE);
      }
    }
  };

  for line in reader.lines() {
    if shutting_down.load(Ordering::SeqCst) || indexer.has_failed() {
      break;
    }

    let line = line.context("event source read error")?;
    if line.trim().is_empty() {
      continue;
    }

    let event: ChainEvent = match serde_json::from_str(&line) {
      Ok(event) => event,
      Err(e) => {
        log::warn!("skipping malformed event: {e}");
        continue;
      }
    };

    // rejected deliveries are re-offered until the queue drains
    loop {
      if shutting_down.load(Ordering::SeqCst) || indexer.has_failed() {
        break;
      }
      let accepted = match event.clone() {
        ChainEvent::BlockApply(block) => indexer.on_block(block),
        ChainEvent::BlockRollback(rollback) => indexer.on_rollback(rollback),
      };
      if accepted {
        break;
      }
      thread::sleep(OFFER_RETRY_DELAY);
    }
  }

  let result = if shutting_down.load(Ordering::SeqCst) {
    indexer.shutdown()
  } else {
    indexer.finish()
  };
  result.context("index worker failed")?;

  Ok(0)
}
