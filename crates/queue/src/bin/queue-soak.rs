//! queue-soak — hammer a blocking queue with producer and consumer threads.
//!
//! Every producer pushes a disjoint range of ids; consumers drain until all
//! ids are seen, then get released through `interrupt()`. The run fails if
//! any id is lost or delivered twice.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use stupid_core::config::load_dotenv;
use stupid_core::logging::init_tracing;
use stupid_core::{Config, QueueBacking};
use stupid_queue::{BlockingQueue, DynQueue, QueueError};

/// Give up waiting once nothing has been delivered for this long.
const STALL_LIMIT: Duration = Duration::from_secs(5);

// ── CLI ─────────────────────────────────────────────────────────────

/// Producer/consumer soak test for the in-memory queues.
#[derive(Parser, Debug)]
#[command(name = "queue-soak", version, about)]
struct Cli {
    /// Number of producer threads.
    #[arg(long, env = "SOAK_PRODUCERS", default_value_t = 4)]
    producers: usize,

    /// Number of consumer threads.
    #[arg(long, env = "SOAK_CONSUMERS", default_value_t = 4)]
    consumers: usize,

    /// Total items pushed across all producers.
    #[arg(long, env = "SOAK_ITEMS", default_value_t = 1_000_000)]
    items: usize,

    /// Backing store (btree or array). Overrides QUEUE_BACKING.
    #[arg(long)]
    backing: Option<QueueBacking>,
}

/// Block until consumers have taken `items` values, or progress stops while
/// the queue sits empty.
fn wait_for_delivery(
    queue: &BlockingQueue<usize, DynQueue<usize>>,
    delivered: &AtomicUsize,
    items: usize,
    poll_timeout: Duration,
) -> Result<()> {
    let mut last = (0, Instant::now());
    loop {
        let count = delivered.load(Ordering::Acquire);
        if count >= items {
            return Ok(());
        }
        if count != last.0 {
            last = (count, Instant::now());
        } else if last.1.elapsed() > STALL_LIMIT && queue.is_empty()? {
            warn!(delivered = count, expected = items, "consumers stalled on an empty queue");
            return Ok(());
        }
        thread::sleep(poll_timeout.min(Duration::from_millis(10)));
    }
}

fn main() -> Result<()> {
    load_dotenv();
    init_tracing();

    let cli = Cli::parse();
    if cli.producers == 0 || cli.consumers == 0 {
        bail!("need at least one producer and one consumer");
    }

    let mut config = Config::from_env();
    if let Some(backing) = cli.backing {
        config.queue.backing = backing;
    }
    config.queue.validate().context("invalid queue config")?;
    config.log_summary();

    let queue = BlockingQueue::<usize, DynQueue<usize>>::from_config(&config.queue);
    let poll_timeout = config.queue.poll_timeout();
    let seen: Vec<AtomicBool> = (0..cli.items).map(|_| AtomicBool::new(false)).collect();
    let delivered = AtomicUsize::new(0);
    let duplicates = AtomicUsize::new(0);
    let done = AtomicBool::new(false);

    info!(
        producers = cli.producers,
        consumers = cli.consumers,
        items = cli.items,
        backing = %config.queue.backing,
        "soak starting"
    );
    let started = Instant::now();

    thread::scope(|s| -> Result<()> {
        let consumers: Vec<_> = (0..cli.consumers)
            .map(|id| {
                let (queue, seen, delivered, duplicates, done) =
                    (&queue, &seen, &delivered, &duplicates, &done);
                s.spawn(move || -> Result<usize, QueueError> {
                    let mut taken = 0;
                    loop {
                        match queue.poll_timeout(poll_timeout) {
                            Ok(Some(item)) => {
                                if seen[item].swap(true, Ordering::Relaxed) {
                                    duplicates.fetch_add(1, Ordering::Relaxed);
                                }
                                delivered.fetch_add(1, Ordering::Release);
                                taken += 1;
                            }
                            Ok(None) if done.load(Ordering::Acquire) => break,
                            Ok(None) => {}
                            Err(QueueError::Interrupted) => break,
                            Err(e) => return Err(e),
                        }
                    }
                    debug!(consumer = id, taken, "consumer finished");
                    Ok(taken)
                })
            })
            .collect();

        let chunk = cli.items.div_ceil(cli.producers);
        let producers: Vec<_> = (0..cli.producers)
            .map(|id| {
                let queue = &queue;
                let range = (id * chunk).min(cli.items)..((id + 1) * chunk).min(cli.items);
                s.spawn(move || -> Result<(), QueueError> {
                    for item in range {
                        queue.add(item)?;
                    }
                    Ok(())
                })
            })
            .collect();

        let mut produced = Ok(());
        for producer in producers {
            let result = match producer.join() {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(_) => Err(anyhow::anyhow!("producer thread panicked")),
            };
            if produced.is_ok() {
                produced = result;
            }
        }
        if produced.is_ok() {
            produced = wait_for_delivery(&queue, &delivered, cli.items, poll_timeout);
        }
        done.store(true, Ordering::Release);
        queue.interrupt()?;

        for consumer in consumers {
            match consumer.join() {
                Ok(result) => {
                    result?;
                }
                Err(_) => bail!("consumer thread panicked"),
            }
        }
        produced
    })?;

    let elapsed = started.elapsed();
    let missing = seen.iter().filter(|s| !s.load(Ordering::Relaxed)).count();
    let duplicates = duplicates.load(Ordering::Relaxed);
    if missing > 0 || duplicates > 0 {
        bail!("delivery mismatch: {missing} missing, {duplicates} duplicated");
    }
    if !queue.is_empty()? {
        warn!(left = queue.len()?, "queue not empty after soak");
    }

    let rate = cli.items as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        items = cli.items,
        elapsed_ms = elapsed.as_millis() as u64,
        items_per_sec = rate as u64,
        "soak complete, every item delivered once"
    );
    Ok(())
}
