use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, bounded};
use shaper::Result;
use shaper::config::Config;
use shaper::error::Error as ShaperError;
use shaper::limiter::{LiveLimiter, run_drain};
use shaper::report::{write_header, write_row, write_summary};
use shaper::simulator::TickRecord;
use shaper::stats::{AggregateStats, StatsCollector};
use shaper::supply::BurstArrivals;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info, warn};

use super::cli::LiveArgs;

const RECORD_QUEUE: usize = 64;

pub async fn run(mut config: Config, args: LiveArgs) -> Result<()> {
    config.override_bucket(args.bucket.capacity, args.bucket.drain_rate)?;
    config.override_live(args.interval, args.producers)?;

    let limiter = Arc::new(LiveLimiter::new(config.bucket, config.live.drain_interval)?);
    let (tx, rx) = bounded(RECORD_QUEUE);
    let (stop_tx, stop_rx) = watch::channel(false);

    let reporter = tokio::spawn(report_records(rx));
    let drain = tokio::spawn(run_drain(Arc::clone(&limiter), tx, stop_rx.clone()));
    let producers: Vec<_> = (0..config.live.producers)
        .map(|id| {
            let burst = config.live.burst;
            let arrivals = BurstArrivals::new(
                burst.seed.wrapping_add(id as u64),
                burst.base,
                burst.max_burst,
                burst.probability,
            );
            tokio::spawn(produce(
                Arc::clone(&limiter),
                arrivals,
                config.live.offer_interval,
                stop_rx.clone(),
                id,
            ))
        })
        .collect();
    info!(
        producers = producers.len(),
        interval = ?config.live.drain_interval,
        "live limiter running"
    );

    match args.duration {
        Some(duration) => {
            tokio::select! {
                _ = signal::ctrl_c() => info!("shutdown signal received"),
                () = sleep(duration) => info!("run duration elapsed"),
            }
        }
        None => {
            if let Err(err) = signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
        }
    }

    stop_tx.send_replace(true);
    for producer in producers {
        if let Err(err) = producer.await {
            warn!(error = %err, "producer task terminated unexpectedly");
        }
    }
    if let Err(err) = drain.await {
        warn!(error = %err, "drain task terminated unexpectedly");
    }

    let stats = reporter
        .await
        .map_err(|err| ShaperError::Task(err.to_string()))??;
    let snapshot = limiter.snapshot();
    info!(
        level = snapshot.level,
        unreported_accepted = snapshot.pending_accepted,
        "live limiter stopped"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_summary(&mut out, "Live Limiter Summary:", &stats)?;
    Ok(())
}

/// Offer one generated arrival per `every` until shutdown.
async fn produce(
    limiter: Arc<LiveLimiter>,
    mut arrivals: BurstArrivals,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
    id: usize,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(volume) = arrivals.next() else {
                    break;
                };
                match limiter.offer(volume) {
                    Ok(_) => {}
                    Err(err) if err.is_recoverable() => {
                        warn!(producer = id, error = %err, "offer rejected");
                    }
                    Err(err) => {
                        error!(producer = id, error = %err, "producer stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Print each closed interval as it arrives and fold the totals.
async fn report_records(records: Receiver<TickRecord>) -> Result<AggregateStats> {
    let mut collector = StatsCollector::new();
    write_header(&mut std::io::stdout().lock())?;
    while let Ok(record) = records.recv().await {
        collector.record(&record);
        write_row(&mut std::io::stdout().lock(), &record)?;
    }
    Ok(collector.finish())
}
